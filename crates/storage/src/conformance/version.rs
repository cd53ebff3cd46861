use std::future::Future;

use passage_core::{EntityKind, NegotiationAction, NegotiationState};

use super::{make_negotiation, make_transfer, TestResult};
use crate::{PassageStore, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "version_starts_at_zero",
        version_starts_at_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_increments_version_by_one",
        update_increments_version_by_one(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_returns_the_stored_version",
        update_returns_the_stored_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_conflicts",
        stale_version_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "future_version_conflicts",
        future_version_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_carries_kind_id_and_expected_version",
        conflict_carries_kind_id_and_expected_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_does_not_mutate",
        conflict_does_not_mutate(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "two_readers_one_write_wins",
        two_readers_one_write_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "versions_are_independent_per_entity",
        versions_are_independent_per_entity(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "versions_are_independent_per_family",
        versions_are_independent_per_family(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "retry_after_conflict_succeeds",
        retry_after_conflict_succeeds(factory).await,
    ));

    results
}

// ── 1. fresh records are version 0 ────────────────────────────────────────────

async fn version_starts_at_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-v0"))
        .await
        .map_err(|e| e.to_string())?;
    let stored = s.get_negotiation("neg-v0").await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    Ok(())
}

// ── 2. each committed update advances the version by exactly one ──────────────

async fn update_increments_version_by_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-inc"))
        .await
        .map_err(|e| e.to_string())?;

    for (step, action) in [
        (0, NegotiationAction::Request),
        (1, NegotiationAction::Requested),
        (2, NegotiationAction::Offer),
    ] {
        let read = s.get_negotiation("neg-inc").await.map_err(|e| e.to_string())?;
        if read.version != step {
            return Err(format!("expected version {step}, got {}", read.version));
        }
        let mut next = read.value;
        next.apply(action).map_err(|e| e.to_string())?;
        s.update_negotiation(next, read.version)
            .await
            .map_err(|e| e.to_string())?;
    }

    let done = s.get_negotiation("neg-inc").await.map_err(|e| e.to_string())?;
    if done.version != 3 {
        return Err(format!("expected version 3 after 3 updates, got {}", done.version));
    }
    Ok(())
}

// ── 3. the version returned by update matches the stored one ──────────────────

async fn update_returns_the_stored_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-ret"))
        .await
        .map_err(|e| e.to_string())?;
    let read = s.get_negotiation("neg-ret").await.map_err(|e| e.to_string())?;
    let mut next = read.value;
    next.apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    let returned = s
        .update_negotiation(next, read.version)
        .await
        .map_err(|e| e.to_string())?;
    let stored = s.get_negotiation("neg-ret").await.map_err(|e| e.to_string())?;
    if returned != stored.version {
        return Err(format!(
            "update returned {returned} but the store holds {}",
            stored.version
        ));
    }
    Ok(())
}

// ── 4. writing with a version that was already consumed conflicts ─────────────

async fn stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-stale"))
        .await
        .map_err(|e| e.to_string())?;
    let read = s
        .get_negotiation("neg-stale")
        .await
        .map_err(|e| e.to_string())?;
    let mut winner = read.value.clone();
    winner
        .apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    s.update_negotiation(winner, read.version)
        .await
        .map_err(|e| e.to_string())?;

    match s.update_negotiation(read.value, read.version).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 5. a version the store has never issued conflicts too ─────────────────────

async fn future_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-future"))
        .await
        .map_err(|e| e.to_string())?;
    match s.update_negotiation(make_negotiation("neg-future"), 999).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 6. the conflict error names the record and the version it expected ────────

async fn conflict_carries_kind_id_and_expected_version<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-fields"))
        .await
        .map_err(|e| e.to_string())?;
    match s.update_negotiation(make_negotiation("neg-fields"), 7).await {
        Err(StorageError::ConcurrentConflict {
            kind,
            id,
            expected_version,
        }) => {
            if kind != EntityKind::Negotiation {
                return Err(format!("expected kind negotiation, got {kind}"));
            }
            if id != "neg-fields" {
                return Err(format!("expected id \"neg-fields\", got \"{id}\""));
            }
            if expected_version != 7 {
                return Err(format!("expected expected_version 7, got {expected_version}"));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 7. a conflicting write leaves the record untouched ────────────────────────

async fn conflict_does_not_mutate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-immut"))
        .await
        .map_err(|e| e.to_string())?;

    let mut poisoned = make_negotiation("neg-immut");
    poisoned
        .apply(NegotiationAction::Terminate)
        .map_err(|e| e.to_string())?;
    let _ = s.update_negotiation(poisoned, 42).await;

    let stored = s
        .get_negotiation("neg-immut")
        .await
        .map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("version moved to {}", stored.version));
    }
    if stored.value.state != NegotiationState::Initial {
        return Err(format!("state moved to {}", stored.value.state.as_str()));
    }
    Ok(())
}

// ── 8. two readers of the same version: first write wins, second conflicts ────

async fn two_readers_one_write_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-race"))
        .await
        .map_err(|e| e.to_string())?;

    let reader_a = s.get_negotiation("neg-race").await.map_err(|e| e.to_string())?;
    let reader_b = s.get_negotiation("neg-race").await.map_err(|e| e.to_string())?;

    let mut a = reader_a.value;
    a.apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    s.update_negotiation(a, reader_a.version)
        .await
        .map_err(|e| e.to_string())?;

    let mut b = reader_b.value;
    b.apply(NegotiationAction::Offer).map_err(|e| e.to_string())?;
    match s.update_negotiation(b, reader_b.version).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }

    let stored = s.get_negotiation("neg-race").await.map_err(|e| e.to_string())?;
    if stored.value.state != NegotiationState::Request {
        return Err(format!(
            "expected the first write to win, state is {}",
            stored.value.state.as_str()
        ));
    }
    Ok(())
}

// ── 9. versions advance independently per record ──────────────────────────────

async fn versions_are_independent_per_entity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-a"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_negotiation(make_negotiation("neg-b"))
        .await
        .map_err(|e| e.to_string())?;

    let read = s.get_negotiation("neg-a").await.map_err(|e| e.to_string())?;
    let mut next = read.value;
    next.apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    s.update_negotiation(next, read.version)
        .await
        .map_err(|e| e.to_string())?;

    let untouched = s.get_negotiation("neg-b").await.map_err(|e| e.to_string())?;
    if untouched.version != 0 {
        return Err(format!(
            "neg-b version moved to {} without a write",
            untouched.version
        ));
    }
    Ok(())
}

// ── 10. the same id in different families does not share a version ────────────

async fn versions_are_independent_per_family<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("shared-id"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_transfer(make_transfer("shared-id"))
        .await
        .map_err(|e| e.to_string())?;

    let read = s.get_negotiation("shared-id").await.map_err(|e| e.to_string())?;
    let mut next = read.value;
    next.apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    s.update_negotiation(next, read.version)
        .await
        .map_err(|e| e.to_string())?;

    let transfer = s.get_transfer("shared-id").await.map_err(|e| e.to_string())?;
    if transfer.version != 0 {
        return Err(format!(
            "transfer version moved to {} when the negotiation was written",
            transfer.version
        ));
    }
    Ok(())
}

// ── 11. the canonical recovery: re-read and retry after a conflict ────────────

async fn retry_after_conflict_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-retry"))
        .await
        .map_err(|e| e.to_string())?;

    let stale = s.get_negotiation("neg-retry").await.map_err(|e| e.to_string())?;

    let fresh = s.get_negotiation("neg-retry").await.map_err(|e| e.to_string())?;
    let mut winner = fresh.value;
    winner
        .apply(NegotiationAction::Request)
        .map_err(|e| e.to_string())?;
    s.update_negotiation(winner, fresh.version)
        .await
        .map_err(|e| e.to_string())?;

    let mut loser = stale.value;
    loser
        .apply(NegotiationAction::Requested)
        .map_err(|e| e.to_string())?;
    if s.update_negotiation(loser, stale.version).await.is_ok() {
        return Err("stale write should have conflicted".to_string());
    }

    // Retry from a fresh read.
    let reread = s.get_negotiation("neg-retry").await.map_err(|e| e.to_string())?;
    let mut retried = reread.value;
    retried
        .apply(NegotiationAction::Requested)
        .map_err(|e| e.to_string())?;
    let version = s
        .update_negotiation(retried, reread.version)
        .await
        .map_err(|e| e.to_string())?;
    if version != 2 {
        return Err(format!("expected version 2 after the retry, got {version}"));
    }

    let stored = s.get_negotiation("neg-retry").await.map_err(|e| e.to_string())?;
    if stored.value.state != NegotiationState::Requested {
        return Err(format!(
            "expected REQUESTED after the retry, got {}",
            stored.value.state.as_str()
        ));
    }
    Ok(())
}
