use std::future::Future;

use passage_core::EntityKind;

use super::{make_negotiation, make_transfer, TestResult};
use crate::{PassageStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_negotiation_nonexistent",
        get_negotiation_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "not_found_carries_kind_and_id",
        not_found_carries_kind_and_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "each_family_reports_its_own_kind",
        each_family_reports_its_own_kind(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "duplicate_insert_rejected",
        duplicate_insert_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_nonexistent_is_not_found",
        update_nonexistent_is_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "latest_snapshot_on_empty_store_is_none",
        latest_snapshot_on_empty_store_is_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_snapshots_unknown_dpp_is_empty",
        list_snapshots_unknown_dpp_is_empty(factory).await,
    ));

    results
}

// ── 1. get on an empty store returns NotFound ─────────────────────────────────

async fn get_negotiation_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_negotiation("neg-999").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 2. NotFound carries the kind and the id that missed ───────────────────────

async fn not_found_carries_kind_and_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_negotiation("neg-42").await {
        Err(StorageError::NotFound { kind, id }) => {
            if kind != EntityKind::Negotiation {
                return Err(format!("expected kind negotiation, got {kind}"));
            }
            if id != "neg-42" {
                return Err(format!("expected id \"neg-42\", got \"{id}\""));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 3. every entity family tags NotFound with its own kind ────────────────────

async fn each_family_reports_its_own_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;

    let kind_of = |result: Result<EntityKind, String>, want: EntityKind| match result {
        Ok(kind) if kind == want => Ok(()),
        Ok(kind) => Err(format!("expected kind {want}, got {kind}")),
        Err(msg) => Err(msg),
    };

    let extract = |err: Option<StorageError>| match err {
        Some(StorageError::NotFound { kind, .. }) => Ok(kind),
        other => Err(format!("expected NotFound, got {:?}", other)),
    };

    kind_of(
        extract(s.get_transfer("x").await.err()),
        EntityKind::Transfer,
    )?;
    kind_of(extract(s.get_run("x").await.err()), EntityKind::JourneyRun)?;
    kind_of(
        extract(s.get_compliance_run("x").await.err()),
        EntityKind::ComplianceRun,
    )?;
    kind_of(extract(s.get_snapshot(7).await.err()), EntityKind::Snapshot)?;
    kind_of(
        extract(s.get_template("x").await.err()),
        EntityKind::JourneyTemplate,
    )?;
    Ok(())
}

// ── 4. inserting the same id twice is AlreadyExists ───────────────────────────

async fn duplicate_insert_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-dup"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_negotiation(make_negotiation("neg-dup")).await {
        Err(StorageError::AlreadyExists { kind, id }) => {
            if kind != EntityKind::Negotiation || id != "neg-dup" {
                return Err(format!("wrong fields on AlreadyExists: {kind} '{id}'"));
            }
            Ok(())
        }
        other => Err(format!("expected AlreadyExists, got {:?}", other)),
    }
}

// ── 5. updating an id that was never inserted is NotFound, not a conflict ─────

async fn update_nonexistent_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.update_transfer(make_transfer("tp-ghost"), 0).await {
        Err(StorageError::NotFound { kind, id }) => {
            if kind != EntityKind::Transfer || id != "tp-ghost" {
                return Err(format!("wrong fields on NotFound: {kind} '{id}'"));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 6. latest_snapshot is None, not an error, when nothing was recorded ───────

async fn latest_snapshot_on_empty_store_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.latest_snapshot("urn:dpp:ghost").await {
        Ok(None) => Ok(()),
        Ok(Some(snap)) => Err(format!("unexpected snapshot {}", snap.snapshot_id)),
        Err(e) => Err(e.to_string()),
    }
}

// ── 7. listing an unknown DPP yields an empty page ────────────────────────────

async fn list_snapshots_unknown_dpp_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let page = s
        .list_snapshots("urn:dpp:ghost", 50, 0)
        .await
        .map_err(|e| e.to_string())?;
    if !page.is_empty() {
        return Err(format!("expected empty page, got {} entries", page.len()));
    }
    Ok(())
}
