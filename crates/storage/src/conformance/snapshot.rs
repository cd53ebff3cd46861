use std::future::Future;

use serde_json::Map;

use super::{make_graph, TestResult};
use crate::PassageStore;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "ids_start_at_one_and_increase",
        ids_start_at_one_and_increase(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "ids_are_store_wide",
        ids_are_store_wide(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "get_returns_the_stored_graph",
        get_returns_the_stored_graph(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "listing_is_in_ascending_id_order",
        listing_is_in_ascending_id_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "listing_scopes_to_the_requested_dpp",
        listing_scopes_to_the_requested_dpp(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "offset_and_limit_bound_the_page",
        offset_and_limit_bound_the_page(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "offset_beyond_end_is_empty",
        offset_beyond_end_is_empty(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "count_ignores_paging_and_other_dpps",
        count_ignores_paging_and_other_dpps(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "latest_tracks_the_newest_per_dpp",
        latest_tracks_the_newest_per_dpp(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "created_at_is_stamped_by_the_store",
        created_at_is_stamped_by_the_store(factory).await,
    ));

    results
}

async fn record<S: PassageStore>(s: &S, dpp_id: &str, label: &str) -> Result<u64, String> {
    s.record_snapshot(dpp_id, label, Map::new(), make_graph(&["n1"]))
        .await
        .map(|snap| snap.snapshot_id)
        .map_err(|e| e.to_string())
}

// ── 1. the sequence starts at 1 and never repeats ─────────────────────────────

async fn ids_start_at_one_and_increase<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = record(&s, "urn:dpp:a", "first").await?;
    let second = record(&s, "urn:dpp:a", "second").await?;
    if first != 1 {
        return Err(format!("expected first id 1, got {first}"));
    }
    if second <= first {
        return Err(format!("ids not increasing: {first} then {second}"));
    }
    Ok(())
}

// ── 2. the sequence is shared across DPPs ─────────────────────────────────────

async fn ids_are_store_wide<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a1 = record(&s, "urn:dpp:a", "a first").await?;
    let b1 = record(&s, "urn:dpp:b", "b first").await?;
    let a2 = record(&s, "urn:dpp:a", "a second").await?;
    if !(a1 < b1 && b1 < a2) {
        return Err(format!("expected one shared sequence, got {a1}, {b1}, {a2}"));
    }
    Ok(())
}

// ── 3. get by id returns the graph that was recorded ──────────────────────────

async fn get_returns_the_stored_graph<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let recorded = s
        .record_snapshot(
            "urn:dpp:a",
            "with nodes",
            Map::new(),
            make_graph(&["n1", "n2", "n3"]),
        )
        .await
        .map_err(|e| e.to_string())?;
    let fetched = s
        .get_snapshot(recorded.snapshot_id)
        .await
        .map_err(|e| e.to_string())?;
    if fetched.graph.nodes.len() != 3 {
        return Err(format!(
            "expected 3 nodes back, got {}",
            fetched.graph.nodes.len()
        ));
    }
    if fetched.dpp_id != "urn:dpp:a" || fetched.label != "with nodes" {
        return Err(format!(
            "identity not preserved: {} / {}",
            fetched.dpp_id, fetched.label
        ));
    }
    Ok(())
}

// ── 4. listing returns ascending ids ──────────────────────────────────────────

async fn listing_is_in_ascending_id_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for label in ["one", "two", "three", "four"] {
        record(&s, "urn:dpp:a", label).await?;
    }
    let page = s
        .list_snapshots("urn:dpp:a", 50, 0)
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<u64> = page.iter().map(|snap| snap.snapshot_id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    if ids != sorted {
        return Err(format!("expected ascending ids, got {:?}", ids));
    }
    if ids.len() != 4 {
        return Err(format!("expected 4 snapshots, got {}", ids.len()));
    }
    Ok(())
}

// ── 5. listing one DPP never leaks another's snapshots ────────────────────────

async fn listing_scopes_to_the_requested_dpp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    record(&s, "urn:dpp:a", "a").await?;
    record(&s, "urn:dpp:b", "b").await?;
    record(&s, "urn:dpp:a", "a again").await?;

    let page = s
        .list_snapshots("urn:dpp:a", 50, 0)
        .await
        .map_err(|e| e.to_string())?;
    if page.len() != 2 {
        return Err(format!("expected 2 snapshots for dpp a, got {}", page.len()));
    }
    if page.iter().any(|snap| snap.dpp_id != "urn:dpp:a") {
        return Err("another DPP's snapshot leaked into the page".to_string());
    }
    Ok(())
}

// ── 6. offset skips from the front, limit caps the page ───────────────────────

async fn offset_and_limit_bound_the_page<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut ids = Vec::new();
    for label in ["one", "two", "three", "four", "five"] {
        ids.push(record(&s, "urn:dpp:a", label).await?);
    }

    let page = s
        .list_snapshots("urn:dpp:a", 2, 1)
        .await
        .map_err(|e| e.to_string())?;
    let got: Vec<u64> = page.iter().map(|snap| snap.snapshot_id).collect();
    if got != ids[1..3] {
        return Err(format!("expected {:?}, got {:?}", &ids[1..3], got));
    }
    Ok(())
}

// ── 7. offset past the end is an empty page, not an error ─────────────────────

async fn offset_beyond_end_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    record(&s, "urn:dpp:a", "only").await?;
    let page = s
        .list_snapshots("urn:dpp:a", 50, 10)
        .await
        .map_err(|e| e.to_string())?;
    if !page.is_empty() {
        return Err(format!("expected empty page, got {} entries", page.len()));
    }
    Ok(())
}

// ── 8. count_snapshots sees the whole log for one DPP ─────────────────────────

async fn count_ignores_paging_and_other_dpps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for label in ["one", "two", "three"] {
        record(&s, "urn:dpp:a", label).await?;
    }
    record(&s, "urn:dpp:b", "other").await?;

    let total = s.count_snapshots("urn:dpp:a").await.map_err(|e| e.to_string())?;
    if total != 3 {
        return Err(format!("expected 3, got {total}"));
    }
    let none = s
        .count_snapshots("urn:dpp:ghost")
        .await
        .map_err(|e| e.to_string())?;
    if none != 0 {
        return Err(format!("expected 0 for an unknown dpp, got {none}"));
    }
    Ok(())
}

// ── 9. latest_snapshot follows the newest write per DPP ───────────────────────

async fn latest_tracks_the_newest_per_dpp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    record(&s, "urn:dpp:a", "a old").await?;
    let b = record(&s, "urn:dpp:b", "b only").await?;
    let a = record(&s, "urn:dpp:a", "a new").await?;

    let latest_a = s
        .latest_snapshot("urn:dpp:a")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("expected a latest snapshot for dpp a")?;
    if latest_a.snapshot_id != a {
        return Err(format!(
            "expected latest id {a} for dpp a, got {}",
            latest_a.snapshot_id
        ));
    }

    let latest_b = s
        .latest_snapshot("urn:dpp:b")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("expected a latest snapshot for dpp b")?;
    if latest_b.snapshot_id != b {
        return Err(format!(
            "expected latest id {b} for dpp b, got {}",
            latest_b.snapshot_id
        ));
    }
    Ok(())
}

// ── 10. created_at is assigned by the store, not the caller ───────────────────

async fn created_at_is_stamped_by_the_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s
        .record_snapshot("urn:dpp:a", "timed", Map::new(), make_graph(&["n1"]))
        .await
        .map_err(|e| e.to_string())?;
    if snap.created_at.is_empty() {
        return Err("created_at is empty".to_string());
    }
    if !snap.created_at.ends_with('Z') {
        return Err(format!("expected a UTC timestamp, got {}", snap.created_at));
    }
    Ok(())
}
