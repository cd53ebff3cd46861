use std::future::Future;

use passage_core::{FeedbackEntry, JourneyTemplate, RunStatus};

use super::{make_compliance_run, make_negotiation, make_run, make_transfer, TestResult};
use crate::PassageStore;

pub(super) async fn run_roundtrip_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "roundtrip",
        "negotiation_round_trips",
        negotiation_round_trips(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "transfer_round_trips",
        transfer_round_trips(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "journey_run_round_trips",
        journey_run_round_trips(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "compliance_run_round_trips",
        compliance_run_round_trips(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "templates_seed_get_and_list",
        templates_seed_get_and_list(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "template_seeding_is_idempotent",
        template_seeding_is_idempotent(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "feedback_appends_in_insertion_order",
        feedback_appends_in_insertion_order(factory).await,
    ));

    results
}

// ── 1. Negotiation insert/get round-trip at version 0 ─────────────────────────

async fn negotiation_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_negotiation(make_negotiation("neg-1"))
        .await
        .map_err(|e| e.to_string())?;
    let stored = s.get_negotiation("neg-1").await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    if stored.value.id != "neg-1" {
        return Err(format!("expected id \"neg-1\", got \"{}\"", stored.value.id));
    }
    if stored.value.asset_id != "urn:dpp:asset-001" {
        return Err(format!(
            "asset_id not preserved, got \"{}\"",
            stored.value.asset_id
        ));
    }
    if stored.value.state_history.len() != 1 {
        return Err(format!(
            "expected the creation history entry only, got {}",
            stored.value.state_history.len()
        ));
    }
    Ok(())
}

// ── 2. Transfer insert/get round-trip ─────────────────────────────────────────

async fn transfer_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_transfer(make_transfer("tp-1"))
        .await
        .map_err(|e| e.to_string())?;
    let stored = s.get_transfer("tp-1").await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    if stored.value.consumer_id.is_some() {
        return Err("omitted consumer_id came back as Some".to_string());
    }
    Ok(())
}

// ── 3. Journey run round-trip preserves the step pointer ──────────────────────

async fn journey_run_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let run = make_run("run-1");
    let expected_step = run.current_step.clone();
    s.insert_run(run).await.map_err(|e| e.to_string())?;
    let stored = s.get_run("run-1").await.map_err(|e| e.to_string())?;
    if stored.value.status != RunStatus::Active {
        return Err(format!("expected active run, got {:?}", stored.value.status));
    }
    if stored.value.current_step != expected_step {
        return Err(format!(
            "expected current_step \"{}\", got \"{}\"",
            expected_step, stored.value.current_step
        ));
    }
    Ok(())
}

// ── 4. Compliance run round-trip preserves report and payload ─────────────────

async fn compliance_run_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_compliance_run(make_compliance_run("cr-1"))
        .await
        .map_err(|e| e.to_string())?;
    let stored = s
        .get_compliance_run("cr-1")
        .await
        .map_err(|e| e.to_string())?;
    if stored.value.payload["id"] != "urn:dpp:asset-001" {
        return Err("payload not preserved".to_string());
    }
    if !stored.value.fixes.is_empty() {
        return Err("fresh run should have an empty fix history".to_string());
    }
    Ok(())
}

// ── 5. Template seed, get by code, list in code order ─────────────────────────

async fn templates_seed_get_and_list<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.seed_templates(JourneyTemplate::builtin())
        .await
        .map_err(|e| e.to_string())?;
    let template = s
        .get_template("manufacturer-core-e2e")
        .await
        .map_err(|e| e.to_string())?;
    if template.steps.is_empty() {
        return Err("seeded template lost its steps".to_string());
    }
    let listed = s.list_templates().await.map_err(|e| e.to_string())?;
    let mut codes: Vec<_> = listed.iter().map(|t| t.code.clone()).collect();
    let sorted = {
        let mut c = codes.clone();
        c.sort();
        c
    };
    if codes != sorted {
        return Err(format!("expected templates in code order, got {:?}", codes));
    }
    codes.dedup();
    if codes.len() != listed.len() {
        return Err("duplicate template codes after seeding".to_string());
    }
    Ok(())
}

// ── 6. Seeding twice replaces rather than duplicates ──────────────────────────

async fn template_seeding_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.seed_templates(JourneyTemplate::builtin())
        .await
        .map_err(|e| e.to_string())?;
    s.seed_templates(JourneyTemplate::builtin())
        .await
        .map_err(|e| e.to_string())?;
    let listed = s.list_templates().await.map_err(|e| e.to_string())?;
    if listed.len() != JourneyTemplate::builtin().len() {
        return Err(format!(
            "expected {} templates after re-seeding, got {}",
            JourneyTemplate::builtin().len(),
            listed.len()
        ));
    }
    Ok(())
}

// ── 7. Feedback appends in insertion order and filters by flow ────────────────

async fn feedback_appends_in_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, flow) in [("f-1", "flow-a"), ("f-2", "flow-b"), ("f-3", "flow-a")] {
        let entry = FeedbackEntry::new(id, 4, "en", "manufacturer", flow, None)
            .map_err(|e| e.to_string())?;
        s.insert_feedback(entry).await.map_err(|e| e.to_string())?;
    }
    let all = s.list_feedback(None).await.map_err(|e| e.to_string())?;
    let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
    if ids != ["f-1", "f-2", "f-3"] {
        return Err(format!("expected insertion order, got {:?}", ids));
    }
    let flow_a = s
        .list_feedback(Some("flow-a"))
        .await
        .map_err(|e| e.to_string())?;
    if flow_a.len() != 2 {
        return Err(format!("expected 2 flow-a entries, got {}", flow_a.len()));
    }
    Ok(())
}
