//! End-to-end journey integration tests.
//!
//! Drives the full manufacturer flow through the public engine API and
//! checks the cross-module wiring the unit tests cannot see:
//!
//! 1. A complete walk links passport, compliance run, negotiation,
//!    transfer, and feedback onto one run
//! 2. The twin timeline grows one snapshot per step and diffs cleanly
//!    between first and last
//! 3. Fix then recheck flips the journey's compliance run to compliant
//!    without losing the audit trail
//! 4. Two executors racing the same step commit it exactly once
//! 5. A step whose delegation fails leaves the run untouched, so the
//!    retry commits exactly one record

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use passage_core::journey::DEFAULT_TEMPLATE;
use passage_core::{
    ComplianceReport, ComplianceStatus, Error, JourneyRun, JourneyTemplate, RunStatus,
};
use passage_engine::evaluator::{ComplianceEvaluator, RuleEvaluator};
use passage_engine::{compliance, feedback, journey, twin};
use passage_storage::{MemoryStore, PassageStore};

const STEP_SEQUENCE: [&str; 5] = [
    "create-dpp",
    "run-compliance",
    "run-negotiation",
    "run-transfer",
    "collect-feedback",
];

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed_templates(JourneyTemplate::builtin())
        .await
        .unwrap();
    store
}

fn start_request() -> journey::StartRunRequest {
    journey::StartRunRequest {
        template_code: None,
        role: None,
        locale: None,
        metadata: None,
    }
}

/// Start a run and execute every step with its default payload.
async fn walk_full_journey(store: &MemoryStore, evaluator: &RuleEvaluator) -> JourneyRun {
    let run = journey::start_run(store, start_request()).await.unwrap();
    for step_id in STEP_SEQUENCE {
        journey::execute_step(
            store,
            evaluator,
            &run.id,
            step_id,
            journey::ExecuteStepRequest::default(),
        )
        .await
        .unwrap();
    }
    journey::get_run(store, &run.id).await.unwrap()
}

#[tokio::test]
async fn full_journey_completes_with_all_artifacts_linked() {
    let store = seeded_store().await;
    let evaluator = RuleEvaluator::builtin().unwrap();
    let run = walk_full_journey(&store, &evaluator).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.steps.len(), 5);
    for key in ["dpp_id", "compliance_run_id", "negotiation_id", "transfer_id"] {
        assert!(run.metadata.contains_key(key), "run metadata missing {key}");
    }

    // Step executions carry the linkage their delegation produced.
    assert_eq!(run.steps[0].metadata["dpp_id"], json!("urn:dpp:asset-001"));
    assert_eq!(run.steps[1].metadata["status"], json!("non-compliant"));
    assert_eq!(run.steps[2].metadata["state"], json!("ACCEPT"));
    assert_eq!(run.steps[3].metadata["state"], json!("COMPLETE"));
    assert!(run.steps[4].metadata["feedback_id"].is_string());

    let entries = feedback::list_feedback(&store, Some(DEFAULT_TEMPLATE))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, "manufacturer");
}

#[tokio::test]
async fn twin_timeline_grows_per_step_and_diffs_between_ends() {
    let store = seeded_store().await;
    let evaluator = RuleEvaluator::builtin().unwrap();
    walk_full_journey(&store, &evaluator).await;

    let overview = twin::latest_graph(&store, "urn:dpp:asset-001").await.unwrap();
    assert_eq!(overview.timeline.len(), 5);
    assert_eq!(overview.nodes.len(), 4);
    assert_eq!(overview.edges.len(), 3);

    let page = twin::list_history(&store, "urn:dpp:asset-001", Some(2), Some(3))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[1].label, "collect-feedback");

    let first = overview.timeline[0].snapshot_id;
    let last = overview.timeline[4].snapshot_id;
    let result = twin::diff_snapshots(&store, "urn:dpp:asset-001", first, last)
        .await
        .unwrap();
    // Product node was there from the start, the three simulators were
    // linked afterwards.
    assert_eq!(result.diff.summary.nodes_added, 3);
    assert_eq!(result.diff.summary.nodes_removed, 0);
    assert_eq!(result.diff.summary.edges_added, 3);
}

#[tokio::test]
async fn fix_and_recheck_resolve_the_journey_compliance_run() {
    let store = seeded_store().await;
    let evaluator = RuleEvaluator::builtin().unwrap();
    let run = walk_full_journey(&store, &evaluator).await;
    let compliance_run_id = run.metadata["compliance_run_id"].as_str().unwrap();

    let before = compliance::get_compliance_run(&store, compliance_run_id)
        .await
        .unwrap();
    assert_eq!(before.report.status, ComplianceStatus::NonCompliant);
    assert_eq!(before.report.summary.violations, 2);

    compliance::apply_fix(
        &store,
        compliance_run_id,
        compliance::FixRequest::Single {
            path: "$.battery".to_string(),
            value: json!({"chemistry": "NMC", "capacity_kwh": 42}),
        },
    )
    .await
    .unwrap();

    let after = compliance::recheck(&store, &evaluator, compliance_run_id)
        .await
        .unwrap();
    assert_eq!(after.report.status, ComplianceStatus::Compliant);
    assert!(after.report.violations.is_empty());
    assert_eq!(after.fixes.len(), 1);
    assert_eq!(after.fixes[0].path, "/battery");
}

#[tokio::test]
async fn racing_executors_commit_a_step_exactly_once() {
    let store = seeded_store().await;
    let evaluator = RuleEvaluator::builtin().unwrap();
    let run = journey::start_run(&store, start_request()).await.unwrap();

    let (left, right) = tokio::join!(
        journey::execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            journey::ExecuteStepRequest::default(),
        ),
        journey::execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            journey::ExecuteStepRequest::default(),
        ),
    );

    let outcomes = [left, right];
    let won = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(won, 1);
    for outcome in &outcomes {
        if let Err(error) = outcome {
            assert!(matches!(error, Error::InvalidStateTransition { .. }));
        }
    }

    let run = journey::get_run(&store, &run.id).await.unwrap();
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.current_step, "run-compliance");
}

/// Fails the first evaluation, then behaves like the built-in evaluator.
struct FlakyEvaluator {
    failed_once: AtomicBool,
    inner: RuleEvaluator,
}

#[async_trait]
impl ComplianceEvaluator for FlakyEvaluator {
    async fn evaluate(
        &self,
        payload: &Value,
        regulations: &[String],
    ) -> Result<ComplianceReport, Error> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(Error::upstream("compliance evaluator unreachable"));
        }
        self.inner.evaluate(payload, regulations).await
    }
}

#[tokio::test]
async fn failed_delegation_does_not_advance_and_the_retry_commits_once() {
    let store = seeded_store().await;
    let evaluator = FlakyEvaluator {
        failed_once: AtomicBool::new(false),
        inner: RuleEvaluator::builtin().unwrap(),
    };
    let run = journey::start_run(&store, start_request()).await.unwrap();
    journey::execute_step(
        &store,
        &evaluator,
        &run.id,
        "create-dpp",
        journey::ExecuteStepRequest::default(),
    )
    .await
    .unwrap();

    let err = journey::execute_step(
        &store,
        &evaluator,
        &run.id,
        "run-compliance",
        journey::ExecuteStepRequest::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable { .. }));

    // No partial record, no pointer movement, no linked compliance run.
    let stalled = journey::get_run(&store, &run.id).await.unwrap();
    assert_eq!(stalled.steps.len(), 1);
    assert_eq!(stalled.current_step, "run-compliance");
    assert!(stalled.metadata.get("compliance_run_id").is_none());

    // The same step retried lands exactly one record.
    journey::execute_step(
        &store,
        &evaluator,
        &run.id,
        "run-compliance",
        journey::ExecuteStepRequest::default(),
    )
    .await
    .unwrap();
    let run = journey::get_run(&store, &run.id).await.unwrap();
    assert_eq!(run.steps.len(), 2);
    assert_eq!(run.steps[1].step_id, "run-compliance");
    assert_eq!(run.current_step, "run-negotiation");
    assert!(run.metadata["compliance_run_id"].is_string());
}
