//! Journey run orchestration: start a run from a template, execute its
//! steps in order, abandon early.
//!
//! Executing a step delegates to the matching simulator (passport
//! creation, compliance check, negotiation, transfer, feedback) and
//! records the ids of whatever the delegation produced, both on the
//! step execution and on the run itself so later steps can pick them
//! up. After each committed step the run's twin graph is snapshotted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use passage_core::journey::{DEFAULT_LOCALE, DEFAULT_ROLE, DEFAULT_TEMPLATE};
use passage_core::{
    Error, JourneyRun, JourneyStep, JourneyTemplate, StepActionKind, StepExecution, TwinEdge,
    TwinGraph, TwinNode,
};
use passage_storage::{PassageStore, StorageError};

use crate::compliance::{self, CheckRequest};
use crate::dataspace::{self, CreateNegotiationRequest, CreateTransferRequest};
use crate::evaluator::ComplianceEvaluator;
use crate::feedback::{self, FeedbackRequest};
use crate::{new_id, OCC_RETRY_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct StartRunRequest {
    #[serde(default)]
    pub template_code: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteStepRequest {
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub run_id: String,
    pub execution: StepExecution,
    pub next_step: String,
}

/// What a delegated step action produced.
struct Delegation {
    /// Linkage ids recorded on the step execution.
    link: Map<String, Value>,
    /// Keys promoted onto the run for later steps.
    run_metadata: Map<String, Value>,
}

// ── Templates ─────────────────────────────────────────────────────────────────

pub async fn list_templates<S: PassageStore>(store: &S) -> Result<Vec<JourneyTemplate>, Error> {
    store
        .list_templates()
        .await
        .map_err(StorageError::into_core)
}

pub async fn get_template<S: PassageStore>(
    store: &S,
    code: &str,
) -> Result<JourneyTemplate, Error> {
    store
        .get_template(code)
        .await
        .map_err(StorageError::into_core)
}

// ── Runs ──────────────────────────────────────────────────────────────────────

pub async fn start_run<S: PassageStore>(
    store: &S,
    request: StartRunRequest,
) -> Result<JourneyRun, Error> {
    let code = request
        .template_code
        .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
    let template = get_template(store, &code).await?;
    let run = JourneyRun::start(
        new_id("run"),
        &template,
        request.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        request.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        request.metadata.unwrap_or_default(),
    );
    store
        .insert_run(run.clone())
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        run_id = %run.id,
        template = %run.template_code,
        role = %run.role,
        "journey run started"
    );
    Ok(run)
}

pub async fn get_run<S: PassageStore>(store: &S, id: &str) -> Result<JourneyRun, Error> {
    Ok(store
        .get_run(id)
        .await
        .map_err(StorageError::into_core)?
        .value)
}

pub async fn abandon_run<S: PassageStore>(store: &S, id: &str) -> Result<JourneyRun, Error> {
    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store.get_run(id).await.map_err(StorageError::into_core)?;
        let mut run = stored.value;
        run.abandon()?;
        match store.update_run(run.clone(), stored.version).await {
            Ok(_) => {
                tracing::info!(run_id = %id, "journey run abandoned");
                return Ok(run);
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "journey run '{id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}

/// Execute the run's current step.
///
/// The step's action runs exactly once, before the run write. Only the
/// write itself retries on version conflicts, and the in-order check is
/// repeated there, so a racing executor gets a transition error rather
/// than a double execution of the same step.
pub async fn execute_step<S, E>(
    store: &S,
    evaluator: &E,
    run_id: &str,
    step_id: &str,
    request: ExecuteStepRequest,
) -> Result<StepOutcome, Error>
where
    S: PassageStore,
    E: ComplianceEvaluator,
{
    let current = get_run(store, run_id).await?;
    let template = get_template(store, &current.template_code).await?;
    current.ensure_step(&template, step_id)?;
    let step = template.step(step_id).ok_or_else(|| {
        Error::invalid_field(
            "step_id",
            format!("step '{step_id}' is not part of template '{}'", template.code),
        )
    })?;

    let payload = effective_payload(step, request.payload)?;
    let delegation = perform_step_action(store, evaluator, &current, step, &payload).await?;

    let mut metadata = request.metadata.unwrap_or_default();
    metadata.extend(delegation.link.clone());
    let execution = StepExecution::completed(step_id, payload, metadata);

    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store.get_run(run_id).await.map_err(StorageError::into_core)?;
        let mut run = stored.value;
        run.advance(&template, execution.clone())?;
        for (key, value) in delegation.run_metadata.clone() {
            run.metadata.insert(key, value);
        }
        match store.update_run(run.clone(), stored.version).await {
            Ok(_) => {
                tracing::info!(
                    run_id = %run_id,
                    step = %step_id,
                    action = %step.action,
                    next_step = %run.current_step,
                    "journey step executed"
                );
                if let Err(error) = capture_run_snapshot(store, &run, step_id, step.action).await {
                    tracing::warn!(run_id = %run_id, step = %step_id, %error, "twin capture failed");
                }
                return Ok(StepOutcome {
                    run_id: run.id.clone(),
                    execution,
                    next_step: run.current_step.clone(),
                });
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "journey run '{run_id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}

/// The step's default payload shallow-merged with the caller's
/// overrides. Both sides must be objects; a null override counts as
/// absent.
fn effective_payload(step: &JourneyStep, provided: Option<Value>) -> Result<Value, Error> {
    let mut merged = match &step.default_payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    match provided {
        None | Some(Value::Null) => {}
        Some(Value::Object(overrides)) => {
            for (key, value) in overrides {
                merged.insert(key, value);
            }
        }
        Some(_) => {
            return Err(Error::invalid_field(
                "payload",
                "payload must be a JSON object",
            ));
        }
    }
    Ok(Value::Object(merged))
}

// ── Step delegation ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct DataspaceParams {
    #[serde(default)]
    asset_id: Option<String>,
    #[serde(default)]
    consumer_id: Option<String>,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    policy: Option<Value>,
}

fn dataspace_params(payload: &Value) -> Result<DataspaceParams, Error> {
    serde_json::from_value(payload.clone())
        .map_err(|err| Error::invalid_field("payload", err.to_string()))
}

/// The asset a dataspace step acts on: explicit in the payload, else
/// the passport created earlier in the run.
fn resolved_asset_id(explicit: Option<String>, run: &JourneyRun) -> Result<String, Error> {
    explicit
        .or_else(|| {
            run.metadata
                .get("dpp_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .ok_or_else(|| Error::invalid_field("asset_id", "asset_id is required"))
}

fn required_field(params: Option<String>, field: &'static str) -> Result<String, Error> {
    params.ok_or_else(|| Error::invalid_field(field, format!("{field} is required")))
}

async fn perform_step_action<S, E>(
    store: &S,
    evaluator: &E,
    run: &JourneyRun,
    step: &JourneyStep,
    payload: &Value,
) -> Result<Delegation, Error>
where
    S: PassageStore,
    E: ComplianceEvaluator,
{
    let mut link = Map::new();
    let mut run_metadata = Map::new();
    match step.action {
        StepActionKind::AasCreate => {
            let dpp_id = payload
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("urn:dpp:run:{}", run.id));
            link.insert("dpp_id".to_string(), Value::String(dpp_id.clone()));
            run_metadata.insert("dpp_id".to_string(), Value::String(dpp_id));
            run_metadata.insert("product".to_string(), payload.clone());
        }
        StepActionKind::ComplianceCheck => {
            let product = match payload.get("payload") {
                Some(value) if !value.is_null() => value.clone(),
                _ => run
                    .metadata
                    .get("product")
                    .cloned()
                    .unwrap_or_else(|| json!({})),
            };
            let regulations = payload
                .get("regulations")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|err| Error::invalid_field("regulations", err.to_string()))?;
            let record = compliance::run_check(
                store,
                evaluator,
                CheckRequest {
                    dpp_id: run
                        .metadata
                        .get("dpp_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    regulations,
                    payload: product,
                },
            )
            .await?;
            link.insert(
                "compliance_run_id".to_string(),
                Value::String(record.id.clone()),
            );
            link.insert(
                "status".to_string(),
                Value::String(record.report.status.to_string()),
            );
            run_metadata.insert("compliance_run_id".to_string(), Value::String(record.id));
        }
        StepActionKind::EdcNegotiate => {
            let params = dataspace_params(payload)?;
            let negotiation = dataspace::run_canonical_negotiation(
                store,
                CreateNegotiationRequest {
                    asset_id: resolved_asset_id(params.asset_id, run)?,
                    consumer_id: required_field(params.consumer_id, "consumer_id")?,
                    provider_id: required_field(params.provider_id, "provider_id")?,
                    policy: params.policy,
                },
            )
            .await?;
            link.insert(
                "negotiation_id".to_string(),
                Value::String(negotiation.id.clone()),
            );
            link.insert(
                "state".to_string(),
                Value::String(negotiation.state.as_str().to_string()),
            );
            run_metadata.insert("negotiation_id".to_string(), Value::String(negotiation.id));
        }
        StepActionKind::EdcTransfer => {
            let params = dataspace_params(payload)?;
            let transfer = dataspace::run_canonical_transfer(
                store,
                CreateTransferRequest {
                    asset_id: resolved_asset_id(params.asset_id, run)?,
                    consumer_id: params.consumer_id,
                    provider_id: params.provider_id,
                },
            )
            .await?;
            link.insert("transfer_id".to_string(), Value::String(transfer.id.clone()));
            link.insert(
                "state".to_string(),
                Value::String(transfer.state.as_str().to_string()),
            );
            run_metadata.insert("transfer_id".to_string(), Value::String(transfer.id));
        }
        StepActionKind::FeedbackCsat => {
            let score = payload
                .get("score")
                .and_then(Value::as_u64)
                .ok_or_else(|| Error::invalid_field("score", "score is required"))?;
            let score = u8::try_from(score).map_err(|_| {
                Error::invalid_field("score", format!("score must be between 1 and 5, got {score}"))
            })?;
            let entry = feedback::record_feedback(
                store,
                FeedbackRequest {
                    score,
                    locale: Some(run.locale.clone()),
                    role: Some(run.role.clone()),
                    flow: Some(run.template_code.clone()),
                    comment: payload
                        .get("comment")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                },
            )
            .await?;
            link.insert("feedback_id".to_string(), Value::String(entry.id));
            link.insert("score".to_string(), Value::from(entry.score));
        }
    }
    Ok(Delegation { link, run_metadata })
}

// ── Twin capture ──────────────────────────────────────────────────────────────

/// Snapshot the run's linkage graph after a committed step.
///
/// Failures here are reported by the caller but never fail the step.
async fn capture_run_snapshot<S: PassageStore>(
    store: &S,
    run: &JourneyRun,
    step_id: &str,
    action: StepActionKind,
) -> Result<(), Error> {
    let dpp_id = run
        .metadata
        .get("dpp_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("urn:dpp:run:{}", run.id));
    let product_label = run
        .metadata
        .get("product")
        .and_then(|product| product.get("product_name"))
        .and_then(Value::as_str)
        .unwrap_or(&dpp_id)
        .to_string();

    let mut nodes = vec![TwinNode {
        id: dpp_id.clone(),
        label: product_label,
        node_type: "product".to_string(),
    }];
    let mut edges = Vec::new();

    if let Some(id) = run.metadata.get("compliance_run_id").and_then(Value::as_str) {
        let record = compliance::get_compliance_run(store, id).await?;
        nodes.push(TwinNode {
            id: id.to_string(),
            label: record.report.status.to_string(),
            node_type: "compliance".to_string(),
        });
        edges.push(TwinEdge {
            id: format!("validates-{id}"),
            source: id.to_string(),
            target: dpp_id.clone(),
            label: Some("validates".to_string()),
        });
    }
    if let Some(id) = run.metadata.get("negotiation_id").and_then(Value::as_str) {
        let negotiation = dataspace::get_negotiation(store, id).await?;
        nodes.push(TwinNode {
            id: id.to_string(),
            label: negotiation.state.as_str().to_string(),
            node_type: "negotiation".to_string(),
        });
        edges.push(TwinEdge {
            id: format!("negotiates-{id}"),
            source: id.to_string(),
            target: dpp_id.clone(),
            label: Some("negotiates".to_string()),
        });
    }
    if let Some(id) = run.metadata.get("transfer_id").and_then(Value::as_str) {
        let transfer = dataspace::get_transfer(store, id).await?;
        nodes.push(TwinNode {
            id: id.to_string(),
            label: transfer.state.as_str().to_string(),
            node_type: "transfer".to_string(),
        });
        edges.push(TwinEdge {
            id: format!("transfers-{id}"),
            source: dpp_id.clone(),
            target: id.to_string(),
            label: Some("transfers".to_string()),
        });
    }

    let graph = TwinGraph::new(nodes, edges);
    graph.validate()?;
    let mut metadata = Map::new();
    metadata.insert("run_id".to_string(), Value::String(run.id.clone()));
    metadata.insert("step_id".to_string(), Value::String(step_id.to_string()));
    metadata.insert(
        "action".to_string(),
        Value::String(action.as_str().to_string()),
    );
    store
        .record_snapshot(&dpp_id, step_id, metadata, graph)
        .await
        .map_err(StorageError::into_core)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::RuleEvaluator;
    use passage_core::journey::STEP_DONE;
    use passage_core::{NegotiationState, RunStatus, TransferState};
    use passage_storage::{MemoryStore, PassageStore};

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_templates(JourneyTemplate::builtin()).await.unwrap();
        store
    }

    fn start_request() -> StartRunRequest {
        StartRunRequest {
            template_code: None,
            role: None,
            locale: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn start_fills_defaults_and_points_at_the_first_step() {
        let store = seeded_store().await;
        let run = start_run(&store, start_request()).await.unwrap();
        assert_eq!(run.template_code, DEFAULT_TEMPLATE);
        assert_eq!(run.role, "manufacturer");
        assert_eq!(run.locale, "en");
        assert_eq!(run.current_step, "create-dpp");
        assert_eq!(run.status, RunStatus::Active);
    }

    #[tokio::test]
    async fn start_with_an_unknown_template_is_not_found() {
        let store = seeded_store().await;
        let err = start_run(
            &store,
            StartRunRequest {
                template_code: Some("recycler-intake".to_string()),
                role: None,
                locale: None,
                metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_dpp_step_links_the_passport_onto_the_run() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let outcome = execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            ExecuteStepRequest::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.next_step, "run-compliance");
        assert_eq!(
            outcome.execution.metadata["dpp_id"],
            json!("urn:dpp:asset-001")
        );
        let run = get_run(&store, &run.id).await.unwrap();
        assert_eq!(run.metadata["dpp_id"], json!("urn:dpp:asset-001"));
        assert_eq!(run.metadata["product"]["product_name"], "EV Battery Module");
    }

    #[tokio::test]
    async fn payload_overrides_merge_over_the_step_defaults() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let outcome = execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            ExecuteStepRequest {
                payload: Some(json!({"id": "urn:dpp:custom-7"})),
                metadata: None,
            },
        )
        .await
        .unwrap();

        // Override wins, untouched defaults survive.
        assert_eq!(outcome.execution.payload["id"], "urn:dpp:custom-7");
        assert_eq!(outcome.execution.payload["product_name"], "EV Battery Module");
        assert_eq!(
            outcome.execution.metadata["dpp_id"],
            json!("urn:dpp:custom-7")
        );
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let err = execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            ExecuteStepRequest {
                payload: Some(json!([1, 2, 3])),
                metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("payload"));
    }

    #[tokio::test]
    async fn out_of_order_step_is_rejected_before_any_side_effect() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let err = execute_step(
            &store,
            &evaluator,
            &run.id,
            "run-negotiation",
            ExecuteStepRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        // No negotiation was created.
        let run = get_run(&store, &run.id).await.unwrap();
        assert!(run.steps.is_empty());
        assert!(run.metadata.get("negotiation_id").is_none());
    }

    #[tokio::test]
    async fn full_walk_completes_and_links_every_artifact() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        for step_id in [
            "create-dpp",
            "run-compliance",
            "run-negotiation",
            "run-transfer",
            "collect-feedback",
        ] {
            execute_step(&store, &evaluator, &run.id, step_id, ExecuteStepRequest::default())
                .await
                .unwrap();
        }

        let run = get_run(&store, &run.id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.current_step, STEP_DONE);
        assert_eq!(run.steps.len(), 5);

        // Every simulator left its id on the run.
        let compliance_id = run.metadata["compliance_run_id"].as_str().unwrap();
        let negotiation_id = run.metadata["negotiation_id"].as_str().unwrap();
        let transfer_id = run.metadata["transfer_id"].as_str().unwrap();

        let record = compliance::get_compliance_run(&store, compliance_id)
            .await
            .unwrap();
        assert_eq!(record.dpp_id.as_deref(), Some("urn:dpp:asset-001"));
        // The canonical product ships without battery data.
        assert_eq!(record.report.summary.violations, 2);

        let negotiation = dataspace::get_negotiation(&store, negotiation_id)
            .await
            .unwrap();
        assert_eq!(negotiation.state, NegotiationState::Accept);
        let transfer = dataspace::get_transfer(&store, transfer_id).await.unwrap();
        assert_eq!(transfer.state, TransferState::Complete);

        let entries = feedback::list_feedback(&store, Some(DEFAULT_TEMPLATE))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 5);
    }

    #[tokio::test]
    async fn each_step_snapshots_the_linkage_graph() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        for step_id in [
            "create-dpp",
            "run-compliance",
            "run-negotiation",
            "run-transfer",
            "collect-feedback",
        ] {
            execute_step(&store, &evaluator, &run.id, step_id, ExecuteStepRequest::default())
                .await
                .unwrap();
        }

        let snapshots = store
            .list_snapshots("urn:dpp:asset-001", usize::MAX, 0)
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 5);
        assert_eq!(snapshots[0].label, "create-dpp");
        assert_eq!(snapshots[0].graph.nodes.len(), 1);

        let last = &snapshots[4];
        assert_eq!(last.label, "collect-feedback");
        assert_eq!(last.metadata["run_id"], json!(run.id));
        assert_eq!(last.metadata["action"], json!("feedback.csat"));
        let types: Vec<&str> = last
            .graph
            .nodes
            .iter()
            .map(|node| node.node_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["product", "compliance", "negotiation", "transfer"]
        );
        assert_eq!(last.graph.edges.len(), 3);
        // Transfer edge points away from the product.
        let transfer_edge = &last.graph.edges[2];
        assert_eq!(transfer_edge.source, "urn:dpp:asset-001");
        assert_eq!(transfer_edge.label.as_deref(), Some("transfers"));
    }

    #[tokio::test]
    async fn abandoned_run_accepts_no_steps_and_no_second_abandon() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let abandoned = abandon_run(&store, &run.id).await.unwrap();
        assert_eq!(abandoned.status, RunStatus::Abandoned);

        let err = execute_step(
            &store,
            &evaluator,
            &run.id,
            "create-dpp",
            ExecuteStepRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert!(abandon_run(&store, &run.id).await.is_err());
    }

    #[tokio::test]
    async fn unknown_step_id_names_the_field() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        let err = execute_step(
            &store,
            &evaluator,
            &run.id,
            "ship-product",
            ExecuteStepRequest::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("step_id"));
    }

    #[tokio::test]
    async fn feedback_step_rejects_an_out_of_range_score() {
        let store = seeded_store().await;
        let evaluator = RuleEvaluator::builtin().unwrap();
        let run = start_run(&store, start_request()).await.unwrap();

        for step_id in ["create-dpp", "run-compliance", "run-negotiation", "run-transfer"] {
            execute_step(&store, &evaluator, &run.id, step_id, ExecuteStepRequest::default())
                .await
                .unwrap();
        }

        let err = execute_step(
            &store,
            &evaluator,
            &run.id,
            "collect-feedback",
            ExecuteStepRequest {
                payload: Some(json!({"score": 11})),
                metadata: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("score"));
        // The run did not advance.
        let run = get_run(&store, &run.id).await.unwrap();
        assert_eq!(run.current_step, "collect-feedback");
    }
}
