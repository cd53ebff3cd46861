//! `passage run` -- drive the canonical journey end to end and print
//! the transcript.
//!
//! Without `--server` the journey runs against an in-process store and
//! the built-in rule book. With `--server` the same sequence of calls
//! goes to a running `passage serve` instance over HTTP. Either way the
//! transcript collects the run, the dataspace artifacts it produced,
//! the compliance outcome, the twin timeline, and the recorded
//! feedback.

use std::path::PathBuf;
use std::process;

use serde_json::{Map, Value};

use passage_core::JourneyTemplate;
use passage_engine::journey::{ExecuteStepRequest, StartRunRequest};
use passage_engine::twin::HISTORY_MAX_LIMIT;
use passage_engine::{compliance, dataspace, feedback, journey, twin, RuleEvaluator};
use passage_storage::{MemoryStore, PassageStore};

use crate::{report_error, OutputFormat};

pub(crate) struct RunOptions {
    pub(crate) template: String,
    pub(crate) role: String,
    pub(crate) locale: String,
    pub(crate) payload: Option<PathBuf>,
    pub(crate) server: Option<String>,
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
}

pub(crate) fn cmd_run(options: RunOptions) {
    // Per-step payload overrides: a JSON object keyed by step id.
    let overrides = match &options.payload {
        Some(path) => {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    let msg = format!("error reading '{}': {}", path.display(), e);
                    report_error(&msg, options.output, options.quiet);
                    process::exit(1);
                }
            };
            let value: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
                    report_error(&msg, options.output, options.quiet);
                    process::exit(1);
                }
            };
            match value {
                Value::Object(map) => map,
                _ => {
                    let msg = format!(
                        "'{}' must hold a JSON object mapping step ids to payloads",
                        path.display()
                    );
                    report_error(&msg, options.output, options.quiet);
                    process::exit(1);
                }
            }
        }
        None => Map::new(),
    };

    let transcript = match &options.server {
        Some(server) => remote_transcript(server, &options, &overrides),
        None => {
            let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            rt.block_on(local_transcript(&options, &overrides))
        }
    };

    match transcript {
        Ok(transcript) => print_transcript(&transcript, options.output, options.quiet),
        Err(msg) => {
            report_error(&msg, options.output, options.quiet);
            process::exit(1);
        }
    }
}

// ── In-process driver ─────────────────────────────────────────────────────────

async fn local_transcript(
    options: &RunOptions,
    overrides: &Map<String, Value>,
) -> Result<Value, String> {
    let store = MemoryStore::new();
    store
        .seed_templates(JourneyTemplate::builtin())
        .await
        .map_err(|e| e.to_string())?;
    let evaluator = RuleEvaluator::builtin().map_err(|e| e.to_string())?;

    let run = journey::start_run(
        &store,
        StartRunRequest {
            template_code: Some(options.template.clone()),
            role: Some(options.role.clone()),
            locale: Some(options.locale.clone()),
            metadata: None,
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let template = journey::get_template(&store, &run.template_code)
        .await
        .map_err(|e| e.to_string())?;

    for step in &template.steps {
        journey::execute_step(
            &store,
            &evaluator,
            &run.id,
            &step.key,
            ExecuteStepRequest {
                payload: overrides.get(&step.key).cloned(),
                metadata: None,
            },
        )
        .await
        .map_err(|e| format!("step '{}': {}", step.key, e))?;
    }

    let finished = journey::get_run(&store, &run.id)
        .await
        .map_err(|e| e.to_string())?;

    let mut transcript = Map::new();
    transcript.insert("run".to_string(), to_value(&finished)?);

    if let Some(id) = metadata_str(&finished.metadata, "negotiation_id") {
        let negotiation = dataspace::get_negotiation(&store, &id)
            .await
            .map_err(|e| e.to_string())?;
        transcript.insert("negotiation".to_string(), to_value(&negotiation)?);
    }
    if let Some(id) = metadata_str(&finished.metadata, "transfer_id") {
        let transfer = dataspace::get_transfer(&store, &id)
            .await
            .map_err(|e| e.to_string())?;
        transcript.insert("transfer".to_string(), to_value(&transfer)?);
    }
    if let Some(id) = metadata_str(&finished.metadata, "compliance_run_id") {
        let run = compliance::get_compliance_run(&store, &id)
            .await
            .map_err(|e| e.to_string())?;
        transcript.insert("compliance_run".to_string(), to_value(&run)?);
    }
    if let Some(dpp_id) = metadata_str(&finished.metadata, "dpp_id") {
        let overview = twin::latest_graph(&store, &dpp_id)
            .await
            .map_err(|e| e.to_string())?;
        let history = twin::list_history(&store, &dpp_id, Some(HISTORY_MAX_LIMIT), None)
            .await
            .map_err(|e| e.to_string())?;
        if let (Some(first), Some(last)) = (history.items.first(), history.items.last()) {
            if first.snapshot_id != last.snapshot_id {
                let diff =
                    twin::diff_snapshots(&store, &dpp_id, first.snapshot_id, last.snapshot_id)
                        .await
                        .map_err(|e| e.to_string())?;
                transcript.insert("diff".to_string(), to_value(&diff)?);
            }
        }
        transcript.insert("twin".to_string(), to_value(&overview)?);
    }

    let entries = feedback::list_feedback(&store, Some(&finished.template_code))
        .await
        .map_err(|e| e.to_string())?;
    if let Some(entry) = entries.last() {
        transcript.insert("feedback".to_string(), to_value(entry)?);
    }

    Ok(Value::Object(transcript))
}

fn metadata_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("serialization error: {e}"))
}

// ── Remote driver ─────────────────────────────────────────────────────────────

fn remote_transcript(
    server: &str,
    options: &RunOptions,
    overrides: &Map<String, Value>,
) -> Result<Value, String> {
    let base = server.trim_end_matches('/');
    let agent = ureq::Agent::new_with_defaults();

    let template = get_json(
        &agent,
        &format!("{base}/journeys/templates/{}", options.template),
    )?;
    let steps = template
        .get("steps")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let run = post_json(
        &agent,
        &format!("{base}/journeys/runs"),
        &serde_json::json!({
            "template_code": options.template,
            "role": options.role,
            "locale": options.locale,
        }),
    )?;
    let run_id = run
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| "server returned a run without an id".to_string())?
        .to_string();

    for step in &steps {
        let key = step
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| "server returned a template step without a key".to_string())?;
        let mut body = Map::new();
        if let Some(payload) = overrides.get(key) {
            body.insert("payload".to_string(), payload.clone());
        }
        post_json(
            &agent,
            &format!("{base}/journeys/runs/{run_id}/steps/{key}"),
            &Value::Object(body),
        )
        .map_err(|e| format!("step '{key}': {e}"))?;
    }

    let finished = get_json(&agent, &format!("{base}/journeys/runs/{run_id}"))?;
    let metadata = finished
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut transcript = Map::new();

    if let Some(id) = metadata_str(&metadata, "negotiation_id") {
        let negotiation = get_json(&agent, &format!("{base}/negotiations/{id}"))?;
        transcript.insert("negotiation".to_string(), negotiation);
    }
    if let Some(id) = metadata_str(&metadata, "transfer_id") {
        let transfer = get_json(&agent, &format!("{base}/transfers/{id}"))?;
        transcript.insert("transfer".to_string(), transfer);
    }
    if let Some(id) = metadata_str(&metadata, "compliance_run_id") {
        let run = get_json(&agent, &format!("{base}/compliance/runs/{id}"))?;
        transcript.insert("compliance_run".to_string(), run);
    }
    if let Some(dpp_id) = metadata_str(&metadata, "dpp_id") {
        let overview = get_json(&agent, &format!("{base}/digital-twins/{dpp_id}"))?;
        let timeline = overview
            .get("timeline")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let first = timeline.first().and_then(|s| s.get("snapshot_id")).and_then(Value::as_u64);
        let last = timeline.last().and_then(|s| s.get("snapshot_id")).and_then(Value::as_u64);
        if let (Some(from), Some(to)) = (first, last) {
            if from != to {
                let diff = get_json(
                    &agent,
                    &format!("{base}/digital-twins/{dpp_id}/diff?from={from}&to={to}"),
                )?;
                transcript.insert("diff".to_string(), diff);
            }
        }
        transcript.insert("twin".to_string(), overview);
    }

    let feedback = get_json(
        &agent,
        &format!("{base}/feedback/csat?flow={}", options.template),
    )?;
    if let Some(entry) = feedback
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.last())
    {
        transcript.insert("feedback".to_string(), entry.clone());
    }

    transcript.insert("run".to_string(), finished);
    Ok(Value::Object(transcript))
}

fn get_json(agent: &ureq::Agent, url: &str) -> Result<Value, String> {
    let response = agent.get(url).call().map_err(|e| format!("GET {url}: {e}"))?;
    response
        .into_body()
        .read_json::<Value>()
        .map_err(|e| format!("GET {url}: unreadable response: {e}"))
}

fn post_json(agent: &ureq::Agent, url: &str, body: &Value) -> Result<Value, String> {
    let response = agent
        .post(url)
        .send_json(body)
        .map_err(|e| format!("POST {url}: {e}"))?;
    response
        .into_body()
        .read_json::<Value>()
        .map_err(|e| format!("POST {url}: unreadable response: {e}"))
}

// ── Transcript output ─────────────────────────────────────────────────────────

fn print_transcript(transcript: &Value, output: OutputFormat, quiet: bool) {
    if output == OutputFormat::Json {
        let pretty = serde_json::to_string_pretty(transcript)
            .unwrap_or_else(|e| format!("serialization error: {}", e));
        println!("{}", pretty);
        return;
    }

    let run = &transcript["run"];
    println!(
        "run {}: {} ({}, {}) status={}",
        field_str(run, "id"),
        field_str(run, "template_code"),
        field_str(run, "role"),
        field_str(run, "locale"),
        field_str(run, "status"),
    );
    if quiet {
        return;
    }

    if let Some(steps) = run.get("steps").and_then(Value::as_array) {
        println!("steps:");
        for (i, step) in steps.iter().enumerate() {
            let links = step
                .get("metadata")
                .and_then(Value::as_object)
                .map(render_pairs)
                .unwrap_or_default();
            if links.is_empty() {
                println!(
                    "  {}. {}: {}",
                    i + 1,
                    field_str(step, "step_id"),
                    field_str(step, "status"),
                );
            } else {
                println!(
                    "  {}. {}: {} ({})",
                    i + 1,
                    field_str(step, "step_id"),
                    field_str(step, "status"),
                    links,
                );
            }
        }
    }

    if let Some(negotiation) = transcript.get("negotiation") {
        println!(
            "negotiation {}: {}",
            field_str(negotiation, "id"),
            render_history(negotiation),
        );
    }
    if let Some(transfer) = transcript.get("transfer") {
        println!(
            "transfer {}: {}",
            field_str(transfer, "id"),
            render_history(transfer),
        );
    }
    if let Some(run) = transcript.get("compliance_run") {
        let summary = &run["summary"];
        println!(
            "compliance {}: {} ({} violations, {} warnings, {} recommendations)",
            field_str(run, "id"),
            field_str(run, "status"),
            summary["violations"],
            summary["warnings"],
            summary["recommendations"],
        );
    }
    if let Some(twin) = transcript.get("twin") {
        println!(
            "twin {}: {} nodes, {} edges, {} snapshots",
            field_str(twin, "dpp_id"),
            twin.get("nodes").and_then(Value::as_array).map_or(0, |a| a.len()),
            twin.get("edges").and_then(Value::as_array).map_or(0, |a| a.len()),
            twin.get("timeline").and_then(Value::as_array).map_or(0, |a| a.len()),
        );
    }
    if let Some(diff) = transcript.get("diff") {
        let summary = &diff["diff"]["summary"];
        println!(
            "diff #{} -> #{}: +{} -{} ~{} nodes, +{} -{} ~{} edges",
            diff["from_snapshot"]["snapshot_id"],
            diff["to_snapshot"]["snapshot_id"],
            summary["nodes_added"],
            summary["nodes_removed"],
            summary["nodes_changed"],
            summary["edges_added"],
            summary["edges_removed"],
            summary["edges_changed"],
        );
    }
    if let Some(feedback) = transcript.get("feedback") {
        println!("feedback {}: score {}", field_str(feedback, "id"), feedback["score"]);
    }
}

fn field_str<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or("?")
}

/// `state_history` as `INITIAL -> REQUEST -> ...`.
fn render_history(entity: &Value) -> String {
    entity
        .get("state_history")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| field_str(entry, "state").to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        })
        .unwrap_or_else(|| field_str(entity, "state").to_string())
}

/// A metadata object as `k=v, k=v`, keys in map order.
fn render_pairs(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(key, value)| match value.as_str() {
            Some(text) => format!("{key}={text}"),
            None => format!("{key}={value}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
