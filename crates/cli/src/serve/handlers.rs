//! HTTP route handlers: dataspace, digital twins, journeys, compliance,
//! feedback.
//!
//! Every handler is a thin shim over `passage-engine`: decode the
//! request, delegate, encode the result. Domain errors map onto the
//! shared JSON envelope via [`super::error_response`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use passage_core::{Error, NegotiationAction, TransferAction};
use passage_engine::{compliance, dataspace, feedback, journey, twin};

use super::state::AppState;
use super::{error_response, json_error};

/// Decode a JSON body into a typed request. Shape errors surface as
/// `invalid_argument` rather than a bare transport rejection.
fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, Error> {
    serde_json::from_value(body)
        .map_err(|e| Error::invalid_argument(format!("malformed request body: {e}")))
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "service": "passage",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── Dataspace: negotiations and transfers ─────────────────────────────────────

/// POST /negotiations
pub(crate) async fn handle_create_negotiation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match dataspace::create_negotiation(&state.store, request).await {
        Ok(negotiation) => (StatusCode::OK, Json(negotiation)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// GET /negotiations/{id}
pub(crate) async fn handle_get_negotiation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match dataspace::get_negotiation(&state.store, &id).await {
        Ok(negotiation) => (StatusCode::OK, Json(negotiation)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /negotiations/{id}/actions/{action}
pub(crate) async fn handle_negotiation_action(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    let action = match NegotiationAction::parse(&action) {
        Some(action) => action,
        None => {
            return error_response(&Error::invalid_field(
                "action",
                format!("unknown negotiation action '{action}'"),
            ))
        }
    };
    match dataspace::apply_negotiation_action(&state.store, &id, action).await {
        Ok(negotiation) => (StatusCode::OK, Json(negotiation)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /transfers
pub(crate) async fn handle_create_transfer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match dataspace::create_transfer(&state.store, request).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// GET /transfers/{id}
pub(crate) async fn handle_get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match dataspace::get_transfer(&state.store, &id).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /transfers/{id}/actions/{action}
pub(crate) async fn handle_transfer_action(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    let action = match TransferAction::parse(&action) {
        Some(action) => action,
        None => {
            return error_response(&Error::invalid_field(
                "action",
                format!("unknown transfer action '{action}'"),
            ))
        }
    };
    match dataspace::apply_transfer_action(&state.store, &id, action).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(error) => error_response(&error),
    }
}

// ── Digital twins ─────────────────────────────────────────────────────────────

/// GET /digital-twins/{dpp_id}
pub(crate) async fn handle_twin_overview(
    State(state): State<Arc<AppState>>,
    Path(dpp_id): Path<String>,
) -> Response {
    match twin::latest_graph(&state.store, &dpp_id).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /digital-twins/{dpp_id}/snapshots
pub(crate) async fn handle_record_snapshot(
    State(state): State<Arc<AppState>>,
    Path(dpp_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match twin::record_snapshot(&state.store, &dpp_id, request).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(&error),
    }
}

#[derive(Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

/// GET /digital-twins/{dpp_id}/history?limit&offset
pub(crate) async fn handle_twin_history(
    State(state): State<Arc<AppState>>,
    Path(dpp_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match twin::list_history(&state.store, &dpp_id, query.limit, query.offset).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => error_response(&error),
    }
}

#[derive(Deserialize)]
pub(crate) struct DiffQuery {
    from: Option<u64>,
    to: Option<u64>,
}

/// GET /digital-twins/{dpp_id}/diff?from&to
pub(crate) async fn handle_twin_diff(
    State(state): State<Arc<AppState>>,
    Path(dpp_id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Response {
    let (from, to) = match (query.from, query.to) {
        (Some(from), Some(to)) => (from, to),
        (None, _) => {
            return error_response(&Error::invalid_field(
                "from",
                "query parameter 'from' is required",
            ))
        }
        (_, None) => {
            return error_response(&Error::invalid_field(
                "to",
                "query parameter 'to' is required",
            ))
        }
    };
    match twin::diff_snapshots(&state.store, &dpp_id, from, to).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(&error),
    }
}

// ── Journeys ──────────────────────────────────────────────────────────────────

/// GET /journeys/templates
pub(crate) async fn handle_list_templates(State(state): State<Arc<AppState>>) -> Response {
    match journey::list_templates(&state.store).await {
        Ok(templates) => {
            (StatusCode::OK, Json(serde_json::json!({ "items": templates }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}

/// GET /journeys/templates/{code}
pub(crate) async fn handle_get_template(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Response {
    match journey::get_template(&state.store, &code).await {
        Ok(template) => (StatusCode::OK, Json(template)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /journeys/runs
pub(crate) async fn handle_start_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match journey::start_run(&state.store, request).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// GET /journeys/runs/{id}
pub(crate) async fn handle_get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match journey::get_run(&state.store, &id).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /journeys/runs/{id}/steps/{step_id}
pub(crate) async fn handle_execute_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match journey::execute_step(&state.store, &state.evaluator, &id, &step_id, request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /journeys/runs/{id}/abandon
pub(crate) async fn handle_abandon_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match journey::abandon_run(&state.store, &id).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

// ── Compliance ────────────────────────────────────────────────────────────────

/// POST /compliance/runs
pub(crate) async fn handle_compliance_check(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match compliance::run_check(&state.store, &state.evaluator, request).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// GET /compliance/runs/{id}
pub(crate) async fn handle_get_compliance_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match compliance::get_compliance_run(&state.store, &id).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /compliance/runs/{id}/apply-fix
pub(crate) async fn handle_apply_fix(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match compliance::apply_fix(&state.store, &id, request).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// POST /compliance/runs/{id}/recheck
pub(crate) async fn handle_recheck(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match compliance::recheck(&state.store, &state.evaluator, &id).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(error) => error_response(&error),
    }
}

// ── Feedback ──────────────────────────────────────────────────────────────────

/// POST /feedback/csat
pub(crate) async fn handle_record_feedback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let request = match parse_body(body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    match feedback::record_feedback(&state.store, request).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(error) => error_response(&error),
    }
}

#[derive(Deserialize)]
pub(crate) struct FeedbackQuery {
    flow: Option<String>,
}

/// GET /feedback/csat?flow
pub(crate) async fn handle_list_feedback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedbackQuery>,
) -> Response {
    match feedback::list_feedback(&state.store, query.flow.as_deref()).await {
        Ok(entries) => {
            (StatusCode::OK, Json(serde_json::json!({ "items": entries }))).into_response()
        }
        Err(error) => error_response(&error),
    }
}
