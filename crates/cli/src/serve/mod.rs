//! `passage serve` -- HTTP JSON API for the dataspace simulator.
//!
//! Exposes the negotiation/transfer state machines, the digital twin
//! snapshot log, the journey orchestrator, compliance runs, and CSAT
//! feedback as an async HTTP service using `axum` + `tokio`.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via PASSAGE_API_KEY env var
//!
//! Endpoints:
//! - GET  /health                                  - Service status (exempt from auth)
//! - POST /negotiations                            - Create a contract negotiation
//! - GET  /negotiations/{id}                       - Read a negotiation
//! - POST /negotiations/{id}/actions/{action}      - Apply a protocol action
//! - POST /transfers                               - Create a transfer process
//! - GET  /transfers/{id}                          - Read a transfer
//! - POST /transfers/{id}/actions/{action}         - Apply a protocol action
//! - GET  /digital-twins/{dpp_id}                  - Latest twin graph + timeline
//! - POST /digital-twins/{dpp_id}/snapshots        - Record a snapshot
//! - GET  /digital-twins/{dpp_id}/history          - Page through the snapshot log
//! - GET  /digital-twins/{dpp_id}/diff             - Diff two snapshots
//! - GET  /journeys/templates                      - List journey templates
//! - GET  /journeys/templates/{code}               - Read one template
//! - POST /journeys/runs                           - Start a journey run
//! - GET  /journeys/runs/{id}                      - Read a run
//! - POST /journeys/runs/{id}/steps/{step_id}      - Execute the current step
//! - POST /journeys/runs/{id}/abandon              - Abandon a run
//! - POST /compliance/runs                         - Evaluate a payload
//! - GET  /compliance/runs/{id}                    - Read a compliance run
//! - POST /compliance/runs/{id}/apply-fix          - Patch the run's payload
//! - POST /compliance/runs/{id}/recheck            - Re-evaluate the payload
//! - POST /feedback/csat                           - Record CSAT feedback
//! - GET  /feedback/csat                           - List feedback entries
//!
//! All responses use Content-Type: application/json. Errors carry
//! `{"error", "kind", "field"?}` with 404 / 409 / 422 / 502 for the
//! four domain error kinds.

mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use passage_core::{Error, JourneyTemplate};
use passage_engine::{HttpEvaluator, RuleEvaluator};
use passage_rules::RuleBook;
use passage_storage::{MemoryStore, PassageStore};

use self::handlers::{
    handle_abandon_run, handle_apply_fix, handle_compliance_check, handle_create_negotiation,
    handle_create_transfer, handle_execute_step, handle_get_compliance_run,
    handle_get_negotiation, handle_get_run, handle_get_template, handle_get_transfer,
    handle_health, handle_list_feedback, handle_list_templates, handle_negotiation_action,
    handle_not_found, handle_record_feedback, handle_record_snapshot, handle_recheck,
    handle_start_run, handle_transfer_action, handle_twin_diff, handle_twin_history,
    handle_twin_overview,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter, ServeEvaluator};

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default rate limit: 60 requests per minute per IP.
const DEFAULT_RATE_LIMIT: u64 = 60;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Map a domain error onto the wire envelope: message, kind tag, and
/// the offending field or path when one is known.
fn error_response(error: &Error) -> Response {
    if matches!(error, Error::UpstreamUnavailable { .. }) {
        tracing::warn!(%error, "upstream failure surfaced to client");
    }
    let status = match error {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        Error::InvalidArgument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
    };
    let mut body = serde_json::json!({
        "error": error.to_string(),
        "kind": error.kind_tag(),
    });
    if let Some(field) = error.field() {
        body["field"] = serde_json::Value::String(field.to_string());
    }
    (status, Json(body)).into_response()
}

/// Start the HTTP service.
///
/// The store is in-memory and seeded with the built-in journey
/// templates. Compliance evaluation runs in-process over the built-in
/// rule book unless a rules file or a remote evaluator URL is given;
/// an explicit URL (flag or `PASSAGE_EVALUATOR_URL`) wins over a file.
pub(crate) async fn start_server(
    host: String,
    port: u16,
    rules_path: Option<PathBuf>,
    evaluator_url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let evaluator_url = evaluator_url.or_else(|| {
        std::env::var("PASSAGE_EVALUATOR_URL")
            .ok()
            .filter(|url| !url.is_empty())
    });

    let evaluator = match (evaluator_url, &rules_path) {
        (Some(url), _) => {
            tracing::info!(url = %url, "compliance checks delegated to remote evaluator");
            ServeEvaluator::Http(HttpEvaluator::new(url))
        }
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)?;
            let book = RuleBook::from_json_str(&text)?;
            tracing::info!(
                path = %path.display(),
                rules = book.rule_count(),
                regulations = book.regulation_names().len(),
                "rule book loaded"
            );
            ServeEvaluator::Rules(RuleEvaluator::new(book))
        }
        (None, None) => ServeEvaluator::Rules(RuleEvaluator::builtin()?),
    };

    let store = MemoryStore::new();
    store.seed_templates(JourneyTemplate::builtin()).await?;

    // Rate limit: from PASSAGE_RATE_LIMIT env var, or default. 0 disables.
    let rate_limit = std::env::var("PASSAGE_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT);

    // API key: from PASSAGE_API_KEY env var (None = no auth)
    let api_key = std::env::var("PASSAGE_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    if rate_limit == 0 {
        tracing::info!("rate limiting disabled");
    } else {
        tracing::info!(rate_limit, "rate limit in requests per minute per IP");
    }

    let state = Arc::new(AppState {
        store,
        evaluator,
        rate_limiter: RateLimiter::new(rate_limit),
        api_key,
    });

    // CORS: permissive for local dev
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/negotiations", post(handle_create_negotiation))
        .route("/negotiations/{id}", get(handle_get_negotiation))
        .route(
            "/negotiations/{id}/actions/{action}",
            post(handle_negotiation_action),
        )
        .route("/transfers", post(handle_create_transfer))
        .route("/transfers/{id}", get(handle_get_transfer))
        .route(
            "/transfers/{id}/actions/{action}",
            post(handle_transfer_action),
        )
        .route("/digital-twins/{dpp_id}", get(handle_twin_overview))
        .route(
            "/digital-twins/{dpp_id}/snapshots",
            post(handle_record_snapshot),
        )
        .route("/digital-twins/{dpp_id}/history", get(handle_twin_history))
        .route("/digital-twins/{dpp_id}/diff", get(handle_twin_diff))
        .route("/journeys/templates", get(handle_list_templates))
        .route("/journeys/templates/{code}", get(handle_get_template))
        .route("/journeys/runs", post(handle_start_run))
        .route("/journeys/runs/{id}", get(handle_get_run))
        .route(
            "/journeys/runs/{id}/steps/{step_id}",
            post(handle_execute_step),
        )
        .route("/journeys/runs/{id}/abandon", post(handle_abandon_run))
        .route("/compliance/runs", post(handle_compliance_check))
        .route("/compliance/runs/{id}", get(handle_get_compliance_run))
        .route("/compliance/runs/{id}/apply-fix", post(handle_apply_fix))
        .route("/compliance/runs/{id}/recheck", post(handle_recheck))
        .route(
            "/feedback/csat",
            post(handle_record_feedback).get(handle_list_feedback),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "passage listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("received shutdown signal");
}
