//! Compliance evaluation behind a trait -- the built-in rules engine or
//! a remote service speaking the same check contract.

use async_trait::async_trait;
use serde_json::Value;

use passage_core::{ComplianceReport, Error};
use passage_rules::RuleBook;

/// Evaluates a payload against a set of regulations.
///
/// Implementations must be `Send + Sync + 'static` so an evaluator can sit
/// in shared service state next to the store.
#[async_trait]
pub trait ComplianceEvaluator: Send + Sync + 'static {
    async fn evaluate(
        &self,
        payload: &Value,
        regulations: &[String],
    ) -> Result<ComplianceReport, Error>;
}

// ── Local rules evaluator ─────────────────────────────────────────────────────

/// In-process evaluation over a [`RuleBook`].
pub struct RuleEvaluator {
    book: RuleBook,
}

impl RuleEvaluator {
    pub fn new(book: RuleBook) -> Self {
        RuleEvaluator { book }
    }

    /// Evaluator over the embedded default rule book.
    pub fn builtin() -> Result<Self, Error> {
        Ok(RuleEvaluator {
            book: RuleBook::builtin()?,
        })
    }
}

#[async_trait]
impl ComplianceEvaluator for RuleEvaluator {
    async fn evaluate(
        &self,
        payload: &Value,
        regulations: &[String],
    ) -> Result<ComplianceReport, Error> {
        Ok(passage_rules::evaluate(&self.book, payload, regulations))
    }
}

// ── Remote HTTP evaluator ─────────────────────────────────────────────────────

/// Delegates evaluation to a remote compliance service.
///
/// Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to keep
/// the blocking I/O off the async runtime. Posts `{data, regulations}`
/// to `{base_url}/api/v1/compliance/check` and expects a compliance
/// report back. Transport failures and non-2xx responses both surface
/// as `UpstreamUnavailable`.
pub struct HttpEvaluator {
    base_url: String,
    auth_token: Option<String>,
}

impl HttpEvaluator {
    /// Evaluator against `base_url`. A bearer token is read from the
    /// `PASSAGE_EVALUATOR_AUTH_TOKEN` env var when present.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpEvaluator {
            base_url,
            auth_token: std::env::var("PASSAGE_EVALUATOR_AUTH_TOKEN").ok(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl ComplianceEvaluator for HttpEvaluator {
    async fn evaluate(
        &self,
        payload: &Value,
        regulations: &[String],
    ) -> Result<ComplianceReport, Error> {
        let url = format!("{}/api/v1/compliance/check", self.base_url);
        let body = serde_json::json!({
            "data": payload,
            "regulations": regulations,
        });
        let auth_token = self.auth_token.clone();

        let result = tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url);

            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }

            let response = request.send_json(&body).map_err(|e| {
                Error::upstream(format!("compliance evaluator at {url}: {e}"))
            })?;

            response
                .into_body()
                .read_json::<ComplianceReport>()
                .map_err(|e| {
                    Error::upstream(format!(
                        "compliance evaluator returned an unreadable report: {e}"
                    ))
                })
        })
        .await
        .map_err(|e| Error::upstream(format!("evaluator task join error: {e}")))?;

        result
    }
}
