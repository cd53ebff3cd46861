//! Shared application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU64;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use passage_core::{ComplianceReport, Error};
use passage_engine::{ComplianceEvaluator, HttpEvaluator, RuleEvaluator};
use passage_storage::MemoryStore;

use super::RATE_LIMIT_WINDOW_SECS;

/// One client's request budget: requests spent since the window opened.
struct Window {
    opened: Instant,
    spent: u64,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Window { opened: now, spent: 0 }
    }

    fn seconds_open(&self, now: Instant) -> u64 {
        now.duration_since(self.opened).as_secs()
    }
}

/// Per-IP request budget over a fixed window.
///
/// Every IP gets `budget` requests per [`RATE_LIMIT_WINDOW_SECS`]; the
/// window opens on the first request and reopens once it ages out. A
/// budget of zero at construction disables limiting entirely.
pub(crate) struct RateLimiter {
    budget: Option<NonZeroU64>,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub(crate) fn new(budget: u64) -> Self {
        Self {
            budget: NonZeroU64::new(budget),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Account one request from `ip`. `Err` carries the seconds left
    /// until the client's window reopens.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let Some(budget) = self.budget else {
            return Ok(());
        };
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let window = windows.entry(ip).or_insert_with(|| Window::fresh(now));
        if window.seconds_open(now) >= RATE_LIMIT_WINDOW_SECS {
            *window = Window::fresh(now);
        }
        window.spent += 1;
        if window.spent > budget.get() {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(window.seconds_open(now)))
        } else {
            Ok(())
        }
    }
}

/// The evaluator the service was started with: the in-process rules
/// engine or a remote compliance service.
pub(crate) enum ServeEvaluator {
    Rules(RuleEvaluator),
    Http(HttpEvaluator),
}

#[async_trait]
impl ComplianceEvaluator for ServeEvaluator {
    async fn evaluate(
        &self,
        payload: &Value,
        regulations: &[String],
    ) -> Result<ComplianceReport, Error> {
        match self {
            ServeEvaluator::Rules(inner) => inner.evaluate(payload, regulations).await,
            ServeEvaluator::Http(inner) => inner.evaluate(payload, regulations).await,
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// Entity storage, seeded with the built-in journey templates.
    pub(crate) store: MemoryStore,
    /// Compliance evaluator behind every check and recheck.
    pub(crate) evaluator: ServeEvaluator,
    /// Per-IP rate limiter.
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
