//! CSAT feedback capture at the end of a journey.

use serde::Deserialize;

use passage_core::feedback::DEFAULT_FLOW;
use passage_core::journey::{DEFAULT_LOCALE, DEFAULT_ROLE};
use passage_core::{Error, FeedbackEntry};
use passage_storage::{PassageStore, StorageError};

use crate::new_id;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub score: u8,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Validate and append one feedback entry.
pub async fn record_feedback<S: PassageStore>(
    store: &S,
    request: FeedbackRequest,
) -> Result<FeedbackEntry, Error> {
    let entry = FeedbackEntry::new(
        new_id("fb"),
        request.score,
        request.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        request.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        request.flow.unwrap_or_else(|| DEFAULT_FLOW.to_string()),
        request.comment,
    )?;
    store
        .insert_feedback(entry.clone())
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        feedback_id = %entry.id,
        score = entry.score,
        flow = %entry.flow,
        "feedback recorded"
    );
    Ok(entry)
}

pub async fn list_feedback<S: PassageStore>(
    store: &S,
    flow: Option<&str>,
) -> Result<Vec<FeedbackEntry>, Error> {
    store
        .list_feedback(flow)
        .await
        .map_err(StorageError::into_core)
}
