//! CSAT feedback entries recorded at the end of a journey.

use serde::{Deserialize, Serialize};

use crate::clock::now_rfc3339;
use crate::error::Error;

pub const DEFAULT_FLOW: &str = "manufacturer-core-e2e";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: String,
    /// Satisfaction score, 1 (worst) to 5 (best).
    pub score: u8,
    pub locale: String,
    pub role: String,
    pub flow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
}

impl FeedbackEntry {
    pub fn new(
        id: impl Into<String>,
        score: u8,
        locale: impl Into<String>,
        role: impl Into<String>,
        flow: impl Into<String>,
        comment: Option<String>,
    ) -> Result<Self, Error> {
        if !(1..=5).contains(&score) {
            return Err(Error::invalid_field(
                "score",
                format!("score must be between 1 and 5, got {score}"),
            ));
        }
        Ok(FeedbackEntry {
            id: id.into(),
            score,
            locale: locale.into(),
            role: role.into(),
            flow: flow.into(),
            comment,
            created_at: now_rfc3339(),
        })
    }
}
