//! Data transfer state machine.
//!
//! Follows a successful negotiation: provisioning phase, then the data
//! exchange phase. Same permissive shape as the negotiation machine with
//! its own action alphabet. `request`/`requested` here belong to the
//! transfer lifecycle and must never be conflated with the negotiation
//! actions of the same name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::now_rfc3339;
use crate::error::Error;
use crate::history::StateHistoryEntry;

// ──────────────────────────────────────────────
// Actions and states
// ──────────────────────────────────────────────

/// One transfer process action (lowercase on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Provision,
    Provisioned,
    Request,
    Requested,
    Start,
    Complete,
    Terminate,
}

impl TransferAction {
    /// The full action alphabet in canonical order.
    pub const ALL: [TransferAction; 7] = [
        TransferAction::Provision,
        TransferAction::Provisioned,
        TransferAction::Request,
        TransferAction::Requested,
        TransferAction::Start,
        TransferAction::Complete,
        TransferAction::Terminate,
    ];

    /// The sequence the orchestrator drives for a successful transfer.
    pub const CANONICAL_SEQUENCE: [TransferAction; 6] = [
        TransferAction::Provision,
        TransferAction::Provisioned,
        TransferAction::Request,
        TransferAction::Requested,
        TransferAction::Start,
        TransferAction::Complete,
    ];

    /// Parse the lowercase wire token.
    pub fn parse(token: &str) -> Option<TransferAction> {
        match token {
            "provision" => Some(TransferAction::Provision),
            "provisioned" => Some(TransferAction::Provisioned),
            "request" => Some(TransferAction::Request),
            "requested" => Some(TransferAction::Requested),
            "start" => Some(TransferAction::Start),
            "complete" => Some(TransferAction::Complete),
            "terminate" => Some(TransferAction::Terminate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::Provision => "provision",
            TransferAction::Provisioned => "provisioned",
            TransferAction::Request => "request",
            TransferAction::Requested => "requested",
            TransferAction::Start => "start",
            TransferAction::Complete => "complete",
            TransferAction::Terminate => "terminate",
        }
    }

    /// The state this action lands in (the action's upper-cased name).
    pub fn target_state(&self) -> TransferState {
        match self {
            TransferAction::Provision => TransferState::Provision,
            TransferAction::Provisioned => TransferState::Provisioned,
            TransferAction::Request => TransferState::Request,
            TransferAction::Requested => TransferState::Requested,
            TransferAction::Start => TransferState::Start,
            TransferAction::Complete => TransferState::Complete,
            TransferAction::Terminate => TransferState::Terminate,
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Initial,
    Provision,
    Provisioned,
    Request,
    Requested,
    Start,
    Complete,
    Terminate,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Initial => "INITIAL",
            TransferState::Provision => "PROVISION",
            TransferState::Provisioned => "PROVISIONED",
            TransferState::Request => "REQUEST",
            TransferState::Requested => "REQUESTED",
            TransferState::Start => "START",
            TransferState::Complete => "COMPLETE",
            TransferState::Terminate => "TERMINATE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Terminate)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Transfer entity
// ──────────────────────────────────────────────

/// A data transfer process for one asset. Participants are optional: a
/// simulated transfer can be started from the asset alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub state: TransferState,
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub state_history: Vec<StateHistoryEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl Transfer {
    /// Create a transfer in `INITIAL` with a single history entry.
    pub fn new(
        id: impl Into<String>,
        asset_id: impl Into<String>,
        consumer_id: Option<String>,
        provider_id: Option<String>,
    ) -> Self {
        let now = now_rfc3339();
        Transfer {
            id: id.into(),
            state: TransferState::Initial,
            asset_id: asset_id.into(),
            consumer_id,
            provider_id,
            state_history: vec![StateHistoryEntry::new(
                TransferState::Initial.as_str(),
                now.clone(),
            )],
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply one action; same contract as the negotiation machine.
    pub fn apply(&mut self, action: TransferAction) -> Result<(), Error> {
        if self.state.is_terminal() {
            return Err(Error::invalid_transition(format!(
                "transfer '{}' is terminated; '{}' is not accepted",
                self.id, action
            )));
        }
        let next = action.target_state();
        let now = now_rfc3339();
        self.state = next;
        self.state_history
            .push(StateHistoryEntry::new(next.as_str(), now.clone()));
        self.updated_at = now;
        Ok(())
    }
}
