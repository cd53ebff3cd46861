//! Contract negotiation state machine.
//!
//! Models one consumer/provider contract handshake of the dataspace
//! protocol. Actions map directly onto their upper-cased state names; the
//! machine accepts any action from any non-terminal state (simulation
//! fidelity), with `terminate` as the single terminal marker. The
//! canonical successful sequence driven by the orchestrator is
//! `request -> requested -> offer -> accept`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::now_rfc3339;
use crate::error::Error;
use crate::history::StateHistoryEntry;

// ──────────────────────────────────────────────
// Actions and states
// ──────────────────────────────────────────────

/// One negotiation protocol action (lowercase on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationAction {
    Request,
    Requested,
    Offer,
    Accept,
    Agree,
    Verify,
    Finalize,
    Terminate,
}

impl NegotiationAction {
    /// The full action alphabet in canonical order.
    pub const ALL: [NegotiationAction; 8] = [
        NegotiationAction::Request,
        NegotiationAction::Requested,
        NegotiationAction::Offer,
        NegotiationAction::Accept,
        NegotiationAction::Agree,
        NegotiationAction::Verify,
        NegotiationAction::Finalize,
        NegotiationAction::Terminate,
    ];

    /// The sequence the orchestrator drives for a successful negotiation.
    pub const CANONICAL_SEQUENCE: [NegotiationAction; 4] = [
        NegotiationAction::Request,
        NegotiationAction::Requested,
        NegotiationAction::Offer,
        NegotiationAction::Accept,
    ];

    /// Parse the lowercase wire token.
    pub fn parse(token: &str) -> Option<NegotiationAction> {
        match token {
            "request" => Some(NegotiationAction::Request),
            "requested" => Some(NegotiationAction::Requested),
            "offer" => Some(NegotiationAction::Offer),
            "accept" => Some(NegotiationAction::Accept),
            "agree" => Some(NegotiationAction::Agree),
            "verify" => Some(NegotiationAction::Verify),
            "finalize" => Some(NegotiationAction::Finalize),
            "terminate" => Some(NegotiationAction::Terminate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationAction::Request => "request",
            NegotiationAction::Requested => "requested",
            NegotiationAction::Offer => "offer",
            NegotiationAction::Accept => "accept",
            NegotiationAction::Agree => "agree",
            NegotiationAction::Verify => "verify",
            NegotiationAction::Finalize => "finalize",
            NegotiationAction::Terminate => "terminate",
        }
    }

    /// The state this action lands in. The action *is* the target state,
    /// upper-cased; the mapping is exhaustive by construction.
    pub fn target_state(&self) -> NegotiationState {
        match self {
            NegotiationAction::Request => NegotiationState::Request,
            NegotiationAction::Requested => NegotiationState::Requested,
            NegotiationAction::Offer => NegotiationState::Offer,
            NegotiationAction::Accept => NegotiationState::Accept,
            NegotiationAction::Agree => NegotiationState::Agree,
            NegotiationAction::Verify => NegotiationState::Verify,
            NegotiationAction::Finalize => NegotiationState::Finalize,
            NegotiationAction::Terminate => NegotiationState::Terminate,
        }
    }
}

impl fmt::Display for NegotiationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Negotiation lifecycle states. Every state other than `Initial` is the
/// upper-cased name of the action that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationState {
    Initial,
    Request,
    Requested,
    Offer,
    Accept,
    Agree,
    Verify,
    Finalize,
    Terminate,
}

impl NegotiationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationState::Initial => "INITIAL",
            NegotiationState::Request => "REQUEST",
            NegotiationState::Requested => "REQUESTED",
            NegotiationState::Offer => "OFFER",
            NegotiationState::Accept => "ACCEPT",
            NegotiationState::Agree => "AGREE",
            NegotiationState::Verify => "VERIFY",
            NegotiationState::Finalize => "FINALIZE",
            NegotiationState::Terminate => "TERMINATE",
        }
    }

    /// Only `terminate` closes the machine; every other state accepts
    /// further actions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Terminate)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Negotiation entity
// ──────────────────────────────────────────────

/// A contract negotiation between a consumer and a provider over an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: String,
    pub state: NegotiationState,
    pub asset_id: String,
    pub consumer_id: String,
    pub provider_id: String,
    pub policy: Value,
    pub state_history: Vec<StateHistoryEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl Negotiation {
    /// Create a negotiation in `INITIAL` with a single history entry.
    /// When no policy is supplied the simulation purpose policy is
    /// attached.
    pub fn new(
        id: impl Into<String>,
        asset_id: impl Into<String>,
        consumer_id: impl Into<String>,
        provider_id: impl Into<String>,
        policy: Option<Value>,
    ) -> Self {
        let now = now_rfc3339();
        Negotiation {
            id: id.into(),
            state: NegotiationState::Initial,
            asset_id: asset_id.into(),
            consumer_id: consumer_id.into(),
            provider_id: provider_id.into(),
            policy: policy.unwrap_or_else(default_policy),
            state_history: vec![StateHistoryEntry::new(
                NegotiationState::Initial.as_str(),
                now.clone(),
            )],
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply one protocol action: set the state to the action's target and
    /// append a history entry. Policy and participant fields are never
    /// touched. Fails once the negotiation is terminated.
    pub fn apply(&mut self, action: NegotiationAction) -> Result<(), Error> {
        if self.state.is_terminal() {
            return Err(Error::invalid_transition(format!(
                "negotiation '{}' is terminated; '{}' is not accepted",
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

/// The policy attached when a caller supplies none: the purpose constraint
/// used throughout the simulation.
pub fn default_policy() -> Value {
    serde_json::json!({
        "permission": [
            {
                "constraint": {
                    "leftOperand": "purpose",
                    "rightOperand": "dpp:simulation"
                }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Negotiation {
        Negotiation::new(
            "neg-001",
            "asset-001",
            "BPNL000000000001",
            "BPNL000000000002",
            None,
        )
    }

    #[test]
    fn starts_in_initial_with_one_history_entry() {
        let n = sample();
        assert_eq!(n.state, NegotiationState::Initial);
        assert_eq!(n.state_history.len(), 1);
        assert_eq!(n.state_history[0].state, "INITIAL");
        assert_eq!(n.created_at, n.updated_at);
    }

    #[test]
    fn canonical_sequence_reaches_accept_with_five_entries() {
        let mut n = sample();
        for action in NegotiationAction::CANONICAL_SEQUENCE {
            n.apply(action).unwrap();
        }
        assert_eq!(n.state, NegotiationState::Accept);
        let states: Vec<&str> = n.state_history.iter().map(|e| e.state.as_str()).collect();
        assert_eq!(
            states,
            vec!["INITIAL", "REQUEST", "REQUESTED", "OFFER", "ACCEPT"]
        );
    }

    #[test]
    fn any_action_is_legal_from_any_non_terminal_state() {
        let mut n = sample();
        n.apply(NegotiationAction::Accept).unwrap();
        assert_eq!(n.state, NegotiationState::Accept);
        n.apply(NegotiationAction::Request).unwrap();
        assert_eq!(n.state, NegotiationState::Request);
        assert_eq!(n.state_history.len(), 3);
    }

    #[test]
    fn history_grows_by_one_per_action() {
        let mut n = sample();
        for (i, action) in NegotiationAction::CANONICAL_SEQUENCE.iter().enumerate() {
            n.apply(*action).unwrap();
            assert_eq!(n.state_history.len(), i + 2);
        }
    }

    #[test]
    fn terminate_is_terminal() {
        let mut n = sample();
        n.apply(NegotiationAction::Request).unwrap();
        n.apply(NegotiationAction::Terminate).unwrap();
        assert_eq!(n.state, NegotiationState::Terminate);

        let err = n.apply(NegotiationAction::Offer).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        // State and history are untouched by the rejected action.
        assert_eq!(n.state, NegotiationState::Terminate);
        assert_eq!(n.state_history.len(), 3);
    }

    #[test]
    fn apply_never_mutates_policy_or_participants() {
        let mut n = sample();
        let policy_before = n.policy.clone();
        n.apply(NegotiationAction::Request).unwrap();
        assert_eq!(n.policy, policy_before);
        assert_eq!(n.consumer_id, "BPNL000000000001");
        assert_eq!(n.provider_id, "BPNL000000000002");
        assert_eq!(n.asset_id, "asset-001");
    }

    #[test]
    fn action_tokens_round_trip() {
        for action in NegotiationAction::ALL {
            assert_eq!(NegotiationAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(NegotiationAction::parse("REQUEST"), None);
        assert_eq!(NegotiationAction::parse("provision"), None);
    }

    #[test]
    fn wire_format_uses_upper_case_states() {
        let mut n = sample();
        n.apply(NegotiationAction::Request).unwrap();
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["state"], "REQUEST");
        assert_eq!(json["state_history"][0]["state"], "INITIAL");
        assert_eq!(
            json["policy"]["permission"][0]["constraint"]["leftOperand"],
            "purpose"
        );
    }
}
