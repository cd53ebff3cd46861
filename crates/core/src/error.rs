//! Error taxonomy shared across the passage crates.
//!
//! Four kinds cover every failure the core surfaces: missing entities,
//! actions against terminal state, malformed input, and unreachable
//! upstreams. Callers branch on the kind, not on message text.

use std::fmt;

use thiserror::Error;

/// Entity kinds referenced by [`Error::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Negotiation,
    Transfer,
    JourneyTemplate,
    JourneyRun,
    Snapshot,
    ComplianceRun,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Negotiation => "negotiation",
            EntityKind::Transfer => "transfer",
            EntityKind::JourneyTemplate => "journey template",
            EntityKind::JourneyRun => "journey run",
            EntityKind::Snapshot => "snapshot",
            EntityKind::ComplianceRun => "compliance run",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Referenced entity id does not exist. Never retried automatically.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    /// Action applied against a terminal or otherwise invalid entity state.
    /// The caller must not retry the same action.
    #[error("invalid state transition: {message}")]
    InvalidStateTransition { message: String },

    /// Malformed input; `field` names the offending field or path when known.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        field: Option<String>,
        message: String,
    },

    /// Rules evaluator or storage backend unreachable. Callers may retry
    /// with backoff; the retry policy lives outside the core.
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Error::InvalidStateTransition {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field: None,
            message: message.into(),
        }
    }

    /// An `InvalidArgument` pointing at a specific field or path.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Stable machine-readable tag for wire envelopes.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::InvalidStateTransition { .. } => "invalid_state_transition",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
        }
    }

    /// The offending field/path, for envelopes that carry one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::InvalidArgument { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_entity_kind_and_id() {
        let err = Error::not_found(EntityKind::Negotiation, "neg-001");
        assert_eq!(err.to_string(), "negotiation 'neg-001' not found");
        assert_eq!(err.kind_tag(), "not_found");
    }

    #[test]
    fn invalid_field_carries_the_field() {
        let err = Error::invalid_field("score", "score must be between 1 and 5");
        assert_eq!(err.field(), Some("score"));
        assert_eq!(err.kind_tag(), "invalid_argument");
    }

    #[test]
    fn kind_tags_are_distinct() {
        let tags = [
            Error::not_found(EntityKind::Transfer, "t").kind_tag(),
            Error::invalid_transition("x").kind_tag(),
            Error::invalid_argument("y").kind_tag(),
            Error::upstream("z").kind_tag(),
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in tags.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
