//! Append-only state history shared by the negotiation and transfer
//! machines.

use serde::{Deserialize, Serialize};

/// One recorded state with the time it was entered.
///
/// The state is stored as its wire string (`INITIAL`, `REQUEST`, ...) so a
/// history can be inspected without knowing which machine produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub state: String,
    pub timestamp: String,
}

impl StateHistoryEntry {
    pub fn new(state: impl Into<String>, timestamp: impl Into<String>) -> Self {
        StateHistoryEntry {
            state: state.into(),
            timestamp: timestamp.into(),
        }
    }
}
