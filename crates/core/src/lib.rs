//! Passage domain core -- dataspace negotiation/transfer state machines,
//! digital-twin snapshots and diffs, journey runs, compliance records.
//!
//! Everything in this crate is pure data and pure mutation: no I/O, no
//! async, no storage. The engine crate drives these types against a store;
//! the cli crate exposes them over HTTP.

pub mod clock;
pub mod compliance;
pub mod error;
pub mod feedback;
pub mod history;
pub mod journey;
pub mod negotiation;
pub mod patch;
pub mod transfer;
pub mod twin;

pub use compliance::{
    ComplianceIssue, ComplianceReport, ComplianceRun, ComplianceStatus, ComplianceSummary,
    FixRecord,
};
pub use error::{EntityKind, Error};
pub use feedback::FeedbackEntry;
pub use history::StateHistoryEntry;
pub use journey::{JourneyRun, JourneyStep, JourneyTemplate, RunStatus, StepActionKind, StepExecution};
pub use negotiation::{Negotiation, NegotiationAction, NegotiationState};
pub use patch::{PatchOp, PatchOperation};
pub use transfer::{Transfer, TransferAction, TransferState};
pub use twin::diff::{diff_graphs, Changed, Delta, DiffSummary, TwinDiff};
pub use twin::{SnapshotSummary, TwinEdge, TwinGraph, TwinNode, TwinSnapshot};
