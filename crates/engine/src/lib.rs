//! Orchestration layer -- drives the pure domain types of `passage-core`
//! against a [`passage_storage::PassageStore`].
//!
//! Every operation here is a free async function generic over the store,
//! so the HTTP service, the CLI, and the tests all call the same code.
//! Mutations follow the read-modify-write protocol of the store trait,
//! retrying version conflicts a bounded number of times.

pub mod compliance;
pub mod dataspace;
pub mod evaluator;
pub mod feedback;
pub mod journey;
pub mod twin;

use uuid::Uuid;

/// Version-conflict retries before a mutation surfaces the conflict as
/// an upstream failure. Conflicts need real interleaving, so the bound
/// is generous.
pub(crate) const OCC_RETRY_LIMIT: u32 = 8;

/// Mint a prefixed entity id. The prefix keeps ids recognizable in logs
/// and step metadata (`neg-...`, `tp-...`, `run-...`).
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

pub use evaluator::{ComplianceEvaluator, HttpEvaluator, RuleEvaluator};
