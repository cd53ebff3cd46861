//! Conformance test suite for `PassageStore` implementations.
//!
//! A backend-agnostic suite any `PassageStore` implementation can run to
//! verify it honors the trait contracts. The suite covers:
//!
//! - **Round-trips**: insert/get for every entity family, template seeding,
//!   feedback logging
//! - **Error contracts**: not-found and already-exists variants with the
//!   right kind and id fields
//! - **Version validation / OCC**: versions start at 0, increment by one,
//!   stale writes conflict without mutating
//! - **Snapshot log**: store-wide monotonic ids, per-DPP listing order,
//!   pagination bounds, latest lookup
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds
//! a fresh, empty store for each test:
//!
//! ```ignore
//! use passage_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod error;
mod roundtrip;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use passage_core::{
    ComplianceReport, ComplianceRun, JourneyRun, JourneyTemplate, Negotiation, Transfer, TwinGraph,
    TwinNode,
};

use crate::PassageStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "roundtrip", "version", "snapshot").
    pub category: String,
    /// Test name (e.g. "negotiation_round_trips").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` is called once per test to create a fresh, empty store,
/// keeping tests isolated from each other.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: PassageStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(roundtrip::run_roundtrip_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: entity constructors with sensible defaults ───────────────────────

fn make_negotiation(id: &str) -> Negotiation {
    Negotiation::new(
        id,
        "urn:dpp:asset-001",
        "BPNL000000000001",
        "BPNL000000000002",
        None,
    )
}

fn make_transfer(id: &str) -> Transfer {
    Transfer::new(id, "urn:dpp:asset-001", None, None)
}

fn make_run(id: &str) -> JourneyRun {
    let template = JourneyTemplate::manufacturer_core_e2e();
    JourneyRun::start(
        id,
        &template,
        "manufacturer",
        "en",
        serde_json::Map::new(),
    )
}

fn make_compliance_run(id: &str) -> ComplianceRun {
    ComplianceRun::new(
        id,
        Some("urn:dpp:asset-001".to_string()),
        serde_json::json!({"id": "urn:dpp:asset-001"}),
        vec!["ESPR".to_string()],
        ComplianceReport::compliant(),
    )
}

fn make_graph(node_ids: &[&str]) -> TwinGraph {
    TwinGraph {
        nodes: node_ids
            .iter()
            .map(|id| TwinNode {
                id: (*id).to_string(),
                label: format!("node {id}"),
                node_type: "asset".to_string(),
            })
            .collect(),
        edges: Vec::new(),
    }
}
