use async_trait::async_trait;
use serde_json::{Map, Value};

use passage_core::{
    ComplianceRun, FeedbackEntry, JourneyRun, JourneyTemplate, Negotiation, Transfer, TwinGraph,
    TwinSnapshot,
};

use crate::error::StorageError;
use crate::record::Versioned;

/// The storage trait for passage backends.
///
/// A `PassageStore` holds the mutable lifecycle entities (negotiations,
/// transfers, journey runs, compliance runs) as versioned records, plus the
/// append-only twin snapshot log, the seeded journey templates, and the
/// feedback log.
///
/// ## Mutation protocol
///
/// Every mutation of a lifecycle entity is a read-modify-write cycle:
///
/// 1. `get_*(id)` -- read the current `Versioned<T>`
/// 2. apply the pure core mutation to the value
/// 3. `update_*(value, expected_version)` -- conditional write
///
/// The conditional write succeeds only if the stored version still equals
/// `expected_version`; otherwise it returns
/// `Err(StorageError::ConcurrentConflict)` and the caller re-reads and
/// retries. There are no cross-call row locks and no transaction handles:
/// the version check alone serializes writers on an entity, which is all
/// the single-record mutations of this system need.
///
/// ## Snapshot ids
///
/// `record_snapshot` assigns ids from a single store-wide monotonic
/// sequence, so ids are strictly increasing in commit order across all
/// DPPs, not just within one.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` so they can live in
/// axum application state and cross task boundaries.
#[async_trait]
pub trait PassageStore: Send + Sync + 'static {
    // ── Negotiations ──────────────────────────────────────────────────────────

    /// Insert a new negotiation at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_negotiation(&self, negotiation: Negotiation) -> Result<(), StorageError>;

    /// Read a negotiation and its current version.
    ///
    /// Returns `Err(StorageError::NotFound)` if the id is unknown.
    async fn get_negotiation(&self, id: &str) -> Result<Versioned<Negotiation>, StorageError>;

    /// Version-conditional write of a mutated negotiation.
    ///
    /// Returns the new version on success, `Err(StorageError::NotFound)` if
    /// the id is unknown, and `Err(StorageError::ConcurrentConflict)` if the
    /// stored version no longer equals `expected_version`.
    async fn update_negotiation(
        &self,
        negotiation: Negotiation,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Transfers ─────────────────────────────────────────────────────────────

    /// Insert a new transfer process at version 0.
    async fn insert_transfer(&self, transfer: Transfer) -> Result<(), StorageError>;

    /// Read a transfer process and its current version.
    async fn get_transfer(&self, id: &str) -> Result<Versioned<Transfer>, StorageError>;

    /// Version-conditional write of a mutated transfer process.
    async fn update_transfer(
        &self,
        transfer: Transfer,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Journey runs ──────────────────────────────────────────────────────────

    /// Insert a new journey run at version 0.
    async fn insert_run(&self, run: JourneyRun) -> Result<(), StorageError>;

    /// Read a journey run and its current version.
    async fn get_run(&self, id: &str) -> Result<Versioned<JourneyRun>, StorageError>;

    /// Version-conditional write of a mutated journey run.
    async fn update_run(
        &self,
        run: JourneyRun,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Compliance runs ───────────────────────────────────────────────────────

    /// Insert a new compliance run at version 0.
    async fn insert_compliance_run(&self, run: ComplianceRun) -> Result<(), StorageError>;

    /// Read a compliance run and its current version.
    async fn get_compliance_run(&self, id: &str) -> Result<Versioned<ComplianceRun>, StorageError>;

    /// Version-conditional write of a mutated compliance run.
    async fn update_compliance_run(
        &self,
        run: ComplianceRun,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    // ── Twin snapshots (append-only) ──────────────────────────────────────────

    /// Append a snapshot to the twin log, assigning the next id from the
    /// store-wide sequence and stamping `created_at`. Returns the stored
    /// snapshot.
    async fn record_snapshot(
        &self,
        dpp_id: &str,
        label: &str,
        metadata: Map<String, Value>,
        graph: TwinGraph,
    ) -> Result<TwinSnapshot, StorageError>;

    /// Read one snapshot by its store-wide id.
    ///
    /// Returns `Err(StorageError::NotFound)` if the id is unknown.
    async fn get_snapshot(&self, snapshot_id: u64) -> Result<TwinSnapshot, StorageError>;

    /// List a DPP's snapshots in ascending id order.
    ///
    /// `offset` skips that many entries from the front, `limit` caps the
    /// page size. An unknown `dpp_id` yields an empty list, not an error.
    async fn list_snapshots(
        &self,
        dpp_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TwinSnapshot>, StorageError>;

    /// Total number of snapshots recorded for a DPP, ignoring paging.
    async fn count_snapshots(&self, dpp_id: &str) -> Result<usize, StorageError>;

    /// The most recently recorded snapshot for a DPP, if any.
    async fn latest_snapshot(&self, dpp_id: &str) -> Result<Option<TwinSnapshot>, StorageError>;

    // ── Journey templates (seeded reference data) ─────────────────────────────

    /// Upsert templates by code. Seeding the same template twice replaces
    /// the stored copy, so repeated startup seeding is idempotent.
    async fn seed_templates(&self, templates: Vec<JourneyTemplate>) -> Result<(), StorageError>;

    /// Read a template by code.
    ///
    /// Returns `Err(StorageError::NotFound)` if the code is unknown.
    async fn get_template(&self, code: &str) -> Result<JourneyTemplate, StorageError>;

    /// List all templates in ascending code order.
    async fn list_templates(&self) -> Result<Vec<JourneyTemplate>, StorageError>;

    // ── Feedback (append-only) ────────────────────────────────────────────────

    /// Append a feedback entry.
    async fn insert_feedback(&self, entry: FeedbackEntry) -> Result<(), StorageError>;

    /// List feedback entries in insertion order, optionally filtered to one
    /// flow.
    async fn list_feedback(&self, flow: Option<&str>) -> Result<Vec<FeedbackEntry>, StorageError>;
}
