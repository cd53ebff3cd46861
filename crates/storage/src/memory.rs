//! In-memory `PassageStore` backed by `tokio::sync::RwLock` maps.
//!
//! This is the store the simulation runs on: per-kind maps of versioned
//! records, an append-only snapshot log with its id sequence held under
//! the same write lock, and plain vectors for the append-only logs. Writes
//! to one map are serialized by its lock; reads clone out of the map so no
//! lock is held across caller code.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use passage_core::clock::now_rfc3339;
use passage_core::{
    ComplianceRun, EntityKind, FeedbackEntry, JourneyRun, JourneyTemplate, Negotiation, Transfer,
    TwinGraph, TwinSnapshot,
};

use crate::error::StorageError;
use crate::record::Versioned;
use crate::traits::PassageStore;

// ── Versioned map ─────────────────────────────────────────────────────────────

/// Keyed versioned records for one entity kind.
struct VersionedMap<T> {
    kind: EntityKind,
    records: HashMap<String, Versioned<T>>,
}

impl<T: Clone> VersionedMap<T> {
    fn new(kind: EntityKind) -> Self {
        VersionedMap {
            kind,
            records: HashMap::new(),
        }
    }

    fn insert(&mut self, id: &str, value: T) -> Result<(), StorageError> {
        if self.records.contains_key(id) {
            return Err(StorageError::AlreadyExists {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        self.records.insert(id.to_string(), Versioned::new(value));
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Versioned<T>, StorageError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: self.kind,
                id: id.to_string(),
            })
    }

    fn update(&mut self, id: &str, value: T, expected_version: i64) -> Result<i64, StorageError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound {
                kind: self.kind,
                id: id.to_string(),
            })?;
        if record.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                kind: self.kind,
                id: id.to_string(),
                expected_version,
            });
        }
        record.value = value;
        record.version += 1;
        Ok(record.version)
    }
}

// ── Snapshot log ──────────────────────────────────────────────────────────────

/// Append-only twin snapshot log. `last_id` is the store-wide sequence;
/// holding it inside the same lock as `entries` makes id assignment and
/// the append one atomic step.
#[derive(Default)]
struct SnapshotLog {
    last_id: u64,
    entries: Vec<TwinSnapshot>,
}

impl SnapshotLog {
    fn append(
        &mut self,
        dpp_id: &str,
        label: &str,
        metadata: Map<String, Value>,
        graph: TwinGraph,
    ) -> TwinSnapshot {
        self.last_id += 1;
        let snapshot = TwinSnapshot {
            snapshot_id: self.last_id,
            dpp_id: dpp_id.to_string(),
            label: label.to_string(),
            created_at: now_rfc3339(),
            metadata,
            graph,
        };
        self.entries.push(snapshot.clone());
        snapshot
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// The in-memory store used by the HTTP service, the CLI, and tests.
pub struct MemoryStore {
    negotiations: RwLock<VersionedMap<Negotiation>>,
    transfers: RwLock<VersionedMap<Transfer>>,
    runs: RwLock<VersionedMap<JourneyRun>>,
    compliance_runs: RwLock<VersionedMap<ComplianceRun>>,
    snapshots: RwLock<SnapshotLog>,
    templates: RwLock<BTreeMap<String, JourneyTemplate>>,
    feedback: RwLock<Vec<FeedbackEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            negotiations: RwLock::new(VersionedMap::new(EntityKind::Negotiation)),
            transfers: RwLock::new(VersionedMap::new(EntityKind::Transfer)),
            runs: RwLock::new(VersionedMap::new(EntityKind::JourneyRun)),
            compliance_runs: RwLock::new(VersionedMap::new(EntityKind::ComplianceRun)),
            snapshots: RwLock::new(SnapshotLog::default()),
            templates: RwLock::new(BTreeMap::new()),
            feedback: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassageStore for MemoryStore {
    // ── Negotiations ──────────────────────────────────────────────────────────

    async fn insert_negotiation(&self, negotiation: Negotiation) -> Result<(), StorageError> {
        let id = negotiation.id.clone();
        self.negotiations.write().await.insert(&id, negotiation)
    }

    async fn get_negotiation(&self, id: &str) -> Result<Versioned<Negotiation>, StorageError> {
        self.negotiations.read().await.get(id)
    }

    async fn update_negotiation(
        &self,
        negotiation: Negotiation,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let id = negotiation.id.clone();
        self.negotiations
            .write()
            .await
            .update(&id, negotiation, expected_version)
    }

    // ── Transfers ─────────────────────────────────────────────────────────────

    async fn insert_transfer(&self, transfer: Transfer) -> Result<(), StorageError> {
        let id = transfer.id.clone();
        self.transfers.write().await.insert(&id, transfer)
    }

    async fn get_transfer(&self, id: &str) -> Result<Versioned<Transfer>, StorageError> {
        self.transfers.read().await.get(id)
    }

    async fn update_transfer(
        &self,
        transfer: Transfer,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let id = transfer.id.clone();
        self.transfers
            .write()
            .await
            .update(&id, transfer, expected_version)
    }

    // ── Journey runs ──────────────────────────────────────────────────────────

    async fn insert_run(&self, run: JourneyRun) -> Result<(), StorageError> {
        let id = run.id.clone();
        self.runs.write().await.insert(&id, run)
    }

    async fn get_run(&self, id: &str) -> Result<Versioned<JourneyRun>, StorageError> {
        self.runs.read().await.get(id)
    }

    async fn update_run(
        &self,
        run: JourneyRun,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let id = run.id.clone();
        self.runs.write().await.update(&id, run, expected_version)
    }

    // ── Compliance runs ───────────────────────────────────────────────────────

    async fn insert_compliance_run(&self, run: ComplianceRun) -> Result<(), StorageError> {
        let id = run.id.clone();
        self.compliance_runs.write().await.insert(&id, run)
    }

    async fn get_compliance_run(
        &self,
        id: &str,
    ) -> Result<Versioned<ComplianceRun>, StorageError> {
        self.compliance_runs.read().await.get(id)
    }

    async fn update_compliance_run(
        &self,
        run: ComplianceRun,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let id = run.id.clone();
        self.compliance_runs
            .write()
            .await
            .update(&id, run, expected_version)
    }

    // ── Twin snapshots ────────────────────────────────────────────────────────

    async fn record_snapshot(
        &self,
        dpp_id: &str,
        label: &str,
        metadata: Map<String, Value>,
        graph: TwinGraph,
    ) -> Result<TwinSnapshot, StorageError> {
        Ok(self
            .snapshots
            .write()
            .await
            .append(dpp_id, label, metadata, graph))
    }

    async fn get_snapshot(&self, snapshot_id: u64) -> Result<TwinSnapshot, StorageError> {
        self.snapshots
            .read()
            .await
            .entries
            .iter()
            .find(|s| s.snapshot_id == snapshot_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: EntityKind::Snapshot,
                id: snapshot_id.to_string(),
            })
    }

    async fn list_snapshots(
        &self,
        dpp_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TwinSnapshot>, StorageError> {
        let log = self.snapshots.read().await;
        Ok(log
            .entries
            .iter()
            .filter(|s| s.dpp_id == dpp_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_snapshots(&self, dpp_id: &str) -> Result<usize, StorageError> {
        let log = self.snapshots.read().await;
        Ok(log.entries.iter().filter(|s| s.dpp_id == dpp_id).count())
    }

    async fn latest_snapshot(&self, dpp_id: &str) -> Result<Option<TwinSnapshot>, StorageError> {
        let log = self.snapshots.read().await;
        Ok(log
            .entries
            .iter()
            .rev()
            .find(|s| s.dpp_id == dpp_id)
            .cloned())
    }

    // ── Journey templates ─────────────────────────────────────────────────────

    async fn seed_templates(&self, templates: Vec<JourneyTemplate>) -> Result<(), StorageError> {
        let mut map = self.templates.write().await;
        for template in templates {
            map.insert(template.code.clone(), template);
        }
        Ok(())
    }

    async fn get_template(&self, code: &str) -> Result<JourneyTemplate, StorageError> {
        self.templates
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: EntityKind::JourneyTemplate,
                id: code.to_string(),
            })
    }

    async fn list_templates(&self) -> Result<Vec<JourneyTemplate>, StorageError> {
        Ok(self.templates.read().await.values().cloned().collect())
    }

    // ── Feedback ──────────────────────────────────────────────────────────────

    async fn insert_feedback(&self, entry: FeedbackEntry) -> Result<(), StorageError> {
        self.feedback.write().await.push(entry);
        Ok(())
    }

    async fn list_feedback(&self, flow: Option<&str>) -> Result<Vec<FeedbackEntry>, StorageError> {
        let entries = self.feedback.read().await;
        Ok(entries
            .iter()
            .filter(|e| flow.map_or(true, |f| e.flow == f))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn negotiation(id: &str) -> Negotiation {
        Negotiation::new(id, "urn:dpp:asset-001", "consumer", "provider", None)
    }

    #[tokio::test]
    async fn snapshot_ids_are_store_wide_and_strictly_increasing() {
        let store = MemoryStore::new();
        let graph = TwinGraph::default();
        let a = store
            .record_snapshot("dpp-a", "first", Map::new(), graph.clone())
            .await
            .unwrap();
        let b = store
            .record_snapshot("dpp-b", "other dpp", Map::new(), graph.clone())
            .await
            .unwrap();
        let c = store
            .record_snapshot("dpp-a", "second", Map::new(), graph)
            .await
            .unwrap();
        assert_eq!(a.snapshot_id, 1);
        assert_eq!(b.snapshot_id, 2);
        assert_eq!(c.snapshot_id, 3);
    }

    #[tokio::test]
    async fn record_snapshot_stamps_created_at() {
        let store = MemoryStore::new();
        let snap = store
            .record_snapshot("dpp-a", "timed", Map::new(), TwinGraph::default())
            .await
            .unwrap();
        assert!(snap.created_at.ends_with('Z'), "got {}", snap.created_at);
    }

    #[tokio::test]
    async fn stale_update_conflicts_without_mutating() {
        let store = MemoryStore::new();
        store.insert_negotiation(negotiation("neg-1")).await.unwrap();

        let first = store.get_negotiation("neg-1").await.unwrap();
        let mut winner = first.value.clone();
        winner
            .apply(passage_core::NegotiationAction::Request)
            .unwrap();
        store.update_negotiation(winner, first.version).await.unwrap();

        // The loser still holds version 0.
        let stale = store
            .update_negotiation(first.value.clone(), first.version)
            .await;
        assert!(matches!(
            stale,
            Err(StorageError::ConcurrentConflict {
                expected_version: 0,
                ..
            })
        ));

        let current = store.get_negotiation("neg-1").await.unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(
            current.value.state,
            passage_core::NegotiationState::Request
        );
    }

    #[tokio::test]
    async fn racing_writers_all_land_with_retries() {
        let store = Arc::new(MemoryStore::new());
        store.insert_negotiation(negotiation("neg-race")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for attempt in 0..64 {
                    let read = store.get_negotiation("neg-race").await.unwrap();
                    let mut next = read.value;
                    next.apply(passage_core::NegotiationAction::Offer).unwrap();
                    match store.update_negotiation(next, read.version).await {
                        Ok(_) => return attempt,
                        Err(StorageError::ConcurrentConflict { .. }) => continue,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                panic!("writer never landed");
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let finished = store.get_negotiation("neg-race").await.unwrap();
        assert_eq!(finished.version, 8);
        // create entry plus one history entry per landed write
        assert_eq!(finished.value.state_history.len(), 9);
    }

    #[tokio::test]
    async fn feedback_filters_by_flow() {
        let store = MemoryStore::new();
        store
            .insert_feedback(
                FeedbackEntry::new("f-1", 5, "en", "manufacturer", "flow-a", None).unwrap(),
            )
            .await
            .unwrap();
        store
            .insert_feedback(
                FeedbackEntry::new("f-2", 3, "en", "manufacturer", "flow-b", None).unwrap(),
            )
            .await
            .unwrap();

        let all = store.list_feedback(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let only_a = store.list_feedback(Some("flow-a")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, "f-1");
    }

    #[tokio::test]
    async fn seeding_templates_twice_is_idempotent() {
        let store = MemoryStore::new();
        store.seed_templates(JourneyTemplate::builtin()).await.unwrap();
        store.seed_templates(JourneyTemplate::builtin()).await.unwrap();
        let templates = store.list_templates().await.unwrap();
        assert_eq!(templates.len(), JourneyTemplate::builtin().len());
    }
}
