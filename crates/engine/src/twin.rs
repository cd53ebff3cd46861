//! Digital-twin views over the snapshot log: capture, history paging,
//! latest-graph overview, and diffs between two captured states.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use passage_core::{Error, SnapshotSummary, TwinDiff, TwinGraph};
use passage_storage::{PassageStore, StorageError};

/// Page size applied when the caller does not ask for one.
pub const HISTORY_DEFAULT_LIMIT: usize = 50;
/// Hard ceiling on a single history page.
pub const HISTORY_MAX_LIMIT: usize = 200;

/// Label recorded when a snapshot is captured outside a journey step.
const MANUAL_LABEL: &str = "manual";

#[derive(Debug, Clone, Deserialize)]
pub struct RecordSnapshotRequest {
    #[serde(flatten)]
    pub graph: TwinGraph,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwinOverview {
    pub dpp_id: String,
    pub nodes: Vec<passage_core::TwinNode>,
    pub edges: Vec<passage_core::TwinEdge>,
    pub timeline: Vec<SnapshotSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwinHistoryPage {
    pub dpp_id: String,
    pub items: Vec<SnapshotSummary>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwinDiffResult {
    pub dpp_id: String,
    pub from_snapshot: SnapshotSummary,
    pub to_snapshot: SnapshotSummary,
    pub diff: TwinDiff,
}

/// Validate and append a snapshot to the DPP's log.
pub async fn record_snapshot<S: PassageStore>(
    store: &S,
    dpp_id: &str,
    request: RecordSnapshotRequest,
) -> Result<SnapshotSummary, Error> {
    request.graph.validate()?;
    let label = request
        .label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| MANUAL_LABEL.to_string());
    let snapshot = store
        .record_snapshot(
            dpp_id,
            &label,
            request.metadata.unwrap_or_default(),
            request.graph,
        )
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        dpp_id = %dpp_id,
        snapshot_id = snapshot.snapshot_id,
        label = %snapshot.label,
        "snapshot recorded"
    );
    Ok(snapshot.summary())
}

/// The twin as of its newest snapshot, plus the full capture timeline.
///
/// A DPP with no snapshots yet is an empty graph, not an error.
pub async fn latest_graph<S: PassageStore>(
    store: &S,
    dpp_id: &str,
) -> Result<TwinOverview, Error> {
    let latest = store
        .latest_snapshot(dpp_id)
        .await
        .map_err(StorageError::into_core)?;
    let graph = latest.map(|snapshot| snapshot.graph).unwrap_or_default();
    let timeline = store
        .list_snapshots(dpp_id, usize::MAX, 0)
        .await
        .map_err(StorageError::into_core)?
        .iter()
        .map(|snapshot| snapshot.summary())
        .collect();
    Ok(TwinOverview {
        dpp_id: dpp_id.to_string(),
        nodes: graph.nodes,
        edges: graph.edges,
        timeline,
    })
}

/// One page of the snapshot log, oldest first.
pub async fn list_history<S: PassageStore>(
    store: &S,
    dpp_id: &str,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Result<TwinHistoryPage, Error> {
    let limit = limit.unwrap_or(HISTORY_DEFAULT_LIMIT).clamp(1, HISTORY_MAX_LIMIT);
    let offset = offset.unwrap_or(0);
    let total = store
        .count_snapshots(dpp_id)
        .await
        .map_err(StorageError::into_core)?;
    let items = store
        .list_snapshots(dpp_id, limit, offset)
        .await
        .map_err(StorageError::into_core)?
        .iter()
        .map(|snapshot| snapshot.summary())
        .collect();
    Ok(TwinHistoryPage {
        dpp_id: dpp_id.to_string(),
        items,
        total,
        limit,
        offset,
    })
}

/// Diff two snapshots of the same DPP.
pub async fn diff_snapshots<S: PassageStore>(
    store: &S,
    dpp_id: &str,
    from: u64,
    to: u64,
) -> Result<TwinDiffResult, Error> {
    let base = store
        .get_snapshot(from)
        .await
        .map_err(StorageError::into_core)?;
    let target = store
        .get_snapshot(to)
        .await
        .map_err(StorageError::into_core)?;
    for snapshot in [&base, &target] {
        if snapshot.dpp_id != dpp_id {
            return Err(Error::invalid_field(
                "snapshot_id",
                format!(
                    "snapshot {} belongs to '{}', not '{}'",
                    snapshot.snapshot_id, snapshot.dpp_id, dpp_id
                ),
            ));
        }
    }
    let diff = TwinDiff::between(&base, &target);
    Ok(TwinDiffResult {
        dpp_id: dpp_id.to_string(),
        from_snapshot: base.summary(),
        to_snapshot: target.summary(),
        diff,
    })
}
