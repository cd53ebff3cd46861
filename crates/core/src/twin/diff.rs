//! Snapshot comparison -- structural diff between two twin graphs.
//!
//! The diff is computed per element kind (nodes, edges), keyed by id.
//! Added and removed are reported as sorted id lists, changes carry the
//! full before and after values so callers never need to re-fetch the
//! source snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::now_rfc3339;
use crate::twin::{TwinEdge, TwinGraph, TwinNode, TwinSnapshot};

// ──────────────────────────────────────────────
// Diff model
// ──────────────────────────────────────────────

/// An element present in both graphs whose content differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changed<T> {
    pub key: String,
    pub before: T,
    pub after: T,
}

/// Added/removed/changed sets for one element kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta<T> {
    /// Ids present only in the target graph, ascending.
    pub added: Vec<String>,
    /// Ids present only in the base graph, ascending.
    pub removed: Vec<String>,
    /// Elements present in both but not equal, ascending by key.
    pub changed: Vec<Changed<T>>,
}

impl<T> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Delta {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

/// Per-kind counts, denormalized from the deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_changed: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub edges_changed: usize,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.nodes_added == 0
            && self.nodes_removed == 0
            && self.nodes_changed == 0
            && self.edges_added == 0
            && self.edges_removed == 0
            && self.edges_changed == 0
    }
}

/// Full comparison between two snapshots of the same DPP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinDiff {
    pub dpp_id: String,
    pub base_snapshot_id: u64,
    pub target_snapshot_id: u64,
    /// When this diff was computed, not when either snapshot was taken.
    pub generated_at: String,
    pub nodes: Delta<TwinNode>,
    pub edges: Delta<TwinEdge>,
    pub summary: DiffSummary,
}

impl TwinDiff {
    /// Compare two stored snapshots. The caller is responsible for
    /// checking that both belong to the same DPP.
    pub fn between(base: &TwinSnapshot, target: &TwinSnapshot) -> Self {
        let (nodes, edges) = diff_graphs(&base.graph, &target.graph);
        let summary = DiffSummary {
            nodes_added: nodes.added.len(),
            nodes_removed: nodes.removed.len(),
            nodes_changed: nodes.changed.len(),
            edges_added: edges.added.len(),
            edges_removed: edges.removed.len(),
            edges_changed: edges.changed.len(),
        };
        TwinDiff {
            dpp_id: base.dpp_id.clone(),
            base_snapshot_id: base.snapshot_id,
            target_snapshot_id: target.snapshot_id,
            generated_at: now_rfc3339(),
            nodes,
            edges,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }

    /// Human-readable rendering for CLI output.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "twin diff {} -> {} ({})\n",
            self.base_snapshot_id, self.target_snapshot_id, self.dpp_id
        ));
        if self.is_empty() {
            out.push_str("  no differences\n");
            return out;
        }
        out.push_str(&format!(
            "  nodes: +{} -{} ~{}\n",
            self.summary.nodes_added, self.summary.nodes_removed, self.summary.nodes_changed
        ));
        out.push_str(&format!(
            "  edges: +{} -{} ~{}\n",
            self.summary.edges_added, self.summary.edges_removed, self.summary.edges_changed
        ));
        for id in &self.nodes.added {
            out.push_str(&format!("  + node {id}\n"));
        }
        for id in &self.nodes.removed {
            out.push_str(&format!("  - node {id}\n"));
        }
        for change in &self.nodes.changed {
            out.push_str(&format!(
                "  ~ node {}: '{}' -> '{}'\n",
                change.key, change.before.label, change.after.label
            ));
        }
        for id in &self.edges.added {
            out.push_str(&format!("  + edge {id}\n"));
        }
        for id in &self.edges.removed {
            out.push_str(&format!("  - edge {id}\n"));
        }
        for change in &self.edges.changed {
            out.push_str(&format!("  ~ edge {}\n", change.key));
        }
        out
    }
}

// ──────────────────────────────────────────────
// Computation
// ──────────────────────────────────────────────

/// Diff two graphs element-wise. Base is the older side: an id only in
/// `target` is an addition, an id only in `base` is a removal.
pub fn diff_graphs(base: &TwinGraph, target: &TwinGraph) -> (Delta<TwinNode>, Delta<TwinEdge>) {
    let nodes = diff_by_id(
        index_by_id(&base.nodes, |n| &n.id),
        index_by_id(&target.nodes, |n| &n.id),
    );
    let edges = diff_by_id(
        index_by_id(&base.edges, |e| &e.id),
        index_by_id(&target.edges, |e| &e.id),
    );
    (nodes, edges)
}

fn index_by_id<'a, T, F>(items: &'a [T], id: F) -> BTreeMap<&'a str, &'a T>
where
    F: Fn(&'a T) -> &'a String,
{
    items.iter().map(|item| (id(item).as_str(), item)).collect()
}

fn diff_by_id<T: Clone + PartialEq>(
    base: BTreeMap<&str, &T>,
    target: BTreeMap<&str, &T>,
) -> Delta<T> {
    let mut delta = Delta::default();
    // BTreeMap iteration is ordered, so the output lists come out sorted.
    for (id, after) in &target {
        match base.get(id) {
            None => delta.added.push((*id).to_string()),
            Some(before) if before != after => delta.changed.push(Changed {
                key: (*id).to_string(),
                before: (**before).clone(),
                after: (**after).clone(),
            }),
            Some(_) => {}
        }
    }
    for id in base.keys() {
        if !target.contains_key(id) {
            delta.removed.push((*id).to_string());
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn snapshot(id: u64, graph: TwinGraph) -> TwinSnapshot {
        TwinSnapshot {
            snapshot_id: id,
            dpp_id: "urn:dpp:asset-001".to_string(),
            label: format!("snap-{id}"),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            metadata: Map::new(),
            graph,
        }
    }

    fn base_graph() -> TwinGraph {
        TwinGraph::new(
            vec![
                TwinNode::new("dpp-1", "EV Battery Module", "product"),
                TwinNode::new("compliance", "non-compliant", "compliance"),
            ],
            vec![TwinEdge::new(
                "e-validates",
                "compliance",
                "dpp-1",
                Some("validates".to_string()),
            )],
        )
    }

    #[test]
    fn identical_graphs_diff_empty() {
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, base_graph()));
        assert!(diff.is_empty());
        assert_eq!(diff.summary, DiffSummary::default());
        assert!(diff.nodes.added.is_empty());
        assert!(diff.edges.changed.is_empty());
    }

    #[test]
    fn self_diff_is_empty() {
        let snap = snapshot(3, base_graph());
        assert!(TwinDiff::between(&snap, &snap).is_empty());
    }

    #[test]
    fn added_nodes_reported_sorted() {
        let mut target = base_graph();
        target.nodes.push(TwinNode::new("zz-transfer", "t", "transfer"));
        target.nodes.push(TwinNode::new("aa-negotiation", "n", "negotiation"));
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        assert_eq!(diff.nodes.added, vec!["aa-negotiation", "zz-transfer"]);
        assert_eq!(diff.summary.nodes_added, 2);
    }

    #[test]
    fn removed_nodes_reported() {
        let mut target = base_graph();
        target.nodes.retain(|n| n.id != "compliance");
        target.edges.clear();
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        assert_eq!(diff.nodes.removed, vec!["compliance"]);
        assert_eq!(diff.edges.removed, vec!["e-validates"]);
        assert_eq!(diff.summary.edges_removed, 1);
    }

    #[test]
    fn changed_nodes_carry_before_and_after() {
        let mut target = base_graph();
        target.nodes[1].label = "compliant".to_string();
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        assert_eq!(diff.nodes.changed.len(), 1);
        let change = &diff.nodes.changed[0];
        assert_eq!(change.key, "compliance");
        assert_eq!(change.before.label, "non-compliant");
        assert_eq!(change.after.label, "compliant");
    }

    #[test]
    fn edge_label_change_is_a_change() {
        let mut target = base_graph();
        target.edges[0].label = Some("checked".to_string());
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        assert_eq!(diff.summary.edges_changed, 1);
        assert_eq!(diff.edges.changed[0].key, "e-validates");
    }

    #[test]
    fn diff_is_antisymmetric() {
        let mut other = base_graph();
        other.nodes.push(TwinNode::new("negotiation-1", "n", "negotiation"));
        other.nodes.retain(|n| n.id != "compliance");
        other.edges.clear();
        let a = snapshot(1, base_graph());
        let b = snapshot(2, other);
        let forward = TwinDiff::between(&a, &b);
        let backward = TwinDiff::between(&b, &a);
        assert_eq!(forward.nodes.added, backward.nodes.removed);
        assert_eq!(forward.nodes.removed, backward.nodes.added);
        assert_eq!(forward.edges.added, backward.edges.removed);
        assert_eq!(forward.edges.removed, backward.edges.added);
    }

    #[test]
    fn summary_counts_match_lists() {
        let mut target = base_graph();
        target.nodes.push(TwinNode::new("x", "x", "product"));
        target.nodes[0].label = "renamed".to_string();
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        assert_eq!(diff.summary.nodes_added, diff.nodes.added.len());
        assert_eq!(diff.summary.nodes_changed, diff.nodes.changed.len());
        assert_eq!(diff.summary.nodes_removed, diff.nodes.removed.len());
    }

    #[test]
    fn empty_base_means_everything_added() {
        let diff = TwinDiff::between(
            &snapshot(1, TwinGraph::default()),
            &snapshot(2, base_graph()),
        );
        assert_eq!(diff.summary.nodes_added, 2);
        assert_eq!(diff.summary.edges_added, 1);
        assert!(diff.nodes.removed.is_empty());
    }

    #[test]
    fn text_rendering_marks_each_kind() {
        let mut target = base_graph();
        target.nodes.push(TwinNode::new("extra", "x", "product"));
        target.nodes[1].label = "compliant".to_string();
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, target));
        let text = diff.to_text();
        assert!(text.contains("+ node extra"));
        assert!(text.contains("~ node compliance"));
        assert!(text.contains("twin diff 1 -> 2"));
    }

    #[test]
    fn empty_diff_text_says_so() {
        let diff = TwinDiff::between(&snapshot(1, base_graph()), &snapshot(2, base_graph()));
        assert!(diff.to_text().contains("no differences"));
    }
}
