//! Digital twin graph snapshots.
//!
//! A twin is a versioned graph view of one DPP. Every snapshot stores a
//! complete graph (never a delta) plus denormalized counts for listing.
//! Snapshot ids are strictly ordered tokens assigned by the store.

pub mod diff;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::Error;

/// One node in a twin graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwinNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

impl TwinNode {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        TwinNode {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
        }
    }
}

/// One directed edge in a twin graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwinEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TwinEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        label: Option<String>,
    ) -> Self {
        TwinEdge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label,
        }
    }
}

/// A complete twin graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TwinGraph {
    #[serde(default)]
    pub nodes: Vec<TwinNode>,
    #[serde(default)]
    pub edges: Vec<TwinEdge>,
}

impl TwinGraph {
    pub fn new(nodes: Vec<TwinNode>, edges: Vec<TwinEdge>) -> Self {
        TwinGraph { nodes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Structural integrity check: node and edge ids unique within the
    /// graph, every edge endpoint present among the nodes.
    pub fn validate(&self) -> Result<(), Error> {
        let mut node_ids: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(Error::invalid_field(
                    "nodes",
                    format!("duplicate node id '{}'", node.id),
                ));
            }
        }
        let mut edge_ids: HashSet<&str> = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(Error::invalid_field(
                    "edges",
                    format!("duplicate edge id '{}'", edge.id),
                ));
            }
            if !node_ids.contains(edge.source.as_str()) {
                return Err(Error::invalid_field(
                    "edges",
                    format!("edge '{}' source '{}' is not a node", edge.id, edge.source),
                ));
            }
            if !node_ids.contains(edge.target.as_str()) {
                return Err(Error::invalid_field(
                    "edges",
                    format!("edge '{}' target '{}' is not a node", edge.id, edge.target),
                ));
            }
        }
        Ok(())
    }
}

/// A stored snapshot of one DPP's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinSnapshot {
    pub snapshot_id: u64,
    pub dpp_id: String,
    pub label: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub graph: TwinGraph,
}

impl TwinSnapshot {
    /// The listing/timeline form: identity and counts without the graph
    /// body.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            snapshot_id: self.snapshot_id,
            label: self.label.clone(),
            created_at: self.created_at.clone(),
            metadata: self.metadata.clone(),
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
        }
    }
}

/// Denormalized snapshot entry for history listings and timelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub snapshot_id: u64,
    pub label: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub node_count: usize,
    pub edge_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TwinGraph {
        TwinGraph::new(
            vec![
                TwinNode::new("dpp-1", "EV Battery Module", "product"),
                TwinNode::new("compliance", "compliant", "compliance"),
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
    fn valid_graph_passes() {
        assert!(graph().validate().is_ok());
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let mut g = graph();
        g.nodes.push(TwinNode::new("dpp-1", "dup", "product"));
        let err = g.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(err.field(), Some("nodes"));
    }

    #[test]
    fn duplicate_edge_id_rejected() {
        let mut g = graph();
        g.edges
            .push(TwinEdge::new("e-validates", "dpp-1", "compliance", None));
        assert!(g.validate().is_err());
    }

    #[test]
    fn dangling_edge_endpoint_rejected() {
        let mut g = graph();
        g.edges
            .push(TwinEdge::new("e-2", "compliance", "missing", None));
        let err = g.validate().unwrap_err();
        assert_eq!(err.field(), Some("edges"));
    }

    #[test]
    fn empty_graph_is_valid() {
        assert!(TwinGraph::default().validate().is_ok());
    }

    #[test]
    fn summary_denormalizes_counts() {
        let snap = TwinSnapshot {
            snapshot_id: 7,
            dpp_id: "urn:dpp:asset-001".to_string(),
            label: "create-dpp".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            metadata: Map::new(),
            graph: graph(),
        };
        let summary = snap.summary();
        assert_eq!(summary.snapshot_id, 7);
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.edge_count, 1);
    }

    #[test]
    fn node_type_serializes_as_type() {
        let json = serde_json::to_value(TwinNode::new("n", "l", "product")).unwrap();
        assert_eq!(json["type"], "product");
        assert!(json.get("node_type").is_none());
    }
}
