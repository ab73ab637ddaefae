// ============================================================
// Layer 3 — Graph Domain Types
// ============================================================
// The input structure of the MWP solver: an AMR-derived graph
// that arrives pre-built in the dataset files.
//
//   nodes     — one `token` each, plus an optional integer `type`
//               (absent or 0 = ordinary concept node)
//   edges     — directed, labelled (src → dst)
//   sentence  — whole-graph attribute: source sentence fragments
//
// Graph construction from raw text happens upstream; this
// module only validates and exposes what was loaded.

use serde::{Deserialize, Serialize};

use crate::domain::error::GraphError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub token: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<u32>,
}

impl GraphNode {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), node_type: None }
    }

    pub fn with_type(token: impl Into<String>, node_type: u32) -> Self {
        Self { token: token.into(), node_type: Some(node_type) }
    }

    /// True when the node carries no type or the default type 0.
    /// Only such nodes may extend the per-batch vocabulary.
    pub fn is_default_type(&self) -> bool {
        matches!(self.node_type, None | Some(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src:   usize,
    pub dst:   usize,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,

    #[serde(default)]
    pub edges: Vec<GraphEdge>,

    #[serde(default)]
    pub sentence: Vec<String>,
}

impl GraphData {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Reject empty graphs and edges pointing past the node list.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        let node_count = self.node_count();
        for (index, edge) in self.edges.iter().enumerate() {
            for node in [edge.src, edge.dst] {
                if node >= node_count {
                    return Err(GraphError::EdgeOutOfRange { index, node, node_count });
                }
            }
        }
        Ok(())
    }
}
