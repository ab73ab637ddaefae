// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Most of the crate reports failures through anyhow::Result.
// The few failures callers may want to match on get a typed
// enum here.

use thiserror::Error;

/// A configuration named an architecture component this crate
/// does not provide.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchitectureError {
    /// The name is recognised but has no implementation.
    #[error("{component} '{name}' is not implemented")]
    NotImplemented {
        component: &'static str,
        name:      String,
    },

    /// The name is not recognised at all.
    #[error("unknown {component} '{name}' (expected one of: {expected})")]
    Unknown {
        component: &'static str,
        name:      String,
        expected:  &'static str,
    },
}

/// Failures of the training driver itself (not of a forward pass).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrainError {
    /// No epoch ever reached the evaluation cadence, so there is
    /// no retained model to save.
    #[error(
        "no model was evaluated during {max_epochs} epochs \
         (evaluation starts after epoch {warmup_epochs}, every {eval_every} epochs)"
    )]
    NoBestModel {
        max_epochs:    usize,
        warmup_epochs: usize,
        eval_every:    usize,
    },
}

/// Structural problems found while loading a graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no nodes")]
    Empty,

    #[error("edge {index} references node {node} but the graph has {node_count} nodes")]
    EdgeOutOfRange {
        index:      usize,
        node:       usize,
        node_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_message_names_component() {
        let err = ArchitectureError::NotImplemented {
            component: "graph embedding",
            name:      "gat".into(),
        };
        assert_eq!(err.to_string(), "graph embedding 'gat' is not implemented");
    }
}
