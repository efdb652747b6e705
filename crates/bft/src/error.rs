//! Configuration errors.

use quorumsim_types::{NodeId, Value};

/// Reasons a configuration is rejected.
///
/// Quorum failures are protocol outcomes and never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("node count must be at least 1")]
    NoNodes,

    #[error("node count {0} exceeds the node id space")]
    TooManyNodes(usize),

    #[error("byzantine probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error("{id} is not in a set of {node_count} nodes")]
    UnknownNode { id: NodeId, node_count: usize },

    #[error("consecutive failure limit must be at least 1")]
    InvalidFailureLimit,

    #[error("value domain needs two distinct tokens, got {0} twice")]
    DegenerateDomain(Value),
}
