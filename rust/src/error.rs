//! Error types for graph construction, compilation and scheduling.
//!
//! Expected business outcomes (duplicate ids, missing dependencies, cycles)
//! are reported as `Ok(false)` or inside a compilation's error block. The
//! variants here are reserved for malformed input (a snapshot or operator
//! name) and for broken invariants such as a failed internal lookup or a
//! stalled propagation.

use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that abort a graph operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Invalid graph snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),
    #[error("Critical path propagation made no progress ({0} items unresolved); the graph contains a cycle")]
    CyclicGraph(usize),
    #[error("Backward flow requested before a successful forward flow")]
    CriticalPathNotCalculated,
    #[error("Resource scheduling stalled with {0} activities unscheduled")]
    SchedulingStalled(usize),
    #[error("Graph invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Unknown logical operator '{0}' (expected 'and' or 'or')")]
    UnknownOperator(String),
}

impl GraphError {
    pub(crate) fn node_not_found<T: std::fmt::Debug>(id: T) -> Self {
        GraphError::NodeNotFound(format!("{:?}", id))
    }

    pub(crate) fn edge_not_found<T: std::fmt::Debug>(id: T) -> Self {
        GraphError::EdgeNotFound(format!("{:?}", id))
    }
}
