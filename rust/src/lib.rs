//! Critical path (CPM/PERT) engine over activity graphs.
//!
//! Activities can be held either on the nodes of a graph (`VertexGraphBuilder`)
//! or on its arrows (`ArrowGraphBuilder`, which synthesises and later prunes
//! dummy activities). Both builders feed the same critical-path rules, and the
//! compilers wrap them with validation, cleanup and, for vertex graphs,
//! resource-constrained scheduling.

// Allow clippy warning triggered by PyO3 macro expansion
#![cfg_attr(feature = "python", allow(clippy::useless_conversion))]

pub mod builder;
pub mod compiler;
mod config;
pub mod critical_path;
mod error;
pub mod graph;
mod models;
pub mod scheduler;
pub mod sequence;

#[cfg(feature = "python")]
mod python;

pub use builder::{ActivityGraphBuilder, ArrowGraph, ArrowGraphBuilder, VertexGraph, VertexGraphBuilder};
pub use compiler::{ArrowGraphCompiler, GraphCompiler, VertexGraphCompiler};
pub use config::CompilerConfig;
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, Node, NodeType};
pub use models::{
    Activity, CircularDependency, Event, GraphCompilation, GraphCompilationErrors,
    LogicalOperator, Resource, ResourceSchedule, ScheduledActivity,
};
pub use sequence::{generator_after, sequential_generator, IdGenerator, SequentialId};
