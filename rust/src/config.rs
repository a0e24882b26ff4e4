//! Configuration for graph compilation.

use serde::{Deserialize, Serialize};

/// Knobs controlling what `compile` does beyond validation and timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Strip edges implied by longer paths before propagating times.
    pub transitive_reduction: bool,
    /// Arrow graphs only: redirect and remove redundant dummy activities.
    pub reduce_dummy_activities: bool,
    /// Vertex graphs only: feed resource ordering back into the graph and
    /// recompute the critical path.
    pub inject_resource_dependencies: bool,
    /// Upper bound on simulation steps, multiplied by the activity count.
    pub max_schedule_iterations_per_activity: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            transitive_reduction: true,
            reduce_dummy_activities: true,
            inject_resource_dependencies: true,
            max_schedule_iterations_per_activity: 100,
        }
    }
}

impl CompilerConfig {
    /// Configuration that only validates and propagates times.
    pub fn timing_only() -> Self {
        Self {
            transitive_reduction: false,
            reduce_dummy_activities: false,
            inject_resource_dependencies: false,
            ..Self::default()
        }
    }
}
