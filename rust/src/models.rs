//! Core data types for the scheduling engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::GraphError;

/// How an activity's target resources combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// The activity needs every targeted resource at the same time.
    And,
    /// Any one of the targeted resources will do.
    #[default]
    Or,
}

impl FromStr for LogicalOperator {
    type Err = GraphError;

    fn from_str(operator: &str) -> Result<Self, Self::Err> {
        match operator.to_ascii_lowercase().as_str() {
            "and" => Ok(LogicalOperator::And),
            "or" => Ok(LogicalOperator::Or),
            _ => Err(GraphError::UnknownOperator(operator.to_string())),
        }
    }
}

/// A unit of work with a duration, dependencies and scheduling constraints.
///
/// The `earliest_start_time`, `latest_finish_time` and `free_slack` fields are
/// outputs written by critical path propagation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>, R: Ord + Deserialize<'de>"))]
pub struct Activity<T, R> {
    pub id: T,
    pub name: String,
    pub duration: i32,
    /// Authored dependencies.
    pub dependencies: BTreeSet<T>,
    /// Ordering induced by resource scheduling (derived, never authored).
    pub resource_dependencies: BTreeSet<T>,
    pub target_resources: BTreeSet<R>,
    pub target_resource_operator: LogicalOperator,
    /// Resources this activity was scheduled on by the last compilation.
    pub allocated_to_resources: BTreeSet<R>,
    pub can_be_removed: bool,
    pub minimum_free_slack: Option<i32>,
    pub minimum_earliest_start_time: Option<i32>,
    pub maximum_latest_finish_time: Option<i32>,
    pub earliest_start_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
    pub free_slack: Option<i32>,
}

impl<T, R> Activity<T, R> {
    /// Create an activity with no dependencies or constraints.
    pub fn new(id: T, duration: i32) -> Self {
        Self {
            id,
            name: String::new(),
            duration,
            dependencies: BTreeSet::new(),
            resource_dependencies: BTreeSet::new(),
            target_resources: BTreeSet::new(),
            target_resource_operator: LogicalOperator::default(),
            allocated_to_resources: BTreeSet::new(),
            can_be_removed: false,
            minimum_free_slack: None,
            minimum_earliest_start_time: None,
            maximum_latest_finish_time: None,
            earliest_start_time: None,
            latest_finish_time: None,
            free_slack: None,
        }
    }

    /// Create a zero-duration activity that graph cleanup may remove.
    pub fn new_dummy(id: T) -> Self {
        Self {
            can_be_removed: true,
            ..Self::new(id, 0)
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.duration == 0
    }

    /// Dummies that only exist to route dependencies.
    pub fn is_transparent(&self) -> bool {
        self.is_dummy() && self.can_be_removed
    }

    pub fn earliest_finish_time(&self) -> Option<i32> {
        self.earliest_start_time.map(|start| start + self.duration)
    }

    pub fn latest_start_time(&self) -> Option<i32> {
        self.latest_finish_time.map(|finish| finish - self.duration)
    }

    /// Slack against the overall project finish.
    pub fn total_slack(&self) -> Option<i32> {
        match (self.latest_finish_time, self.earliest_finish_time()) {
            (Some(latest), Some(earliest)) => Some(latest - earliest),
            _ => None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.total_slack() == Some(0)
    }

    /// Clear every output written by critical path propagation.
    pub fn reset_timing(&mut self) {
        self.earliest_start_time = None;
        self.latest_finish_time = None;
        self.free_slack = None;
    }
}

/// A point in time between activities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<T> {
    pub id: T,
    pub earliest_finish_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
}

impl<T> Event<T> {
    pub fn new(id: T) -> Self {
        Self {
            id,
            earliest_finish_time: None,
            latest_finish_time: None,
        }
    }

    /// Event pinned at time zero (the arrow graph's start event).
    pub fn new_at_zero(id: T) -> Self {
        Self {
            id,
            earliest_finish_time: Some(0),
            latest_finish_time: Some(0),
        }
    }
}

/// A resource that activities can be scheduled on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource<R> {
    pub id: R,
    pub name: String,
    /// Only activities that explicitly target this resource may use it.
    pub is_explicit_target: bool,
    pub is_inactive: bool,
    /// Lower values are offered work first.
    pub allocation_order: i32,
}

impl<R> Resource<R> {
    pub fn new(id: R) -> Self {
        Self {
            id,
            name: String::new(),
            is_explicit_target: false,
            is_inactive: false,
            allocation_order: 0,
        }
    }
}

/// An activity placed on a resource timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledActivity<T> {
    pub id: T,
    pub name: String,
    pub duration: i32,
    pub start_time: i32,
    pub finish_time: i32,
}

/// The timeline of one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchedule<T, R> {
    pub resource: Resource<R>,
    pub scheduled_activities: Vec<ScheduledActivity<T>>,
    pub finish_time: i32,
}

/// Real activities forming one strongly connected component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>"))]
pub struct CircularDependency<T> {
    pub dependencies: BTreeSet<T>,
}

impl<T: Ord> CircularDependency<T> {
    pub fn new(dependencies: impl IntoIterator<Item = T>) -> Self {
        Self {
            dependencies: dependencies.into_iter().collect(),
        }
    }
}

/// Business-level reasons a compilation produced no schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>"))]
pub struct GraphCompilationErrors<T> {
    pub circular_dependencies: Vec<CircularDependency<T>>,
    pub missing_dependencies: BTreeSet<T>,
    pub invalid_pre_compilation_constraints: Vec<T>,
    pub invalid_post_compilation_constraints: Vec<T>,
    pub invalid_target_resources: Vec<T>,
}

impl<T> Default for GraphCompilationErrors<T> {
    fn default() -> Self {
        Self {
            circular_dependencies: Vec::new(),
            missing_dependencies: BTreeSet::new(),
            invalid_pre_compilation_constraints: Vec::new(),
            invalid_post_compilation_constraints: Vec::new(),
            invalid_target_resources: Vec::new(),
        }
    }
}

impl<T> GraphCompilationErrors<T> {
    pub fn has_circular_dependencies(&self) -> bool {
        !self.circular_dependencies.is_empty()
    }

    pub fn has_missing_dependencies(&self) -> bool {
        !self.missing_dependencies.is_empty()
    }

    pub fn has_invalid_constraints(&self) -> bool {
        !self.invalid_pre_compilation_constraints.is_empty()
            || !self.invalid_post_compilation_constraints.is_empty()
    }

    pub fn has_invalid_target_resources(&self) -> bool {
        !self.invalid_target_resources.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_circular_dependencies()
            && !self.has_missing_dependencies()
            && !self.has_invalid_constraints()
            && !self.has_invalid_target_resources()
    }
}

/// Result of compiling an activity graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>, R: Ord + Deserialize<'de>"))]
pub struct GraphCompilation<T, R> {
    pub dependent_activities: Vec<Activity<T, R>>,
    pub resource_schedules: Vec<ResourceSchedule<T, R>>,
    pub cyclomatic_complexity: i32,
    pub errors: Option<GraphCompilationErrors<T>>,
}

impl<T, R> GraphCompilation<T, R> {
    /// Latest earliest-finish across all activities (0 for an empty graph).
    pub fn finish_time(&self) -> i32 {
        self.dependent_activities
            .iter()
            .filter_map(|activity| activity.earliest_finish_time())
            .max()
            .unwrap_or(0)
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}
