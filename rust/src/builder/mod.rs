//! Activity graph builders.
//!
//! Both builders keep their graph consistent after every call, so a
//! compiler can drive either one through the same trait. Mutations return
//! `Ok(false)` for expected refusals (duplicate ids, non-removable
//! activities, cleanup attempted on an incomplete or cyclic graph) and
//! `Err` only when an internal invariant is broken.

mod arrow;
mod vertex;

pub use arrow::{ArrowGraph, ArrowGraphBuilder};
pub use vertex::{VertexGraph, VertexGraphBuilder};

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::{Activity, CircularDependency};
use crate::sequence::SequentialId;

/// Operations shared by the vertex and arrow graph builders.
pub trait ActivityGraphBuilder<T: SequentialId, R>: Clone {
    /// Immutable snapshot type produced by `to_graph`.
    type Snapshot;

    /// Add an activity depending on `dependencies`. Dependencies that do not
    /// exist yet are remembered and wired up when they are added.
    fn add_activity(&mut self, activity: Activity<T, R>, dependencies: &BTreeSet<T>)
        -> Result<bool>;

    /// Remove a removable activity and drop it from its dependents.
    fn remove_activity(&mut self, id: T) -> Result<bool>;

    fn add_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>) -> Result<bool>;

    fn remove_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>)
        -> Result<bool>;

    fn activity(&self, id: T) -> Option<&Activity<T, R>>;

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R>>;

    /// Every activity id in the graph, including synthesised dummies.
    fn activity_ids(&self) -> Vec<T>;

    /// Real activities this activity depends on directly, as the graph
    /// currently encodes them.
    fn activity_dependency_ids(&self, id: T) -> Option<BTreeSet<T>>;

    /// Dependencies of this activity that have not been added yet.
    fn waiting_dependency_ids(&self, id: T) -> BTreeSet<T>;

    fn missing_dependencies(&self) -> BTreeSet<T>;

    fn all_dependencies_satisfied(&self) -> bool;

    /// Cycles made of more than one non-removable activity.
    fn find_strong_circular_dependencies(&self) -> Vec<CircularDependency<T>>;

    /// Every cycle, removable members included.
    fn find_circular_components(&self) -> Vec<BTreeSet<T>>;

    /// Transitive ancestor node ids per node, or `None` if cyclic.
    fn ancestor_nodes_lookup(&self) -> Option<FxHashMap<T, BTreeSet<T>>>;

    /// Remove edges implied by longer paths. Returns false without changes
    /// if dependencies are missing or the graph is cyclic.
    fn transitive_reduction(&mut self) -> Result<bool>;

    fn redirect_edges(&mut self) -> Result<bool>;

    fn remove_redundant_edges(&mut self) -> Result<bool>;

    /// Forward and backward propagation. Returns false if the graph is not
    /// ready (missing dependencies or invalid constraints).
    fn calculate_critical_path(&mut self) -> Result<bool>;

    fn find_invalid_pre_compilation_constraints(&self) -> Vec<T>;

    fn find_invalid_post_compilation_constraints(&self) -> Vec<T>;

    fn cyclomatic_complexity(&self) -> i32;

    fn to_graph(&self) -> Self::Snapshot;

    fn edge_count(&self) -> usize;

    fn node_count(&self) -> usize;

    /// Non-transparent activities, ordered by id.
    fn real_activities(&self) -> Vec<&Activity<T, R>> {
        self.activity_ids()
            .into_iter()
            .filter_map(|id| self.activity(id))
            .filter(|activity| !activity.is_transparent())
            .collect()
    }
}
