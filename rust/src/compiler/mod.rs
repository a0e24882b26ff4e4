//! Thread-safe compilers over the activity graph builders.
//!
//! A compiler owns one builder behind a mutex. Every public operation takes
//! the lock for its whole duration, so concurrent callers always observe a
//! consistent graph. Compilation validates the graph first and returns the
//! problems it finds as data rather than as an `Err`.

mod arrow;
mod vertex;

pub use arrow::ArrowGraphCompiler;
pub use vertex::VertexGraphCompiler;

use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::builder::ActivityGraphBuilder;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::graph::cycles::unreported_cycles;
use crate::models::{Activity, CircularDependency, GraphCompilation, GraphCompilationErrors};
use crate::sequence::SequentialId;

/// Builder plus the resource dependencies the last compilation injected.
#[derive(Debug)]
struct CompilerState<T, B> {
    builder: B,
    /// Injected dependency ids per activity
    resource_dependencies: BTreeMap<T, BTreeSet<T>>,
}

impl<T: SequentialId, B> CompilerState<T, B> {
    /// Take back every dependency a previous compilation injected.
    fn clear_resource_dependencies<R>(&mut self) -> Result<()>
    where
        B: ActivityGraphBuilder<T, R>,
    {
        let injected = std::mem::take(&mut self.resource_dependencies);
        for (id, dependencies) in injected {
            self.builder.remove_activity_dependencies(id, &dependencies)?;
        }
        Ok(())
    }
}

/// Mutex-guarded compiler over any activity graph builder.
#[derive(Debug)]
pub struct GraphCompiler<T, R, B> {
    state: Mutex<CompilerState<T, B>>,
    config: CompilerConfig,
    _resource: PhantomData<fn() -> R>,
}

impl<T, R, B> GraphCompiler<T, R, B>
where
    T: SequentialId,
    B: ActivityGraphBuilder<T, R>,
{
    pub fn with_builder(builder: B, config: CompilerConfig) -> Self {
        Self {
            state: Mutex::new(CompilerState {
                builder,
                resource_dependencies: BTreeMap::new(),
            }),
            config,
            _resource: PhantomData,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CompilerState<T, B>> {
        // Builder calls leave the graph consistent, even when poisoned
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an activity. Returns false if the id is already taken.
    pub fn add_activity(&self, activity: Activity<T, R>, dependencies: &BTreeSet<T>) -> Result<bool> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;
        let id = activity.id;
        let added = state.builder.add_activity(activity, dependencies)?;
        debug!(activity = ?id, added, "compiler add_activity");
        Ok(added)
    }

    /// Remove an activity. Returns false if it is unknown or not removable.
    pub fn remove_activity(&self, id: T) -> Result<bool> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;
        state.builder.remove_activity(id)
    }

    /// Replace an activity's dependencies, touching only what changed.
    pub fn set_activity_dependencies(&self, id: T, dependencies: &BTreeSet<T>) -> Result<bool> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;
        let Some(mut current) = state.builder.activity_dependency_ids(id) else {
            return Ok(false);
        };
        current.extend(state.builder.waiting_dependency_ids(id));
        if let Some(activity) = state.builder.activity(id) {
            // Includes dependencies a transitive reduction took off the graph
            current.extend(activity.dependencies.iter().copied());
        }

        let removed: BTreeSet<T> = current.difference(dependencies).copied().collect();
        let added: BTreeSet<T> = dependencies.difference(&current).copied().collect();
        if !removed.is_empty() && !state.builder.remove_activity_dependencies(id, &removed)? {
            return Ok(false);
        }
        if !added.is_empty() && !state.builder.add_activity_dependencies(id, &added)? {
            return Ok(false);
        }
        debug!(activity = ?id, added = added.len(), removed = removed.len(), "dependencies updated");
        Ok(true)
    }

    /// Remove dependencies implied by longer paths.
    pub fn transitive_reduction(&self) -> Result<bool> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;
        state.builder.transitive_reduction()
    }

    pub fn activity(&self, id: T) -> Option<Activity<T, R>>
    where
        R: Clone,
    {
        self.lock().builder.activity(id).cloned()
    }

    pub fn activity_dependency_ids(&self, id: T) -> Option<BTreeSet<T>> {
        self.lock().builder.activity_dependency_ids(id)
    }

    pub fn missing_dependencies(&self) -> BTreeSet<T> {
        self.lock().builder.missing_dependencies()
    }

    pub fn find_strong_circular_dependencies(&self) -> Vec<CircularDependency<T>> {
        self.lock().builder.find_strong_circular_dependencies()
    }

    /// Activities breaking their constraints, as (pre, post) compilation
    /// lists. The post list reflects the last computed times.
    pub fn find_invalid_constraints(&self) -> (Vec<T>, Vec<T>) {
        let state = self.lock();
        (
            state.builder.find_invalid_pre_compilation_constraints(),
            state.builder.find_invalid_post_compilation_constraints(),
        )
    }

    /// Every node's ancestors, or `None` while the graph has a cycle.
    pub fn ancestor_nodes_lookup(&self) -> Option<FxHashMap<T, BTreeSet<T>>> {
        self.lock().builder.ancestor_nodes_lookup()
    }

    pub fn cyclomatic_complexity(&self) -> i32 {
        self.lock().builder.cyclomatic_complexity()
    }

    /// Snapshot of the underlying graph.
    pub fn to_graph(&self) -> B::Snapshot {
        self.lock().builder.to_graph()
    }

    /// Copy of the current builder.
    pub fn builder(&self) -> B {
        self.lock().builder.clone()
    }
}

/// Problems that make compilation impossible before any time is computed.
fn validate<T, R, B>(builder: &B) -> Option<GraphCompilationErrors<T>>
where
    T: SequentialId,
    B: ActivityGraphBuilder<T, R>,
{
    let mut circular_dependencies = builder.find_strong_circular_dependencies();
    // Cycles through removable activities still block propagation
    let components = builder.find_circular_components();
    circular_dependencies.extend(unreported_cycles(&components, &circular_dependencies));
    let errors = GraphCompilationErrors {
        circular_dependencies,
        missing_dependencies: builder.missing_dependencies(),
        invalid_pre_compilation_constraints: builder.find_invalid_pre_compilation_constraints(),
        ..GraphCompilationErrors::default()
    };
    (!errors.is_empty()).then_some(errors)
}

/// Compilation result carrying errors and no schedule.
fn failed<T, R>(errors: GraphCompilationErrors<T>, cyclomatic_complexity: i32) -> GraphCompilation<T, R>
where
    T: std::fmt::Debug,
{
    warn!(
        circular = errors.circular_dependencies.len(),
        missing = ?errors.missing_dependencies,
        invalid_pre = ?errors.invalid_pre_compilation_constraints,
        invalid_post = ?errors.invalid_post_compilation_constraints,
        invalid_targets = ?errors.invalid_target_resources,
        "graph compilation failed"
    );
    GraphCompilation {
        dependent_activities: Vec::new(),
        resource_schedules: Vec::new(),
        cyclomatic_complexity,
        errors: Some(errors),
    }
}
