//! Compiler over activity-on-node graphs, with resource scheduling.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::builder::{ActivityGraphBuilder, VertexGraph, VertexGraphBuilder};
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::models::{
    Activity, GraphCompilation, GraphCompilationErrors, Resource, ResourceSchedule,
};
use crate::scheduler::{invalid_target_resources, priority_list, ResourceScheduler};
use crate::sequence::{IdGenerator, SequentialId};

use super::{failed, validate, GraphCompiler};

pub type VertexGraphCompiler<T, R> = GraphCompiler<T, R, VertexGraphBuilder<T, R>>;

impl<T: SequentialId, R: Clone> GraphCompiler<T, R, VertexGraphBuilder<T, R>> {
    pub fn new(edge_id_generator: IdGenerator<T>) -> Self {
        Self::with_config(edge_id_generator, CompilerConfig::default())
    }

    pub fn with_config(edge_id_generator: IdGenerator<T>, config: CompilerConfig) -> Self {
        Self::with_builder(VertexGraphBuilder::new(edge_id_generator), config)
    }

    pub fn from_graph(
        graph: VertexGraph<T, R>,
        edge_id_generator: IdGenerator<T>,
        config: CompilerConfig,
    ) -> Result<Self> {
        Ok(Self::with_builder(
            VertexGraphBuilder::from_graph(graph, edge_id_generator)?,
            config,
        ))
    }
}

impl<T, R> GraphCompiler<T, R, VertexGraphBuilder<T, R>>
where
    T: SequentialId,
    R: SequentialId + Default,
{
    /// Compile against an unlimited resource pool.
    pub fn compile(&self) -> Result<GraphCompilation<T, R>> {
        self.compile_with_resources(&[])
    }

    /// Validate, propagate times, then schedule onto `resources`.
    ///
    /// With no active resources every activity gets a lane of its own when
    /// it needs one. Unless disabled in the config, the order each resource
    /// works in is written back into the graph as extra dependencies and the
    /// critical path is recomputed; those dependencies are reported as
    /// `resource_dependencies` and withdrawn before the next change.
    pub fn compile_with_resources(&self, resources: &[Resource<R>]) -> Result<GraphCompilation<T, R>> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;

        if let Some(errors) = validate::<T, R, _>(&state.builder) {
            return Ok(failed(errors, state.builder.cyclomatic_complexity()));
        }
        if self.config.transitive_reduction {
            state.builder.transitive_reduction()?;
        }
        if !state.builder.calculate_critical_path()? {
            return Ok(failed(
                post_compilation_errors(&state.builder),
                state.builder.cyclomatic_complexity(),
            ));
        }

        let activities = collect_activities(&state.builder, &BTreeMap::new());
        let invalid_targets = invalid_target_resources(&activities, resources);
        if !invalid_targets.is_empty() {
            let errors = GraphCompilationErrors {
                invalid_target_resources: invalid_targets,
                ..GraphCompilationErrors::default()
            };
            return Ok(failed(errors, state.builder.cyclomatic_complexity()));
        }

        let priority = priority_list(&state.builder)?;
        let resource_schedules = ResourceScheduler::new(
            &activities,
            &priority,
            resources,
            self.config.max_schedule_iterations_per_activity,
        )
        .schedule()?;

        if self.config.inject_resource_dependencies {
            let injected = resource_dependencies(&resource_schedules, &state.builder);
            for (&id, dependencies) in &injected {
                state.builder.add_activity_dependencies(id, dependencies)?;
                // Injected orderings are not authored
                if let Some(activity) = state.builder.activity_mut(id) {
                    activity
                        .dependencies
                        .retain(|dependency| !dependencies.contains(dependency));
                }
            }
            let any_injected = !injected.is_empty();
            debug!(activities = injected.len(), "injected resource dependencies");
            state.resource_dependencies = injected;

            if any_injected && !state.builder.calculate_critical_path()? {
                return Ok(failed(
                    post_compilation_errors(&state.builder),
                    state.builder.cyclomatic_complexity(),
                ));
            }
        }

        let mut dependent_activities =
            collect_activities(&state.builder, &state.resource_dependencies);
        let allocations = allocations(&resource_schedules);
        for activity in &mut dependent_activities {
            if let Some(allocated) = allocations.get(&activity.id) {
                activity.allocated_to_resources = allocated.clone();
            }
        }

        let compilation = GraphCompilation {
            dependent_activities,
            resource_schedules,
            cyclomatic_complexity: state.builder.cyclomatic_complexity(),
            errors: None,
        };
        info!(
            activities = compilation.dependent_activities.len(),
            resources = compilation.resource_schedules.len(),
            finish_time = compilation.finish_time(),
            "compiled vertex graph"
        );
        Ok(compilation)
    }
}

fn post_compilation_errors<T: SequentialId, R: Clone>(
    builder: &VertexGraphBuilder<T, R>,
) -> GraphCompilationErrors<T> {
    GraphCompilationErrors {
        missing_dependencies: builder.missing_dependencies(),
        invalid_pre_compilation_constraints: builder.find_invalid_pre_compilation_constraints(),
        invalid_post_compilation_constraints: builder.find_invalid_post_compilation_constraints(),
        ..GraphCompilationErrors::default()
    }
}

/// Activities ordered by id, with graph dependencies split into authored and
/// injected ones.
fn collect_activities<T: SequentialId, R: Clone>(
    builder: &VertexGraphBuilder<T, R>,
    injected: &BTreeMap<T, BTreeSet<T>>,
) -> Vec<Activity<T, R>> {
    builder
        .activity_ids()
        .into_iter()
        .filter_map(|id| {
            let mut activity = builder.activity(id)?.clone();
            let dependencies = builder.activity_dependency_ids(id).unwrap_or_default();
            let resource_dependencies = injected.get(&id).cloned().unwrap_or_default();
            activity.dependencies = dependencies
                .difference(&resource_dependencies)
                .copied()
                .collect();
            activity.resource_dependencies = resource_dependencies;
            Some(activity)
        })
        .collect()
}

/// Consecutive pairs on each resource that the graph does not order yet.
fn resource_dependencies<T: SequentialId, R: Clone>(
    schedules: &[ResourceSchedule<T, R>],
    builder: &VertexGraphBuilder<T, R>,
) -> BTreeMap<T, BTreeSet<T>> {
    let mut injected: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();
    for schedule in schedules {
        let mut booked: Vec<_> = schedule.scheduled_activities.iter().collect();
        booked.sort_by_key(|scheduled| (scheduled.start_time, scheduled.id));
        for pair in booked.windows(2) {
            let (previous, next) = (pair[0].id, pair[1].id);
            let already = builder
                .activity_dependency_ids(next)
                .is_some_and(|dependencies| dependencies.contains(&previous))
                || builder
                    .activity(next)
                    .is_some_and(|activity| activity.dependencies.contains(&previous));
            if !already {
                injected.entry(next).or_default().insert(previous);
            }
        }
    }
    injected
}

fn allocations<T: SequentialId, R: Ord + Clone>(
    schedules: &[ResourceSchedule<T, R>],
) -> BTreeMap<T, BTreeSet<R>> {
    let mut allocated: BTreeMap<T, BTreeSet<R>> = BTreeMap::new();
    for schedule in schedules {
        for scheduled in &schedule.scheduled_activities {
            allocated
                .entry(scheduled.id)
                .or_default()
                .insert(schedule.resource.id.clone());
        }
    }
    allocated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogicalOperator;
    use crate::sequence::sequential_generator;
    use std::sync::Arc;
    use std::thread;

    fn deps(ids: &[i32]) -> BTreeSet<i32> {
        ids.iter().copied().collect()
    }

    fn compiler() -> VertexGraphCompiler<i32, i32> {
        VertexGraphCompiler::new(sequential_generator(10_000))
    }

    fn add(compiler: &VertexGraphCompiler<i32, i32>, id: i32, duration: i32, dependencies: &[i32]) {
        assert!(compiler
            .add_activity(Activity::new(id, duration), &deps(dependencies))
            .unwrap());
    }

    fn activity(compilation: &GraphCompilation<i32, i32>, id: i32) -> &Activity<i32, i32> {
        compilation
            .dependent_activities
            .iter()
            .find(|activity| activity.id == id)
            .unwrap()
    }

    #[test]
    fn test_compile_reports_missing_dependencies() {
        let c = compiler();
        add(&c, 1, 3, &[2]);

        let compilation = c.compile().unwrap();
        assert!(compilation.has_errors());
        assert!(compilation.dependent_activities.is_empty());
        let errors = compilation.errors.unwrap();
        assert_eq!(errors.missing_dependencies, deps(&[2]));
        assert!(errors.circular_dependencies.is_empty());
    }

    #[test]
    fn test_compile_reports_circular_dependencies() {
        let c = compiler();
        add(&c, 1, 1, &[3]);
        add(&c, 2, 1, &[1]);
        add(&c, 3, 1, &[2]);
        add(&c, 4, 1, &[]);

        let errors = c.compile().unwrap().errors.unwrap();
        assert_eq!(errors.circular_dependencies.len(), 1);
        assert_eq!(errors.circular_dependencies[0].dependencies, deps(&[1, 2, 3]));
    }

    #[test]
    fn test_compile_reports_invalid_constraints() {
        let c = compiler();
        let mut impossible = Activity::new(1, 5);
        impossible.minimum_earliest_start_time = Some(2);
        impossible.maximum_latest_finish_time = Some(4);
        c.add_activity(impossible, &deps(&[])).unwrap();

        let errors = c.compile().unwrap().errors.unwrap();
        assert_eq!(errors.invalid_pre_compilation_constraints, vec![1]);

        let c = compiler();
        add(&c, 1, 5, &[]);
        let mut late = Activity::new(2, 2);
        late.maximum_latest_finish_time = Some(4);
        c.add_activity(late, &deps(&[1])).unwrap();

        let errors = c.compile().unwrap().errors.unwrap();
        assert!(errors.invalid_pre_compilation_constraints.is_empty());
        assert_eq!(errors.invalid_post_compilation_constraints, vec![2]);
    }

    #[test]
    fn test_compile_unlimited_resources() {
        let c = compiler();
        add(&c, 1, 4, &[]);
        add(&c, 2, 1, &[]);
        add(&c, 3, 2, &[1]);

        let compilation = c.compile().unwrap();
        assert!(!compilation.has_errors());
        assert_eq!(compilation.finish_time(), 6);
        assert_eq!(compilation.resource_schedules.len(), 2);

        let ids: Vec<i32> = compilation.dependent_activities.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(activity(&compilation, 1).allocated_to_resources, deps(&[1]));
        assert_eq!(activity(&compilation, 2).allocated_to_resources, deps(&[2]));
        assert_eq!(activity(&compilation, 3).allocated_to_resources, deps(&[1]));
        assert_eq!(activity(&compilation, 3).dependencies, deps(&[1]));
        assert!(activity(&compilation, 3).resource_dependencies.is_empty());
        assert!(activity(&compilation, 3).is_critical());
        assert_eq!(activity(&compilation, 2).total_slack(), Some(5));
    }

    #[test]
    fn test_compile_injects_resource_dependencies() {
        let c = compiler();
        add(&c, 1, 2, &[]);
        add(&c, 2, 3, &[]);
        let resources = vec![Resource::new(1)];

        let compilation = c.compile_with_resources(&resources).unwrap();
        assert!(!compilation.has_errors());
        assert_eq!(compilation.finish_time(), 5);

        let first = activity(&compilation, 1);
        assert!(first.dependencies.is_empty());
        assert_eq!(first.resource_dependencies, deps(&[2]));
        assert_eq!(first.earliest_start_time, Some(3));
        assert_eq!(first.allocated_to_resources, deps(&[1]));

        let schedule = &compilation.resource_schedules[0];
        let order: Vec<i32> = schedule.scheduled_activities.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(schedule.finish_time, 5);

        // Injected dependencies are withdrawn by the next change
        assert_eq!(c.activity_dependency_ids(1), Some(deps(&[2])));
        add(&c, 3, 1, &[]);
        assert_eq!(c.activity_dependency_ids(1), Some(deps(&[])));
    }

    #[test]
    fn test_compile_without_injection() {
        let c = VertexGraphCompiler::with_config(
            sequential_generator(10_000),
            CompilerConfig {
                inject_resource_dependencies: false,
                ..CompilerConfig::default()
            },
        );
        add(&c, 1, 2, &[]);
        add(&c, 2, 3, &[]);

        let compilation = c.compile_with_resources(&[Resource::new(1)]).unwrap();
        assert_eq!(compilation.finish_time(), 3);
        assert!(activity(&compilation, 1).resource_dependencies.is_empty());
        assert_eq!(compilation.resource_schedules[0].finish_time, 5);
    }

    #[test]
    fn test_compile_reports_invalid_target_resources() {
        let c = compiler();
        add(&c, 1, 2, &[]);
        let mut targeted = Activity::new(2, 2);
        targeted.target_resources = deps(&[5, 7]);
        targeted.target_resource_operator = LogicalOperator::And;
        c.add_activity(targeted, &deps(&[])).unwrap();

        let mut explicit = Resource::new(5);
        explicit.is_explicit_target = true;
        let errors = c.compile_with_resources(&[explicit]).unwrap().errors.unwrap();
        assert_eq!(errors.invalid_target_resources, vec![1, 2]);
    }

    #[test]
    fn test_compile_applies_transitive_reduction() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[1]);
        add(&c, 3, 1, &[1, 2]);

        let compilation = c.compile().unwrap();
        assert_eq!(activity(&compilation, 3).dependencies, deps(&[2]));
        assert_eq!(activity(&compilation, 3).earliest_start_time, Some(2));
    }

    #[test]
    fn test_set_activity_dependencies() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[]);
        add(&c, 3, 1, &[1]);

        assert!(c.set_activity_dependencies(3, &deps(&[2, 9])).unwrap());
        assert_eq!(c.activity_dependency_ids(3), Some(deps(&[2])));
        assert_eq!(c.missing_dependencies(), deps(&[9]));

        assert!(c.set_activity_dependencies(3, &deps(&[2])).unwrap());
        assert!(c.missing_dependencies().is_empty());
        assert!(!c.set_activity_dependencies(8, &deps(&[1])).unwrap());
    }

    #[test]
    fn test_snapshot_content_tracks_dependencies() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[]);
        add(&c, 3, 1, &[1]);
        assert!(c.set_activity_dependencies(3, &deps(&[2, 9])).unwrap());

        let snapshot = c.to_graph();
        let third = snapshot.nodes.iter().find(|node| node.id == 3).unwrap();
        assert_eq!(third.content.dependencies, deps(&[2, 9]));
        assert_eq!(c.activity(3).unwrap().dependencies, deps(&[2, 9]));

        let reloaded =
            VertexGraphCompiler::from_graph(snapshot, sequential_generator(20_000), CompilerConfig::default())
                .unwrap();
        assert_eq!(reloaded.missing_dependencies(), deps(&[9]));
        add(&reloaded, 9, 4, &[]);
        let compilation = reloaded.compile().unwrap();
        assert!(!compilation.has_errors());
        assert_eq!(activity(&compilation, 3).earliest_start_time, Some(4));
    }

    #[test]
    fn test_set_dependencies_after_reduction() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[1]);
        add(&c, 3, 1, &[1, 2]);
        assert!(c.transitive_reduction().unwrap());
        assert_eq!(c.activity_dependency_ids(3), Some(deps(&[2])));

        assert!(c.set_activity_dependencies(3, &deps(&[2])).unwrap());
        assert_eq!(c.activity(3).unwrap().dependencies, deps(&[2]));
        let snapshot = c.to_graph();
        let third = snapshot.nodes.iter().find(|node| node.id == 3).unwrap();
        assert_eq!(third.content.dependencies, deps(&[2]));
    }

    #[test]
    fn test_find_invalid_constraints() {
        let c = compiler();
        let mut impossible = Activity::new(1, 5);
        impossible.minimum_earliest_start_time = Some(2);
        impossible.maximum_latest_finish_time = Some(4);
        c.add_activity(impossible, &deps(&[])).unwrap();
        assert_eq!(c.find_invalid_constraints(), (vec![1], vec![]));

        let c = compiler();
        add(&c, 1, 5, &[]);
        let mut late = Activity::new(2, 2);
        late.maximum_latest_finish_time = Some(4);
        c.add_activity(late, &deps(&[1])).unwrap();
        assert_eq!(c.find_invalid_constraints(), (vec![], vec![]));

        assert!(c.compile().unwrap().has_errors());
        assert_eq!(c.find_invalid_constraints(), (vec![], vec![2]));
    }

    #[test]
    fn test_ancestor_nodes_lookup() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[1]);
        add(&c, 3, 1, &[2]);
        add(&c, 4, 1, &[]);

        let ancestors = c.ancestor_nodes_lookup().unwrap();
        assert_eq!(ancestors[&3], deps(&[1, 2]));
        assert_eq!(ancestors[&2], deps(&[1]));
        assert!(ancestors[&4].is_empty());

        assert!(c.set_activity_dependencies(1, &deps(&[3])).unwrap());
        assert!(c.ancestor_nodes_lookup().is_none());
    }

    #[test]
    fn test_injection_leaves_authored_dependencies_alone() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        add(&c, 2, 1, &[1]);
        add(&c, 3, 1, &[1, 2]);
        add(&c, 4, 5, &[]);

        let compilation = c.compile_with_resources(&[Resource::new(1)]).unwrap();
        assert!(!compilation.has_errors());
        // 4 shares the only resource with the chain, so something was injected
        assert!(compilation
            .dependent_activities
            .iter()
            .any(|activity| !activity.resource_dependencies.is_empty()));
        for id in 1..=4 {
            let authored = c.activity(id).unwrap().dependencies;
            let expected = match id {
                2 => deps(&[1]),
                3 => deps(&[1, 2]),
                _ => deps(&[]),
            };
            assert_eq!(authored, expected, "authored dependencies of {}", id);
        }

        add(&c, 5, 1, &[]);
        assert_eq!(c.activity(3).unwrap().dependencies, deps(&[1, 2]));
    }

    #[test]
    fn test_remove_activity() {
        let c = compiler();
        add(&c, 1, 1, &[]);
        let mut removable = Activity::new(2, 1);
        removable.can_be_removed = true;
        c.add_activity(removable, &deps(&[1])).unwrap();
        add(&c, 3, 1, &[2]);

        assert!(!c.remove_activity(1).unwrap());
        assert!(c.remove_activity(2).unwrap());
        assert!(c.activity(2).is_none());
        assert_eq!(c.activity_dependency_ids(3), Some(deps(&[])));
    }

    #[test]
    fn test_concurrent_mutation() {
        let c = Arc::new(compiler());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for step in 0..25 {
                        let id = worker * 100 + step;
                        let dependencies = if step == 0 { vec![] } else { vec![id - 1] };
                        add(&c, id, 1, &dependencies);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let compilation = c.compile().unwrap();
        assert!(!compilation.has_errors());
        assert_eq!(compilation.dependent_activities.len(), 100);
        assert_eq!(compilation.finish_time(), 25);
    }
}
