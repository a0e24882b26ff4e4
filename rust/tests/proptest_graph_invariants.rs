//! Property-based tests for graph invariants.
//!
//! - Vertex and arrow graphs agree on every activity's timings
//! - Arrow cleanup never changes which activities are upstream of another
//! - Snapshots survive a JSON round trip
//! - Single-resource schedules respect dependencies and never overlap

use pert_graph::{
    sequential_generator, Activity, ActivityGraphBuilder, ArrowGraphCompiler, CompilerConfig,
    GraphCompilation, Resource, VertexGraph, VertexGraphBuilder, VertexGraphCompiler,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// (id, duration, dependencies); ids are 1..=n.
type Plan = Vec<(i32, i32, BTreeSet<i32>)>;

// =============================================================================
// Strategies
// =============================================================================

/// A DAG where each activity only depends on activities with lower ids.
fn dag_strategy(max_activities: usize, durations: std::ops::RangeInclusive<i32>) -> impl Strategy<Value = Plan> {
    (1..=max_activities).prop_flat_map(move |count| {
        let activities: Vec<_> = (0..count)
            .map(|index| {
                let earlier: Vec<i32> = (1..=index as i32).collect();
                let dependencies = if earlier.is_empty() {
                    Just(BTreeSet::new()).boxed()
                } else {
                    proptest::collection::btree_set(
                        proptest::sample::select(earlier),
                        0..=index.min(3),
                    )
                    .boxed()
                };
                (durations.clone(), dependencies)
            })
            .collect();
        activities.prop_map(|activities| {
            activities
                .into_iter()
                .enumerate()
                .map(|(index, (duration, dependencies))| (index as i32 + 1, duration, dependencies))
                .collect()
        })
    })
}

/// The same plan in an arbitrary insertion order.
fn shuffled_dag_strategy() -> impl Strategy<Value = (Plan, Plan)> {
    dag_strategy(10, 0..=6).prop_flat_map(|plan| (Just(plan.clone()), Just(plan).prop_shuffle()))
}

// =============================================================================
// Helpers
// =============================================================================

fn vertex_compiler(plan: &Plan, config: CompilerConfig) -> VertexGraphCompiler<i32, i32> {
    let compiler = VertexGraphCompiler::with_config(sequential_generator(1000), config);
    for (id, duration, dependencies) in plan {
        assert!(compiler
            .add_activity(Activity::new(*id, *duration), dependencies)
            .unwrap());
    }
    compiler
}

fn arrow_compiler(plan: &Plan) -> ArrowGraphCompiler<i32, i32> {
    let compiler =
        ArrowGraphCompiler::new(sequential_generator(1000), sequential_generator(0)).unwrap();
    for (id, duration, dependencies) in plan {
        assert!(compiler
            .add_activity(Activity::new(*id, *duration), dependencies)
            .unwrap());
    }
    compiler
}

fn by_id(compilation: &GraphCompilation<i32, i32>) -> BTreeMap<i32, &Activity<i32, i32>> {
    compilation
        .dependent_activities
        .iter()
        .map(|activity| (activity.id, activity))
        .collect()
}

/// Every activity upstream of each activity.
fn ancestors(dependencies: &BTreeMap<i32, BTreeSet<i32>>) -> BTreeMap<i32, BTreeSet<i32>> {
    fn visit(
        id: i32,
        dependencies: &BTreeMap<i32, BTreeSet<i32>>,
        memo: &mut BTreeMap<i32, BTreeSet<i32>>,
    ) -> BTreeSet<i32> {
        if let Some(known) = memo.get(&id) {
            return known.clone();
        }
        let mut all = BTreeSet::new();
        for &dependency in dependencies.get(&id).into_iter().flatten() {
            all.insert(dependency);
            all.extend(visit(dependency, dependencies, memo));
        }
        memo.insert(id, all.clone());
        all
    }

    let mut memo = BTreeMap::new();
    dependencies
        .keys()
        .map(|&id| (id, visit(id, dependencies, &mut memo)))
        .collect()
}

fn reduction_only() -> CompilerConfig {
    CompilerConfig {
        transitive_reduction: true,
        ..CompilerConfig::timing_only()
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Both representations compute identical timings, whatever order the
    /// arrow graph was built in.
    #[test]
    fn vertex_and_arrow_timings_agree((plan, shuffled) in shuffled_dag_strategy()) {
        let vertex = vertex_compiler(&plan, reduction_only()).compile().unwrap();
        let arrow = arrow_compiler(&shuffled).compile().unwrap();
        prop_assert!(!vertex.has_errors());
        prop_assert!(!arrow.has_errors());
        prop_assert_eq!(vertex.finish_time(), arrow.finish_time());

        let vertex = by_id(&vertex);
        let arrow = by_id(&arrow);
        prop_assert_eq!(vertex.keys().collect::<Vec<_>>(), arrow.keys().collect::<Vec<_>>());
        for (id, expected) in &vertex {
            let actual = arrow[id];
            prop_assert_eq!(actual.earliest_start_time, expected.earliest_start_time, "es of {}", id);
            prop_assert_eq!(actual.latest_finish_time, expected.latest_finish_time, "lf of {}", id);
            prop_assert_eq!(actual.free_slack, expected.free_slack, "free slack of {}", id);
        }

        let planned: BTreeMap<i32, BTreeSet<i32>> = plan
            .iter()
            .map(|(id, _, dependencies)| (*id, dependencies.clone()))
            .collect();
        let compiled: BTreeMap<i32, BTreeSet<i32>> = arrow
            .iter()
            .map(|(id, activity)| (*id, activity.dependencies.clone()))
            .collect();
        prop_assert_eq!(ancestors(&compiled), ancestors(&planned));
    }

    /// Cleanup keeps the bookkeeping consistent and recompiling does not
    /// move any activity.
    #[test]
    fn arrow_cleanup_is_stable(plan in dag_strategy(10, 0..=6)) {
        let compiler = arrow_compiler(&plan);
        let first = compiler.compile().unwrap();
        compiler.builder().verify_bookkeeping().unwrap();

        let second = compiler.compile().unwrap();
        compiler.builder().verify_bookkeeping().unwrap();
        prop_assert_eq!(first.finish_time(), second.finish_time());
        let second = by_id(&second);
        for activity in &first.dependent_activities {
            let again = second[&activity.id];
            prop_assert_eq!(again.earliest_start_time, activity.earliest_start_time);
            prop_assert_eq!(again.latest_finish_time, activity.latest_finish_time);
            prop_assert_eq!(again.free_slack, activity.free_slack);
        }
    }

    /// A compiled vertex graph survives a JSON round trip unchanged.
    #[test]
    fn vertex_snapshot_json_round_trip(plan in dag_strategy(8, 0..=6)) {
        let compiler = vertex_compiler(&plan, CompilerConfig::timing_only());
        compiler.compile().unwrap();
        let snapshot = compiler.to_graph();

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: VertexGraph<i32, i32> = serde_json::from_str(&json).unwrap();
        let rebuilt = VertexGraphBuilder::from_graph(decoded, sequential_generator(5000)).unwrap();
        prop_assert_eq!(rebuilt.to_graph(), snapshot);
        prop_assert_eq!(rebuilt.edge_count(), compiler.builder().edge_count());
    }

    /// With one resource every activity is booked once, after its
    /// dependencies, and the booking matches the recomputed critical path.
    #[test]
    fn single_resource_schedule_is_serial(plan in dag_strategy(8, 1..=5)) {
        let compiler = vertex_compiler(&plan, CompilerConfig::default());
        let compilation = compiler.compile_with_resources(&[Resource::new(1)]).unwrap();
        prop_assert!(!compilation.has_errors());
        prop_assert_eq!(compilation.resource_schedules.len(), 1);

        let booked = &compilation.resource_schedules[0].scheduled_activities;
        prop_assert_eq!(booked.len(), plan.len());
        for pair in booked.windows(2) {
            prop_assert!(pair[0].finish_time <= pair[1].start_time);
        }

        let starts: BTreeMap<i32, (i32, i32)> = booked
            .iter()
            .map(|scheduled| (scheduled.id, (scheduled.start_time, scheduled.finish_time)))
            .collect();
        let activities = by_id(&compilation);
        for (id, _, dependencies) in &plan {
            let (start, _) = starts[id];
            for dependency in dependencies {
                prop_assert!(starts[dependency].1 <= start, "{} starts before {} ends", id, dependency);
            }
            prop_assert_eq!(activities[id].earliest_start_time, Some(start));
        }
        prop_assert_eq!(compilation.finish_time(), compilation.resource_schedules[0].finish_time);
    }
}
