//! Resource-constrained list scheduling.
//!
//! The simulation jumps from event to event (an activity releasing its
//! successors, a resource coming free, a start floor being reached). At each
//! event every ready activity is offered, in priority order, to the resources
//! it may use. Without any active resources the pool is unlimited and a new
//! lane is opened whenever no existing lane is free.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::error::{GraphError, Result};
use crate::models::{Activity, LogicalOperator, Resource, ResourceSchedule};
use crate::sequence::SequentialId;

use super::resource_schedule::ResourceScheduleBuilder;

/// Activities whose resource targeting can never be satisfied by the pool.
///
/// In unlimited mode targets are ignored, so nothing is reported.
pub fn invalid_target_resources<T, R>(activities: &[Activity<T, R>], resources: &[Resource<R>]) -> Vec<T>
where
    T: SequentialId,
    R: Ord,
{
    let active: BTreeSet<&R> = resources
        .iter()
        .filter(|resource| !resource.is_inactive)
        .map(|resource| &resource.id)
        .collect();
    if active.is_empty() {
        return Vec::new();
    }
    let has_general_purpose = resources
        .iter()
        .any(|resource| !resource.is_inactive && !resource.is_explicit_target);

    let mut invalid: Vec<T> = activities
        .iter()
        .filter(|activity| !activity.is_dummy())
        .filter(|activity| {
            if activity.target_resources.is_empty() {
                return !has_general_purpose;
            }
            match activity.target_resource_operator {
                LogicalOperator::And => activity
                    .target_resources
                    .iter()
                    .any(|target| !active.contains(target)),
                LogicalOperator::Or => activity
                    .target_resources
                    .iter()
                    .all(|target| !active.contains(target)),
            }
        })
        .map(|activity| activity.id)
        .collect();
    invalid.sort();
    invalid
}

/// Greedy list scheduler over a compiled, acyclic set of activities.
pub struct ResourceScheduler<'a, T, R> {
    activities: FxHashMap<T, &'a Activity<T, R>>,
    /// Position in the priority list; unlisted activities go last
    ranks: FxHashMap<T, usize>,
    lanes: Vec<ResourceScheduleBuilder<T, R>>,
    unlimited: bool,
    last_spawned: R,
    max_iterations: usize,
}

impl<'a, T, R> ResourceScheduler<'a, T, R>
where
    T: SequentialId,
    R: SequentialId + Default,
{
    /// Create a scheduler. Activities' `dependencies` must be complete and
    /// acyclic. Inactive resources are ignored; the rest are offered work in
    /// `(allocation_order, id)` order.
    pub fn new(
        activities: &'a [Activity<T, R>],
        priority_list: &[T],
        resources: &[Resource<R>],
        max_iterations_per_activity: usize,
    ) -> Self {
        let mut pool: Vec<Resource<R>> = resources
            .iter()
            .filter(|resource| !resource.is_inactive)
            .cloned()
            .collect();
        pool.sort_by_key(|resource| (resource.allocation_order, resource.id));

        Self {
            activities: activities
                .iter()
                .map(|activity| (activity.id, activity))
                .collect(),
            ranks: priority_list
                .iter()
                .enumerate()
                .map(|(rank, &id)| (id, rank))
                .collect(),
            unlimited: pool.is_empty(),
            lanes: pool.into_iter().map(ResourceScheduleBuilder::new).collect(),
            last_spawned: R::default(),
            max_iterations: activities.len().saturating_mul(max_iterations_per_activity.max(1)),
        }
    }

    /// Run the simulation and return one schedule per lane.
    pub fn schedule(mut self) -> Result<Vec<ResourceSchedule<T, R>>> {
        let mut unscheduled: BTreeSet<T> = self.activities.keys().copied().collect();
        // Time at which each scheduled activity releases its successors
        let mut released: FxHashMap<T, i32> = FxHashMap::default();
        let mut current_time = 0;

        for _iteration in 0..self.max_iterations {
            if unscheduled.is_empty() {
                break;
            }
            trace!(time = current_time, pending = unscheduled.len(), "simulation step");

            let ready = self.find_ready_activities(&released, &unscheduled, current_time);
            let mut scheduled_any = false;

            for id in ready {
                let Some(&activity) = self.activities.get(&id) else {
                    continue;
                };
                let finish = if activity.is_dummy() {
                    Some(current_time)
                } else {
                    self.try_schedule(activity, current_time)
                };
                if let Some(finish) = finish {
                    released.insert(id, finish + activity.minimum_free_slack.unwrap_or(0));
                    unscheduled.remove(&id);
                    scheduled_any = true;
                    debug!(activity = ?id, start = current_time, finish, "scheduled activity");
                }
            }

            if !scheduled_any {
                match self.find_next_event_time(&released, &unscheduled, current_time) {
                    Some(next_time) => current_time = next_time,
                    None => break,
                }
            }
        }

        if !unscheduled.is_empty() {
            return Err(GraphError::SchedulingStalled(unscheduled.len()));
        }
        Ok(self
            .lanes
            .into_iter()
            .map(ResourceScheduleBuilder::build)
            .collect())
    }

    /// Unscheduled activities whose predecessors have released and whose
    /// start floor has passed, in priority order.
    fn find_ready_activities(
        &self,
        released: &FxHashMap<T, i32>,
        unscheduled: &BTreeSet<T>,
        current_time: i32,
    ) -> Vec<T> {
        let mut ready: Vec<T> = unscheduled
            .iter()
            .copied()
            .filter(|id| {
                let Some(activity) = self.activities.get(id) else {
                    return false;
                };
                if activity
                    .minimum_earliest_start_time
                    .is_some_and(|floor| floor > current_time)
                {
                    return false;
                }
                activity.dependencies.iter().all(|dependency| {
                    if !self.activities.contains_key(dependency) {
                        return true;
                    }
                    released
                        .get(dependency)
                        .is_some_and(|&release| release <= current_time)
                })
            })
            .collect();
        ready.sort_by_key(|id| (self.ranks.get(id).copied().unwrap_or(usize::MAX), *id));
        ready
    }

    /// Book the activity on the lanes it may use. Returns its finish time, or
    /// `None` if it has to wait.
    fn try_schedule(&mut self, activity: &Activity<T, R>, current_time: i32) -> Option<i32> {
        let lanes = if self.unlimited {
            let free = self
                .lanes
                .iter()
                .position(|lane| lane.is_available(current_time, activity.duration));
            vec![free.unwrap_or_else(|| self.spawn_lane())]
        } else {
            self.select_lanes(activity, current_time)?
        };

        let mut finish = current_time;
        for index in lanes {
            if let Some(lane) = self.lanes.get_mut(index) {
                finish = lane.schedule(activity, current_time);
                trace!(activity = ?activity.id, resource = ?lane.resource().id, "allocated");
            }
        }
        Some(finish)
    }

    fn select_lanes(&self, activity: &Activity<T, R>, current_time: i32) -> Option<Vec<usize>> {
        let free = |lane: &ResourceScheduleBuilder<T, R>| lane.is_available(current_time, activity.duration);
        let targeted: Vec<usize> = self
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| activity.target_resources.contains(&lane.resource().id))
            .map(|(index, _)| index)
            .collect();

        if activity.target_resources.is_empty() {
            return self
                .lanes
                .iter()
                .position(|lane| !lane.resource().is_explicit_target && free(lane))
                .map(|index| vec![index]);
        }
        match activity.target_resource_operator {
            LogicalOperator::And => {
                let all_free = targeted.len() == activity.target_resources.len()
                    && targeted.iter().all(|&index| free(&self.lanes[index]));
                all_free.then_some(targeted)
            }
            LogicalOperator::Or => targeted
                .into_iter()
                .find(|&index| free(&self.lanes[index]))
                .map(|index| vec![index]),
        }
    }

    /// Open a new lane in unlimited mode.
    fn spawn_lane(&mut self) -> usize {
        self.last_spawned = self.last_spawned.next();
        let resource = Resource::new(self.last_spawned);
        debug!(resource = ?resource.id, "spawned resource lane");
        self.lanes.push(ResourceScheduleBuilder::new(resource));
        self.lanes.len() - 1
    }

    fn find_next_event_time(
        &self,
        released: &FxHashMap<T, i32>,
        unscheduled: &BTreeSet<T>,
        current_time: i32,
    ) -> Option<i32> {
        let releases = released
            .values()
            .copied()
            .filter(|&release| release > current_time);
        let start_floors = unscheduled
            .iter()
            .filter_map(|id| self.activities.get(id))
            .filter_map(|activity| activity.minimum_earliest_start_time)
            .filter(|&floor| floor > current_time);
        let lane_releases = self
            .lanes
            .iter()
            .filter_map(|lane| lane.next_release_after(current_time));

        releases.chain(start_floors).chain(lane_releases).min()
    }
}
