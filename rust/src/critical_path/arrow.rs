//! Propagation over activity-on-arrow graphs.
//!
//! Activities are edges and nodes are events. A node's earliest time is the
//! latest release of its incoming activities; its latest time is the
//! earliest latest-start of its outgoing activities. Removable dummies pass
//! their successors' earliest start straight through so free slack is
//! measured against real successors only.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::trace;

use crate::error::{GraphError, Result};
use crate::graph::GraphStore;
use crate::models::{Activity, Event};
use crate::sequence::SequentialId;

use super::{earliest_start_time, latest_finish_time, project_finish, release_time};

fn missing_time<T: std::fmt::Debug>(id: T, what: &str) -> GraphError {
    GraphError::InvariantViolation(format!("activity {:?} has no {}", id, what))
}

/// Compute earliest times for every activity and event. Returns the project
/// finish time.
pub fn forward_flow<T, R>(store: &mut GraphStore<T, Activity<T, R>, Event<T>>) -> Result<i32>
where
    T: SequentialId,
    R: Clone,
{
    for edge in store.edges_mut() {
        edge.content.reset_timing();
    }
    for node in store.nodes_mut() {
        node.content.earliest_finish_time = None;
        node.content.latest_finish_time = None;
    }

    let mut remaining: FxHashMap<T, usize> = store
        .nodes()
        .map(|node| (node.id, node.incoming_edges.len()))
        .collect();
    let mut queue: VecDeque<T> = store
        .nodes()
        .filter(|node| node.incoming_edges.is_empty())
        .map(|node| node.id)
        .collect();
    let mut processed = 0usize;

    while let Some(node_id) = queue.pop_front() {
        processed += 1;
        let node = store.node_ref(node_id)?;

        let mut event_time = 0;
        for &edge_id in &node.incoming_edges {
            let edge = store
                .edge(edge_id)
                .ok_or_else(|| GraphError::edge_not_found(edge_id))?;
            let release =
                release_time(&edge.content).ok_or_else(|| missing_time(edge_id, "earliest start"))?;
            event_time = event_time.max(release);
        }
        let outgoing: Vec<T> = node.outgoing_edges.iter().copied().collect();

        if let Some(node) = store.node_mut(node_id) {
            node.content.earliest_finish_time = Some(event_time);
        }
        trace!(event = ?node_id, time = event_time, "forward pass");

        for edge_id in outgoing {
            if let Some(edge) = store.edge_mut(edge_id) {
                let start = earliest_start_time(&edge.content, event_time);
                edge.content.earliest_start_time = Some(start);
            }
            let head = store.head_of(edge_id)?;
            if let Some(count) = remaining.get_mut(&head) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(head);
                }
            }
        }
    }

    let total = store.node_count();
    if processed < total {
        return Err(GraphError::CyclicGraph(total - processed));
    }
    Ok(project_finish(store.edges().map(|edge| &edge.content)))
}

/// Compute latest times and free slack. Requires `forward_flow`.
pub fn backward_flow<T, R>(store: &mut GraphStore<T, Activity<T, R>, Event<T>>) -> Result<()>
where
    T: SequentialId,
    R: Clone,
{
    if store
        .edges()
        .any(|edge| edge.content.earliest_start_time.is_none())
    {
        return Err(GraphError::CriticalPathNotCalculated);
    }
    let finish = project_finish(store.edges().map(|edge| &edge.content));

    let mut remaining: FxHashMap<T, usize> = store
        .nodes()
        .map(|node| (node.id, node.outgoing_edges.len()))
        .collect();
    let mut queue: VecDeque<T> = store
        .nodes()
        .filter(|node| node.outgoing_edges.is_empty())
        .map(|node| node.id)
        .collect();
    // Earliest start of the first real activity reachable from each event
    let mut successor_starts: FxHashMap<T, i32> = FxHashMap::default();
    let mut processed = 0usize;

    while let Some(node_id) = queue.pop_front() {
        processed += 1;
        let node = store.node_ref(node_id)?;

        let mut latest_limit = finish;
        let mut successor_start = finish;
        for &edge_id in &node.outgoing_edges {
            let activity = &store
                .edge(edge_id)
                .ok_or_else(|| GraphError::edge_not_found(edge_id))?
                .content;
            let latest_start = activity
                .latest_start_time()
                .ok_or_else(|| missing_time(edge_id, "latest finish"))?;
            latest_limit = latest_limit.min(latest_start);

            let start = if activity.is_transparent() {
                let head = store.head_of(edge_id)?;
                successor_starts.get(&head).copied().unwrap_or(finish)
            } else {
                activity
                    .earliest_start_time
                    .ok_or_else(|| missing_time(edge_id, "earliest start"))?
            };
            successor_start = successor_start.min(start);
        }
        let incoming: Vec<T> = node.incoming_edges.iter().copied().collect();

        successor_starts.insert(node_id, successor_start);
        if let Some(node) = store.node_mut(node_id) {
            node.content.latest_finish_time = Some(latest_limit);
        }
        trace!(event = ?node_id, latest = latest_limit, "backward pass");

        for edge_id in incoming {
            if let Some(edge) = store.edge_mut(edge_id) {
                let activity = &mut edge.content;
                let latest_finish = latest_finish_time(activity, latest_limit);
                let earliest_finish = activity
                    .earliest_finish_time()
                    .ok_or_else(|| missing_time(edge_id, "earliest finish"))?;
                activity.latest_finish_time = Some(latest_finish);
                activity.free_slack = Some(successor_start - earliest_finish);
            }
            let tail = store.tail_of(edge_id)?;
            if let Some(count) = remaining.get_mut(&tail) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(tail);
                }
            }
        }
    }

    let total = store.node_count();
    if processed < total {
        return Err(GraphError::CyclicGraph(total - processed));
    }
    Ok(())
}
