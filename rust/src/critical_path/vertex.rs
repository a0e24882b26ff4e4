//! Propagation over activity-on-node graphs.
//!
//! Activities are nodes; each edge's event records the finish times of the
//! edge's tail activity.

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

/// Compute earliest start times for every activity. Returns the project
/// finish time.
pub fn forward_flow<T, R>(store: &mut GraphStore<T, Event<T>, Activity<T, R>>) -> Result<i32>
where
    T: SequentialId,
    R: Clone,
{
    for node in store.nodes_mut() {
        node.content.reset_timing();
    }
    for edge in store.edges_mut() {
        edge.content.earliest_finish_time = None;
        edge.content.latest_finish_time = None;
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

        // Earliest start = latest release of all predecessors
        let mut release = 0;
        for &edge_id in &node.incoming_edges {
            let tail = store.tail_of(edge_id)?;
            let predecessor = &store.node_ref(tail)?.content;
            let predecessor_release =
                release_time(predecessor).ok_or_else(|| missing_time(tail, "earliest start"))?;
            release = release.max(predecessor_release);
        }
        let start = earliest_start_time(&node.content, release);
        let finish = start + node.content.duration;
        let outgoing: Vec<T> = node.outgoing_edges.iter().copied().collect();

        if let Some(node) = store.node_mut(node_id) {
            node.content.earliest_start_time = Some(start);
        }
        trace!(activity = ?node_id, start, finish, "forward pass");

        for edge_id in outgoing {
            if let Some(edge) = store.edge_mut(edge_id) {
                edge.content.earliest_finish_time = Some(finish);
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
    Ok(project_finish(store.nodes().map(|node| &node.content)))
}

/// Compute latest finish times and free slack. Requires `forward_flow`.
pub fn backward_flow<T, R>(store: &mut GraphStore<T, Event<T>, Activity<T, R>>) -> Result<()>
where
    T: SequentialId,
    R: Clone,
{
    if store
        .nodes()
        .any(|node| node.content.earliest_start_time.is_none())
    {
        return Err(GraphError::CriticalPathNotCalculated);
    }
    let finish = project_finish(store.nodes().map(|node| &node.content));

    let mut remaining: FxHashMap<T, usize> = store
        .nodes()
        .map(|node| (node.id, node.outgoing_edges.len()))
        .collect();
    let mut queue: VecDeque<T> = store
        .nodes()
        .filter(|node| node.outgoing_edges.is_empty())
        .map(|node| node.id)
        .collect();
    let mut processed = 0usize;

    while let Some(node_id) = queue.pop_front() {
        processed += 1;
        let node = store.node_ref(node_id)?;

        let mut latest_limit = finish;
        let mut successor_start = finish;
        for &edge_id in &node.outgoing_edges {
            let head = store.head_of(edge_id)?;
            let successor = &store.node_ref(head)?.content;
            let latest_start = successor
                .latest_start_time()
                .ok_or_else(|| missing_time(head, "latest finish"))?;
            let earliest_start = successor
                .earliest_start_time
                .ok_or_else(|| missing_time(head, "earliest start"))?;
            latest_limit = latest_limit.min(latest_start);
            successor_start = successor_start.min(earliest_start);
        }

        let activity = &node.content;
        let latest_finish = latest_finish_time(activity, latest_limit);
        let earliest_finish = activity
            .earliest_finish_time()
            .ok_or_else(|| missing_time(node_id, "earliest finish"))?;
        let free_slack = successor_start - earliest_finish;
        let incoming: Vec<T> = node.incoming_edges.iter().copied().collect();
        let outgoing: Vec<T> = node.outgoing_edges.iter().copied().collect();

        if let Some(node) = store.node_mut(node_id) {
            node.content.latest_finish_time = Some(latest_finish);
            node.content.free_slack = Some(free_slack);
        }
        trace!(activity = ?node_id, latest_finish, free_slack, "backward pass");

        for edge_id in outgoing {
            if let Some(edge) = store.edge_mut(edge_id) {
                edge.content.latest_finish_time = Some(latest_finish);
            }
        }
        for edge_id in incoming {
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
