//! Activity-on-arrow graph builder.
//!
//! Activities are edges and nodes are events. A single Start and a single End
//! node bracket the graph. Fan-in and fan-out that arrows cannot express
//! directly are routed through zero-duration dummy activities, which the
//! cleanup passes (`transitive_reduction`, `redirect_edges`,
//! `remove_redundant_edges`) then minimise.
//!
//! Every activity always has a path to End, and the set of real activities
//! reachable backwards through dummies from an activity's tail is exactly its
//! dependency set.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::critical_path::{self, arrow as flow};
use crate::error::{GraphError, Result};
use crate::graph::cycles::{strong_circular_dependencies, strongly_connected_components};
use crate::graph::{have_overlap, Edge, Graph, GraphStore, Node, NodeType, NodeTyping};
use crate::models::{Activity, CircularDependency, Event};
use crate::sequence::{IdGenerator, SequentialId};

use super::ActivityGraphBuilder;

/// Snapshot of an arrow graph: activities on edges, events on nodes.
pub type ArrowGraph<T, R> = Graph<T, Activity<T, R>, Event<T>>;

#[derive(Clone)]
pub struct ArrowGraphBuilder<T: SequentialId, R> {
    store: GraphStore<T, Activity<T, R>, Event<T>>,
    start_node_id: T,
    end_node_id: T,
    edge_id_generator: IdGenerator<T>,
    node_id_generator: IdGenerator<T>,
}

impl<T: SequentialId, R: Clone> fmt::Debug for ArrowGraphBuilder<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrowGraphBuilder")
            .field("start_node_id", &self.start_node_id)
            .field("end_node_id", &self.end_node_id)
            .field("edges", &self.store.edge_count())
            .field("nodes", &self.store.node_count())
            .finish_non_exhaustive()
    }
}

impl<T: SequentialId, R: Clone> ArrowGraphBuilder<T, R> {
    /// Create an empty graph holding only the Start and End events.
    pub fn new(edge_id_generator: IdGenerator<T>, node_id_generator: IdGenerator<T>) -> Result<Self> {
        let mut store = GraphStore::new(NodeTyping::Fixed);
        let start_node_id = node_id_generator();
        let end_node_id = node_id_generator();
        store.insert_node(Node::new(
            start_node_id,
            NodeType::Start,
            Event::new_at_zero(start_node_id),
        ))?;
        store.insert_node(Node::new(end_node_id, NodeType::End, Event::new(end_node_id)))?;
        store.pin_node(start_node_id);
        store.pin_node(end_node_id);

        Ok(Self {
            store,
            start_node_id,
            end_node_id,
            edge_id_generator,
            node_id_generator,
        })
    }

    /// Rebuild a builder from a snapshot with exactly one Start and one End.
    pub fn from_graph(
        graph: ArrowGraph<T, R>,
        edge_id_generator: IdGenerator<T>,
        node_id_generator: IdGenerator<T>,
    ) -> Result<Self> {
        let mut store = GraphStore::from_graph(graph, NodeTyping::Fixed)?;

        let starts: Vec<T> = store
            .nodes()
            .filter(|node| node.node_type == NodeType::Start)
            .map(|node| node.id)
            .collect();
        let ends: Vec<T> = store
            .nodes()
            .filter(|node| node.node_type == NodeType::End)
            .map(|node| node.id)
            .collect();
        let (&[start_node_id], &[end_node_id]) = (starts.as_slice(), ends.as_slice()) else {
            return Err(GraphError::InvalidSnapshot(format!(
                "expected one start and one end node, found {} and {}",
                starts.len(),
                ends.len()
            )));
        };

        if !store.node_ref(start_node_id)?.incoming_edges.is_empty() {
            return Err(GraphError::InvalidSnapshot(format!(
                "start node {:?} has incoming edges",
                start_node_id
            )));
        }
        if !store.node_ref(end_node_id)?.outgoing_edges.is_empty() {
            return Err(GraphError::InvalidSnapshot(format!(
                "end node {:?} has outgoing edges",
                end_node_id
            )));
        }
        for edge in store.edges() {
            if edge.content.id != edge.id {
                return Err(GraphError::InvalidSnapshot(format!(
                    "edge {:?} carries activity {:?}",
                    edge.id, edge.content.id
                )));
            }
        }
        for node in store.nodes() {
            if node.content.id != node.id {
                return Err(GraphError::InvalidSnapshot(format!(
                    "node {:?} carries event {:?}",
                    node.id, node.content.id
                )));
            }
        }
        store.pin_node(start_node_id);
        store.pin_node(end_node_id);

        // Authored dependencies with no edge are still being waited for at
        // the activity's tail
        let mut waits = Vec::new();
        for edge in store.edges() {
            for &dependency in &edge.content.dependencies {
                if !store.contains_edge(dependency) {
                    waits.push((dependency, store.tail_of(edge.id)?));
                }
            }
        }
        for (dependency, tail) in waits {
            store.restore_unsatisfied_successor(dependency, tail)?;
        }

        Ok(Self {
            store,
            start_node_id,
            end_node_id,
            edge_id_generator,
            node_id_generator,
        })
    }

    pub fn start_node_id(&self) -> T {
        self.start_node_id
    }

    pub fn end_node_id(&self) -> T {
        self.end_node_id
    }

    pub fn node(&self, id: T) -> Option<&Node<T, Event<T>>> {
        self.store.node(id)
    }

    pub fn tail_of(&self, activity_id: T) -> Result<T> {
        self.store.tail_of(activity_id)
    }

    pub fn head_of(&self, activity_id: T) -> Result<T> {
        self.store.head_of(activity_id)
    }

    /// Check that edge side tables and node adjacency agree.
    pub fn verify_bookkeeping(&self) -> Result<()> {
        self.store.verify_bookkeeping()
    }

    fn is_terminal(&self, node_id: T) -> bool {
        node_id == self.start_node_id || node_id == self.end_node_id
    }

    fn is_transparent(&self, edge_id: T) -> bool {
        self.store
            .edge(edge_id)
            .is_some_and(|edge| edge.content.is_transparent())
    }

    fn new_node(&mut self) -> Result<T> {
        let id = (self.node_id_generator)();
        self.store
            .insert_node(Node::new(id, NodeType::Normal, Event::new(id)))?;
        Ok(id)
    }

    fn add_dummy(&mut self, tail: T, head: T) -> Result<T> {
        let id = (self.edge_id_generator)();
        self.store
            .insert_edge(Edge::new(id, Activity::new_dummy(id)), tail, head)?;
        debug!(dummy = ?id, tail = ?tail, head = ?head, "added dummy activity");
        Ok(id)
    }

    /// Real activities reachable backwards from the activity's tail through
    /// removable dummies.
    pub fn strong_activity_dependency_ids(&self, id: T) -> Result<BTreeSet<T>> {
        let mut found = BTreeSet::new();
        let mut visited: FxHashSet<T> = FxHashSet::default();
        let mut stack = vec![self.store.tail_of(id)?];

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            for &edge_id in &self.store.node_ref(node_id)?.incoming_edges {
                if self.is_transparent(edge_id) {
                    stack.push(self.store.tail_of(edge_id)?);
                } else {
                    found.insert(edge_id);
                }
            }
        }
        Ok(found)
    }

    /// Real activities reachable forwards from the activity's head through
    /// removable dummies.
    pub fn strong_successor_activity_ids(&self, id: T) -> Result<BTreeSet<T>> {
        let mut found = BTreeSet::new();
        let mut visited: FxHashSet<T> = FxHashSet::default();
        let mut stack = vec![self.store.head_of(id)?];

        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            for &edge_id in &self.store.node_ref(node_id)?.outgoing_edges {
                if self.is_transparent(edge_id) {
                    stack.push(self.store.head_of(edge_id)?);
                } else {
                    found.insert(edge_id);
                }
            }
        }
        Ok(found)
    }

    /// Missing dependencies the activity is still waiting for.
    pub fn pending_dependency_ids(&self, id: T) -> Result<BTreeSet<T>> {
        let tail = self.store.tail_of(id)?;
        Ok(self.store.waiting_dependencies(tail))
    }

    /// Head node whose only incoming edge is this activity, splitting the
    /// current head if it is End, shared with other activities, or `avoid`.
    fn ensure_private_head(&mut self, activity_id: T, avoid: Option<T>) -> Result<T> {
        let head = self.store.head_of(activity_id)?;
        if head != self.end_node_id
            && Some(head) != avoid
            && self.store.node_ref(head)?.incoming_edges.len() == 1
        {
            return Ok(head);
        }
        let private = self.new_node()?;
        self.store.repoint_edge_head(activity_id, private)?;
        self.add_dummy(private, head)?;
        Ok(private)
    }

    /// Tail node whose only outgoing edge is this activity. A shared tail
    /// stays upstream of the new one so existing dependencies are kept.
    fn ensure_private_tail(&mut self, activity_id: T) -> Result<T> {
        let tail = self.store.tail_of(activity_id)?;
        if tail == self.start_node_id {
            let private = self.new_node()?;
            self.store.repoint_edge_tail(activity_id, private)?;
            return Ok(private);
        }
        if self.store.node_ref(tail)?.outgoing_edges.len() == 1 {
            return Ok(tail);
        }
        let private = self.new_node()?;
        self.store.repoint_edge_tail(activity_id, private)?;
        self.add_dummy(tail, private)?;
        Ok(private)
    }

    /// Wire a newly added activity's head to every tail waiting for it, or
    /// to End if nothing is waiting.
    fn resolve_unsatisfied_successor_activities(&mut self, id: T) -> Result<()> {
        let head = self.store.head_of(id)?;
        match self.store.take_unsatisfied_successors(id) {
            Some(waiting) => {
                for tail in waiting {
                    self.add_dummy(head, tail)?;
                }
            }
            None => {
                self.add_dummy(head, self.end_node_id)?;
            }
        }
        Ok(())
    }

    /// Remove dead ends and orphaned sources left behind by a mutation.
    ///
    /// A dead end drops its incoming dummies and, if a real activity still
    /// finishes there, gets a dummy to End. A source other than Start drops
    /// its outgoing dummies and hands its real activities to Start.
    fn tidy_nodes(&mut self, seeds: Vec<T>) -> Result<()> {
        let mut worklist = seeds;
        while let Some(node_id) = worklist.pop() {
            if self.is_terminal(node_id) || !self.store.contains_node(node_id) {
                continue;
            }
            let node = self.store.node_ref(node_id)?;
            let incoming: Vec<T> = node.incoming_edges.iter().copied().collect();
            let outgoing: Vec<T> = node.outgoing_edges.iter().copied().collect();

            if outgoing.is_empty() {
                self.store.forget_waiting_node(node_id);
                let mut finishes_real_activity = false;
                for edge_id in incoming {
                    if self.is_transparent(edge_id) {
                        let tail = self.store.tail_of(edge_id)?;
                        self.store.remove_edge(edge_id)?;
                        worklist.push(tail);
                    } else {
                        finishes_real_activity = true;
                    }
                }
                if finishes_real_activity {
                    self.add_dummy(node_id, self.end_node_id)?;
                } else {
                    self.store.remove_node(node_id)?;
                    debug!(node = ?node_id, "removed dead end");
                }
            } else if incoming.is_empty() && !self.store.is_waiting(node_id) {
                for edge_id in outgoing {
                    if self.is_transparent(edge_id) {
                        let head = self.store.head_of(edge_id)?;
                        self.store.remove_edge(edge_id)?;
                        worklist.push(head);
                    } else {
                        self.store.repoint_edge_tail(edge_id, self.start_node_id)?;
                    }
                }
                self.store.remove_node(node_id)?;
                debug!(node = ?node_id, "removed orphaned source");
            }
        }
        self.prune_authored_dependencies();
        Ok(())
    }

    /// Drop authored dependencies on activities that are gone, keeping the
    /// ones still waited for.
    fn prune_authored_dependencies(&mut self) {
        let missing = self.store.missing_dependencies();
        let present: FxHashSet<T> = self.store.edge_ids().into_iter().collect();
        for edge in self.store.edges_mut() {
            edge.content
                .dependencies
                .retain(|dependency| present.contains(dependency) || missing.contains(dependency));
        }
    }

    /// Remove a removable dummy by merging its two nodes.
    ///
    /// If the nodes already share another edge the dummy is simply dropped.
    /// Otherwise the head is folded into the tail (the dummy is the head's
    /// only incoming edge) or the tail into the head (the dummy is the tail's
    /// only outgoing edge). Merges that would create parallel edges, delete
    /// Start or End, or pass a pending dependency to other activities are
    /// refused.
    pub fn remove_dummy_activity(&mut self, id: T) -> Result<bool> {
        let removed = self.merge_dummy_activity(id)?;
        if removed {
            self.prune_authored_dependencies();
        }
        Ok(removed)
    }

    fn merge_dummy_activity(&mut self, id: T) -> Result<bool> {
        if !self.is_transparent(id) {
            return Ok(false);
        }
        let tail = self.store.tail_of(id)?;
        let head = self.store.head_of(id)?;

        if self.store.share_more_than_one_edge(tail, head) {
            self.store.remove_edge(id)?;
            debug!(dummy = ?id, "removed duplicate dummy");
            return Ok(true);
        }

        let tail_node = self.store.node_ref(tail)?;
        let head_node = self.store.node_ref(head)?;
        let head_only_incoming = head_node.incoming_edges.len() == 1;
        let tail_only_outgoing = tail_node.outgoing_edges.len() == 1;

        // Fold the head node into the tail node
        if head_only_incoming && !self.is_terminal(head) && !self.store.is_waiting(head) {
            let head_successors = self.store.outgoing_head_nodes(head)?;
            let mut tail_successors = BTreeSet::new();
            for &edge_id in &tail_node.outgoing_edges {
                if edge_id != id {
                    tail_successors.insert(self.store.head_of(edge_id)?);
                }
            }
            if !have_overlap(&head_successors, &tail_successors) && !head_successors.contains(&tail)
            {
                let moved: Vec<T> = head_node.outgoing_edges.iter().copied().collect();
                self.store.remove_edge(id)?;
                for edge_id in moved {
                    self.store.change_edge_tail(edge_id, tail)?;
                }
                if self
                    .store
                    .node(head)
                    .is_some_and(|node| node.is_unconnected())
                {
                    self.store.remove_node(head)?;
                }
                debug!(dummy = ?id, merged = ?head, into = ?tail, "removed dummy activity");
                return Ok(true);
            }
        }

        // Fold the tail node into the head node
        let tail_node = self.store.node_ref(tail)?;
        let head_node = self.store.node_ref(head)?;
        if tail_only_outgoing && !self.is_terminal(tail) {
            let tail_predecessors = self.store.incoming_tail_nodes(tail)?;
            let mut head_predecessors = BTreeSet::new();
            for &edge_id in &head_node.incoming_edges {
                if edge_id != id {
                    head_predecessors.insert(self.store.tail_of(edge_id)?);
                }
            }
            if !have_overlap(&tail_predecessors, &head_predecessors)
                && !tail_predecessors.contains(&head)
            {
                let moved: Vec<T> = tail_node.incoming_edges.iter().copied().collect();
                self.store.remove_edge(id)?;
                for edge_id in moved {
                    self.store.change_edge_head(edge_id, head)?;
                }
                if self
                    .store
                    .node(tail)
                    .is_some_and(|node| node.is_unconnected())
                {
                    self.store.replace_waiting_node(tail, head);
                    self.store.remove_node(tail)?;
                }
                debug!(dummy = ?id, merged = ?tail, into = ?head, "removed dummy activity");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Keep only the smallest-id dummy of each group of parallel incoming
    /// dummies.
    fn collapse_parallel_incoming_dummies(&mut self, node_id: T) -> Result<usize> {
        let Some(node) = self.store.node(node_id) else {
            return Ok(0);
        };
        let mut by_tail: BTreeMap<T, Vec<T>> = BTreeMap::new();
        for &edge_id in &node.incoming_edges {
            if self.is_transparent(edge_id) {
                by_tail
                    .entry(self.store.tail_of(edge_id)?)
                    .or_default()
                    .push(edge_id);
            }
        }
        let mut removed = 0;
        for parallel in by_tail.values() {
            // Edge sets iterate in id order, so the first is kept
            for &edge_id in parallel.iter().skip(1) {
                self.store.remove_edge(edge_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn ready_for_cleanup(&self) -> bool {
        self.all_dependencies_satisfied() && self.store.topological_node_order().is_some()
    }

    fn transparent_ids_descending(&self) -> Vec<T> {
        let mut ids: Vec<T> = self
            .store
            .edges()
            .filter(|edge| edge.content.is_transparent())
            .map(|edge| edge.id)
            .collect();
        ids.reverse();
        ids
    }

    /// Drop dummies that carry no dependency: out of Start into a node with
    /// other incoming edges, or into End from a node with other outgoing
    /// edges.
    fn remove_vacuous_dummies(&mut self) -> Result<usize> {
        let mut removed = 0;
        for id in self.transparent_ids_descending() {
            let tail = self.store.tail_of(id)?;
            let head = self.store.head_of(id)?;
            let from_start =
                tail == self.start_node_id && self.store.node_ref(head)?.incoming_edges.len() > 1;
            let into_end =
                head == self.end_node_id && self.store.node_ref(tail)?.outgoing_edges.len() > 1;
            if from_start || into_end {
                self.store.remove_edge(id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn remove_redundant_edges_once(&mut self) -> Result<usize> {
        let mut removed = self.remove_vacuous_dummies()?;

        // Sole outgoing edge of its tail and sole incoming edge of its head
        for id in self.transparent_ids_descending() {
            if !self.store.contains_edge(id) {
                continue;
            }
            let tail = self.store.tail_of(id)?;
            let head = self.store.head_of(id)?;
            if self.store.node_ref(tail)?.outgoing_edges.len() == 1
                && self.store.node_ref(head)?.incoming_edges.len() == 1
                && self.merge_dummy_activity(id)?
            {
                removed += 1;
            }
        }

        // Sole incoming edge of its head
        for id in self.transparent_ids_descending() {
            if !self.store.contains_edge(id) {
                continue;
            }
            let head = self.store.head_of(id)?;
            if self.store.node_ref(head)?.incoming_edges.len() == 1 && self.merge_dummy_activity(id)? {
                removed += 1;
            }
        }

        // Sole outgoing edge of its tail
        for id in self.transparent_ids_descending() {
            if !self.store.contains_edge(id) {
                continue;
            }
            let tail = self.store.tail_of(id)?;
            if self.store.node_ref(tail)?.outgoing_edges.len() == 1 && self.merge_dummy_activity(id)? {
                removed += 1;
            }
        }

        for node_id in self.store.node_ids() {
            removed += self.collapse_parallel_incoming_dummies(node_id)?;
        }
        Ok(removed)
    }

    /// Redirect and remove redundant dummies until nothing changes.
    ///
    /// Every successful round removes at least one edge, so the loop ends
    /// and a second call finds nothing to do.
    pub fn clean_up_edges(&mut self) -> Result<bool> {
        if !self.ready_for_cleanup() {
            return Ok(false);
        }
        loop {
            let before = (self.store.edge_count(), self.store.node_count());
            self.redirect_edges()?;
            self.remove_redundant_edges()?;
            if (self.store.edge_count(), self.store.node_count()) == before {
                return Ok(true);
            }
        }
    }
}

impl<T: SequentialId, R: Clone> ActivityGraphBuilder<T, R> for ArrowGraphBuilder<T, R> {
    type Snapshot = ArrowGraph<T, R>;

    fn add_activity(
        &mut self,
        mut activity: Activity<T, R>,
        dependencies: &BTreeSet<T>,
    ) -> Result<bool> {
        let id = activity.id;
        if self.store.contains_edge(id) || dependencies.contains(&id) {
            debug!(activity = ?id, "rejected activity");
            return Ok(false);
        }
        activity.dependencies = dependencies.clone();

        let tail = if dependencies.is_empty() {
            self.start_node_id
        } else {
            self.new_node()?
        };
        let head = self.new_node()?;
        self.store.insert_edge(Edge::new(id, activity), tail, head)?;

        for &dependency in dependencies {
            if self.store.contains_edge(dependency) {
                let dependency_head = self.ensure_private_head(dependency, None)?;
                self.add_dummy(dependency_head, tail)?;
            } else {
                self.store.add_unsatisfied_successor(dependency, tail)?;
            }
        }
        self.resolve_unsatisfied_successor_activities(id)?;

        debug!(activity = ?id, dependencies = dependencies.len(), "added activity");
        Ok(true)
    }

    fn remove_activity(&mut self, id: T) -> Result<bool> {
        let Some(edge) = self.store.edge(id) else {
            return Ok(false);
        };
        if !edge.content.can_be_removed {
            return Ok(false);
        }
        if edge.content.is_transparent() {
            return self.remove_dummy_activity(id);
        }

        let removed = BTreeSet::from([id]);
        for successor in self.strong_successor_activity_ids(id)? {
            self.remove_activity_dependencies(successor, &removed)?;
        }
        let mut own = self.strong_activity_dependency_ids(id)?;
        own.extend(self.pending_dependency_ids(id)?);
        if !own.is_empty() {
            self.remove_activity_dependencies(id, &own)?;
        }

        let head = self.store.head_of(id)?;
        self.store.remove_edge(id)?;
        self.tidy_nodes(vec![head])?;
        debug!(activity = ?id, "removed activity");
        Ok(true)
    }

    fn add_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>) -> Result<bool> {
        if !self.store.contains_edge(id) || dependencies.contains(&id) {
            return Ok(false);
        }
        if let Some(activity) = self.activity_mut(id) {
            activity.dependencies.extend(dependencies.iter().copied());
        }
        let mut current = self.strong_activity_dependency_ids(id)?;
        current.extend(self.pending_dependency_ids(id)?);
        let added: Vec<T> = dependencies.difference(&current).copied().collect();
        if added.is_empty() {
            return Ok(true);
        }

        let tail = self.ensure_private_tail(id)?;
        for dependency in added {
            if self.store.contains_edge(dependency) {
                let dependency_head = self.ensure_private_head(dependency, None)?;
                self.add_dummy(dependency_head, tail)?;
            } else {
                self.store.add_unsatisfied_successor(dependency, tail)?;
            }
        }
        debug!(activity = ?id, "added dependencies");
        Ok(true)
    }

    fn remove_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>) -> Result<bool> {
        if !self.store.contains_edge(id) {
            return Ok(false);
        }
        if let Some(activity) = self.activity_mut(id) {
            activity
                .dependencies
                .retain(|dependency| !dependencies.contains(dependency));
        }
        let current = self.strong_activity_dependency_ids(id)?;
        let pending = self.pending_dependency_ids(id)?;
        if current.is_disjoint(dependencies) && pending.is_disjoint(dependencies) {
            return Ok(true);
        }
        let kept: Vec<T> = current.difference(dependencies).copied().collect();
        let kept_pending: Vec<T> = pending.difference(dependencies).copied().collect();

        // Rebuild the activity's tail from the dependencies that remain
        let old_tail = self.store.tail_of(id)?;
        let new_tail = if kept.is_empty() && kept_pending.is_empty() {
            self.start_node_id
        } else {
            self.new_node()?
        };
        for dependency in kept {
            // Never hang the new tail off the old one, which may still be
            // waiting on a removed dependency
            let dependency_head = self.ensure_private_head(dependency, Some(old_tail))?;
            self.add_dummy(dependency_head, new_tail)?;
        }
        for dependency in kept_pending {
            self.store.add_unsatisfied_successor(dependency, new_tail)?;
        }
        self.store.repoint_edge_tail(id, new_tail)?;
        self.tidy_nodes(vec![old_tail])?;

        debug!(activity = ?id, "removed dependencies");
        Ok(true)
    }

    fn activity(&self, id: T) -> Option<&Activity<T, R>> {
        self.store.edge(id).map(|edge| &edge.content)
    }

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R>> {
        self.store.edge_mut(id).map(|edge| &mut edge.content)
    }

    fn activity_ids(&self) -> Vec<T> {
        self.store.edge_ids()
    }

    fn activity_dependency_ids(&self, id: T) -> Option<BTreeSet<T>> {
        self.strong_activity_dependency_ids(id).ok()
    }

    fn waiting_dependency_ids(&self, id: T) -> BTreeSet<T> {
        self.pending_dependency_ids(id).unwrap_or_default()
    }

    fn missing_dependencies(&self) -> BTreeSet<T> {
        self.store.missing_dependencies()
    }

    fn all_dependencies_satisfied(&self) -> bool {
        self.store.all_dependencies_satisfied()
    }

    fn find_strong_circular_dependencies(&self) -> Vec<CircularDependency<T>> {
        let components = self.find_circular_components();
        strong_circular_dependencies(&components, |id| {
            self.activity(id).is_some_and(|activity| activity.can_be_removed)
        })
    }

    fn find_circular_components(&self) -> Vec<BTreeSet<T>> {
        strongly_connected_components(self.store.edge_ids(), |edge_id| {
            self.store
                .tail_of(edge_id)
                .ok()
                .and_then(|tail| self.store.node(tail))
                .map(|node| node.incoming_edges.iter().copied().collect::<Vec<T>>())
                .unwrap_or_default()
        })
    }

    fn ancestor_nodes_lookup(&self) -> Option<FxHashMap<T, BTreeSet<T>>> {
        self.store.ancestor_nodes_lookup()
    }

    fn transitive_reduction(&mut self) -> Result<bool> {
        if !self.all_dependencies_satisfied() {
            return Ok(false);
        }
        let Some(ancestors) = self.store.ancestor_nodes_lookup() else {
            return Ok(false);
        };
        let redundant = self
            .store
            .transitively_redundant_edges(&ancestors, |edge| edge.content.is_transparent());
        for &edge_id in &redundant {
            self.store.remove_edge(edge_id)?;
        }
        if !redundant.is_empty() {
            self.prune_authored_dependencies();
        }
        debug!(removed = redundant.len(), "transitive reduction");
        Ok(true)
    }

    fn redirect_edges(&mut self) -> Result<bool> {
        if !self.ready_for_cleanup() {
            return Ok(false);
        }

        for hub in self.store.node_ids() {
            if self.is_terminal(hub) {
                continue;
            }
            let Some(hub_node) = self.store.node(hub) else {
                continue;
            };
            if hub_node.outgoing_edges.is_empty()
                || !hub_node
                    .outgoing_edges
                    .iter()
                    .all(|&edge_id| self.is_transparent(edge_id))
            {
                continue;
            }
            let shared_heads = self.store.outgoing_head_nodes(hub)?;
            if shared_heads.len() < 2 {
                continue;
            }

            let mut redirected = 0;
            for feeder in self.store.node_ids() {
                if feeder == hub || feeder == self.end_node_id {
                    continue;
                }
                let Some(feeder_node) = self.store.node(feeder) else {
                    continue;
                };
                let mut dummies_by_head: BTreeMap<T, Vec<T>> = BTreeMap::new();
                let mut successors = BTreeSet::new();
                for &edge_id in &feeder_node.outgoing_edges {
                    let head = self.store.head_of(edge_id)?;
                    successors.insert(head);
                    if self.is_transparent(edge_id) && shared_heads.contains(&head) {
                        dummies_by_head.entry(head).or_default().push(edge_id);
                    }
                }
                if dummies_by_head.len() != shared_heads.len() || !successors.is_subset(&shared_heads)
                {
                    continue;
                }
                for edge_id in dummies_by_head.into_values().flatten() {
                    self.store.change_edge_head(edge_id, hub)?;
                    redirected += 1;
                }
            }

            if redirected > 0 {
                self.collapse_parallel_incoming_dummies(hub)?;
                debug!(hub = ?hub, redirected, "redirected dummy activities");
            }
        }
        self.prune_authored_dependencies();
        Ok(true)
    }

    fn remove_redundant_edges(&mut self) -> Result<bool> {
        if !self.ready_for_cleanup() {
            return Ok(false);
        }
        let mut total = 0;
        loop {
            let removed = self.remove_redundant_edges_once()?;
            if removed == 0 {
                break;
            }
            total += removed;
        }
        if total > 0 {
            self.prune_authored_dependencies();
        }
        debug!(removed = total, "removed redundant dummy activities");
        Ok(true)
    }

    fn calculate_critical_path(&mut self) -> Result<bool> {
        if !self.all_dependencies_satisfied()
            || !self.find_invalid_pre_compilation_constraints().is_empty()
        {
            return Ok(false);
        }
        flow::forward_flow(&mut self.store)?;
        if !self.find_invalid_post_compilation_constraints().is_empty() {
            return Ok(false);
        }
        flow::backward_flow(&mut self.store)?;
        Ok(true)
    }

    fn find_invalid_pre_compilation_constraints(&self) -> Vec<T> {
        critical_path::invalid_pre_compilation_constraints(
            self.store.edges().map(|edge| &edge.content),
        )
    }

    fn find_invalid_post_compilation_constraints(&self) -> Vec<T> {
        critical_path::invalid_post_compilation_constraints(
            self.store.edges().map(|edge| &edge.content),
        )
    }

    fn cyclomatic_complexity(&self) -> i32 {
        self.store.cyclomatic_complexity()
    }

    fn to_graph(&self) -> Self::Snapshot {
        self.store.to_graph()
    }

    fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    fn node_count(&self) -> usize {
        self.store.node_count()
    }
}
