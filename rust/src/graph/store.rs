//! Id-keyed node/edge arena shared by both graph representations.
//!
//! Nodes and edges only refer to each other by id. The tail and head of each
//! edge live in two side tables that are kept in step with the adjacency sets
//! of the nodes; `verify_bookkeeping` checks that invariant.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace};

use crate::error::{GraphError, Result};
use crate::sequence::SequentialId;

use super::node::{Edge, Graph, Node, NodeType};

/// How node types follow adjacency changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeTyping {
    /// Types track adjacency; a node waiting on a missing dependency counts
    /// as having an incoming edge.
    Adjacency,
    /// Types are fixed when a node is created.
    Fixed,
}

/// Returns true if the two sets share at least one member.
pub fn have_overlap<T: Ord>(left: &BTreeSet<T>, right: &BTreeSet<T>) -> bool {
    left.intersection(right).next().is_some()
}

/// Owner of every node and edge of one graph.
#[derive(Clone, Debug)]
pub struct GraphStore<T, E, N> {
    typing: NodeTyping,
    edges: BTreeMap<T, Edge<T, E>>,
    nodes: BTreeMap<T, Node<T, N>>,
    edge_tails: BTreeMap<T, T>,
    edge_heads: BTreeMap<T, T>,
    /// Missing dependency id -> nodes waiting for it.
    unsatisfied_successors: BTreeMap<T, BTreeSet<T>>,
    /// Nodes whose type never changes.
    pinned: BTreeSet<T>,
}

impl<T: SequentialId, E: Clone, N: Clone> GraphStore<T, E, N> {
    pub fn new(typing: NodeTyping) -> Self {
        Self {
            typing,
            edges: BTreeMap::new(),
            nodes: BTreeMap::new(),
            edge_tails: BTreeMap::new(),
            edge_heads: BTreeMap::new(),
            unsatisfied_successors: BTreeMap::new(),
            pinned: BTreeSet::new(),
        }
    }

    pub fn edge(&self, id: T) -> Option<&Edge<T, E>> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: T) -> Option<&mut Edge<T, E>> {
        self.edges.get_mut(&id)
    }

    pub fn node(&self, id: T) -> Option<&Node<T, N>> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: T) -> Option<&mut Node<T, N>> {
        self.nodes.get_mut(&id)
    }

    pub fn contains_edge(&self, id: T) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn contains_node(&self, id: T) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge<T, E>> {
        self.edges.values()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge<T, E>> {
        self.edges.values_mut()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node<T, N>> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node<T, N>> {
        self.nodes.values_mut()
    }

    pub fn edge_ids(&self) -> Vec<T> {
        self.edges.keys().copied().collect()
    }

    pub fn node_ids(&self) -> Vec<T> {
        self.nodes.keys().copied().collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tail_of(&self, edge_id: T) -> Result<T> {
        self.edge_tails
            .get(&edge_id)
            .copied()
            .ok_or_else(|| GraphError::edge_not_found(edge_id))
    }

    pub fn head_of(&self, edge_id: T) -> Result<T> {
        self.edge_heads
            .get(&edge_id)
            .copied()
            .ok_or_else(|| GraphError::edge_not_found(edge_id))
    }

    pub fn node_ref(&self, id: T) -> Result<&Node<T, N>> {
        self.nodes.get(&id).ok_or_else(|| GraphError::node_not_found(id))
    }

    fn node_ref_mut(&mut self, id: T) -> Result<&mut Node<T, N>> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    fn retypes(&self, node_id: T) -> bool {
        self.typing == NodeTyping::Adjacency && !self.pinned.contains(&node_id)
    }

    /// Freeze a node's type (arrow graph start and end nodes).
    pub fn pin_node(&mut self, id: T) {
        self.pinned.insert(id);
    }

    pub fn insert_node(&mut self, node: Node<T, N>) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::InvariantViolation(format!(
                "node {:?} already exists",
                node.id
            )));
        }
        trace!(node = ?node.id, node_type = ?node.node_type, "insert node");
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Remove a node that has no edges left.
    pub fn remove_node(&mut self, id: T) -> Result<Node<T, N>> {
        let connected = !self.node_ref(id)?.is_unconnected();
        if connected {
            return Err(GraphError::InvariantViolation(format!(
                "node {:?} still has edges",
                id
            )));
        }
        self.forget_waiting_node(id);
        self.pinned.remove(&id);
        trace!(node = ?id, "remove node");
        self.nodes
            .remove(&id)
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    pub fn insert_edge(&mut self, edge: Edge<T, E>, tail: T, head: T) -> Result<()> {
        let id = edge.id;
        if self.edges.contains_key(&id) {
            return Err(GraphError::InvariantViolation(format!(
                "edge {:?} already exists",
                id
            )));
        }
        if tail == head {
            return Err(GraphError::InvariantViolation(format!(
                "edge {:?} would loop on node {:?}",
                id, tail
            )));
        }
        self.node_ref(head)?;
        let retype_tail = self.retypes(tail);
        let retype_head = self.retypes(head);

        let tail_node = self.node_ref_mut(tail)?;
        tail_node.outgoing_edges.insert(id);
        if retype_tail {
            tail_node.node_type = tail_node.node_type.on_outgoing_added();
        }
        let head_node = self.node_ref_mut(head)?;
        head_node.incoming_edges.insert(id);
        if retype_head {
            head_node.node_type = head_node.node_type.on_incoming_added();
        }

        self.edge_tails.insert(id, tail);
        self.edge_heads.insert(id, head);
        self.edges.insert(id, edge);
        trace!(edge = ?id, tail = ?tail, head = ?head, "insert edge");
        Ok(())
    }

    pub fn remove_edge(&mut self, id: T) -> Result<Edge<T, E>> {
        let tail = self.tail_of(id)?;
        let head = self.head_of(id)?;
        let retype_tail = self.retypes(tail);
        let retype_head = self.retypes(head);
        let head_waiting = usize::from(self.is_waiting(head));

        let tail_node = self.node_ref_mut(tail)?;
        tail_node.outgoing_edges.remove(&id);
        if retype_tail {
            let remaining = tail_node.outgoing_edges.len();
            tail_node.node_type = tail_node.node_type.on_outgoing_removed(remaining);
        }
        let head_node = self.node_ref_mut(head)?;
        head_node.incoming_edges.remove(&id);
        if retype_head {
            let remaining = head_node.incoming_edges.len() + head_waiting;
            head_node.node_type = head_node.node_type.on_incoming_removed(remaining);
        }

        self.edge_tails.remove(&id);
        self.edge_heads.remove(&id);
        trace!(edge = ?id, tail = ?tail, head = ?head, "remove edge");
        self.edges
            .remove(&id)
            .ok_or_else(|| GraphError::edge_not_found(id))
    }

    /// Move an edge's tail without any cleanup. Returns the old tail.
    pub fn repoint_edge_tail(&mut self, edge_id: T, new_tail: T) -> Result<T> {
        let old_tail = self.tail_of(edge_id)?;
        if old_tail == new_tail {
            return Ok(old_tail);
        }
        if self.head_of(edge_id)? == new_tail {
            return Err(GraphError::InvariantViolation(format!(
                "edge {:?} would loop on node {:?}",
                edge_id, new_tail
            )));
        }
        self.node_ref(new_tail)?;
        let retype_old = self.retypes(old_tail);
        let retype_new = self.retypes(new_tail);

        let old_node = self.node_ref_mut(old_tail)?;
        old_node.outgoing_edges.remove(&edge_id);
        if retype_old {
            let remaining = old_node.outgoing_edges.len();
            old_node.node_type = old_node.node_type.on_outgoing_removed(remaining);
        }
        let new_node = self.node_ref_mut(new_tail)?;
        new_node.outgoing_edges.insert(edge_id);
        if retype_new {
            new_node.node_type = new_node.node_type.on_outgoing_added();
        }
        self.edge_tails.insert(edge_id, new_tail);
        Ok(old_tail)
    }

    /// Move an edge's head without any cleanup. Returns the old head.
    pub fn repoint_edge_head(&mut self, edge_id: T, new_head: T) -> Result<T> {
        let old_head = self.head_of(edge_id)?;
        if old_head == new_head {
            return Ok(old_head);
        }
        if self.tail_of(edge_id)? == new_head {
            return Err(GraphError::InvariantViolation(format!(
                "edge {:?} would loop on node {:?}",
                edge_id, new_head
            )));
        }
        self.node_ref(new_head)?;
        let retype_old = self.retypes(old_head);
        let retype_new = self.retypes(new_head);
        let old_waiting = usize::from(self.is_waiting(old_head));

        let old_node = self.node_ref_mut(old_head)?;
        old_node.incoming_edges.remove(&edge_id);
        if retype_old {
            let remaining = old_node.incoming_edges.len() + old_waiting;
            old_node.node_type = old_node.node_type.on_incoming_removed(remaining);
        }
        let new_node = self.node_ref_mut(new_head)?;
        new_node.incoming_edges.insert(edge_id);
        if retype_new {
            new_node.node_type = new_node.node_type.on_incoming_added();
        }
        self.edge_heads.insert(edge_id, new_head);
        Ok(old_head)
    }

    /// Move an edge's tail. If the old tail is an ordinary node left with no
    /// outgoing edges, it is deleted and its incoming edges are spliced onto
    /// the new tail.
    pub fn change_edge_tail(&mut self, edge_id: T, new_tail: T) -> Result<()> {
        let old_tail = self.repoint_edge_tail(edge_id, new_tail)?;
        if old_tail == new_tail || self.pinned.contains(&old_tail) {
            return Ok(());
        }
        let old_node = self.node_ref(old_tail)?;
        if !old_node.outgoing_edges.is_empty() || old_node.node_type != NodeType::Normal {
            return Ok(());
        }
        let stranded: Vec<T> = old_node.incoming_edges.iter().copied().collect();
        for incoming in stranded {
            self.repoint_edge_head(incoming, new_tail)?;
        }
        self.replace_waiting_node(old_tail, new_tail);
        self.remove_node(old_tail)?;
        debug!(node = ?old_tail, into = ?new_tail, "spliced vacated tail node");
        Ok(())
    }

    /// Move an edge's head. If the old head is an ordinary node left with no
    /// incoming edges, it is deleted and its outgoing edges are spliced onto
    /// the new head.
    pub fn change_edge_head(&mut self, edge_id: T, new_head: T) -> Result<()> {
        let old_head = self.repoint_edge_head(edge_id, new_head)?;
        if old_head == new_head || self.pinned.contains(&old_head) {
            return Ok(());
        }
        let old_node = self.node_ref(old_head)?;
        if !old_node.incoming_edges.is_empty() || old_node.node_type != NodeType::Normal {
            return Ok(());
        }
        let stranded: Vec<T> = old_node.outgoing_edges.iter().copied().collect();
        for outgoing in stranded {
            self.repoint_edge_tail(outgoing, new_head)?;
        }
        self.replace_waiting_node(old_head, new_head);
        self.remove_node(old_head)?;
        debug!(node = ?old_head, into = ?new_head, "spliced vacated head node");
        Ok(())
    }

    pub fn incoming_tail_nodes(&self, node_id: T) -> Result<BTreeSet<T>> {
        self.node_ref(node_id)?
            .incoming_edges
            .iter()
            .map(|&edge_id| self.tail_of(edge_id))
            .collect()
    }

    pub fn outgoing_head_nodes(&self, node_id: T) -> Result<BTreeSet<T>> {
        self.node_ref(node_id)?
            .outgoing_edges
            .iter()
            .map(|&edge_id| self.head_of(edge_id))
            .collect()
    }

    /// True if more than one edge runs from `tail` to `head`.
    pub fn share_more_than_one_edge(&self, tail: T, head: T) -> bool {
        match (self.nodes.get(&tail), self.nodes.get(&head)) {
            (Some(tail_node), Some(head_node)) => {
                tail_node
                    .outgoing_edges
                    .intersection(&head_node.incoming_edges)
                    .count()
                    > 1
            }
            _ => false,
        }
    }

    // Unsatisfied successors

    pub fn add_unsatisfied_successor(&mut self, dependency: T, node_id: T) -> Result<()> {
        let retype = self.retypes(node_id);
        let node = self.node_ref_mut(node_id)?;
        if retype {
            node.node_type = node.node_type.on_incoming_added();
        }
        self.unsatisfied_successors
            .entry(dependency)
            .or_default()
            .insert(node_id);
        Ok(())
    }

    /// Register a wait read back from a snapshot, whose node types already
    /// account for it.
    pub fn restore_unsatisfied_successor(&mut self, dependency: T, node_id: T) -> Result<()> {
        self.node_ref(node_id)?;
        self.unsatisfied_successors
            .entry(dependency)
            .or_default()
            .insert(node_id);
        Ok(())
    }

    /// Stop `node_id` waiting for `dependency`. Returns false if it was not.
    pub fn remove_unsatisfied_successor(&mut self, dependency: T, node_id: T) -> bool {
        let Some(waiting) = self.unsatisfied_successors.get_mut(&dependency) else {
            return false;
        };
        if !waiting.remove(&node_id) {
            return false;
        }
        if waiting.is_empty() {
            self.unsatisfied_successors.remove(&dependency);
        }
        self.refresh_incoming_role(node_id);
        true
    }

    /// Consume the waiting set for a dependency that has just been added.
    pub fn take_unsatisfied_successors(&mut self, dependency: T) -> Option<BTreeSet<T>> {
        self.unsatisfied_successors.remove(&dependency)
    }

    pub fn unsatisfied_successors(&self) -> &BTreeMap<T, BTreeSet<T>> {
        &self.unsatisfied_successors
    }

    pub fn is_waiting(&self, node_id: T) -> bool {
        self.unsatisfied_successors
            .values()
            .any(|waiting| waiting.contains(&node_id))
    }

    /// Missing dependencies a node is waiting for.
    pub fn waiting_dependencies(&self, node_id: T) -> BTreeSet<T> {
        self.unsatisfied_successors
            .iter()
            .filter(|(_, waiting)| waiting.contains(&node_id))
            .map(|(&dependency, _)| dependency)
            .collect()
    }

    pub fn replace_waiting_node(&mut self, old: T, new: T) {
        for waiting in self.unsatisfied_successors.values_mut() {
            if waiting.remove(&old) {
                waiting.insert(new);
            }
        }
    }

    pub fn forget_waiting_node(&mut self, node_id: T) {
        self.unsatisfied_successors.retain(|_, waiting| {
            waiting.remove(&node_id);
            !waiting.is_empty()
        });
    }

    pub fn missing_dependencies(&self) -> BTreeSet<T> {
        self.unsatisfied_successors.keys().copied().collect()
    }

    pub fn all_dependencies_satisfied(&self) -> bool {
        self.unsatisfied_successors.is_empty()
    }

    fn refresh_incoming_role(&mut self, node_id: T) {
        if !self.retypes(node_id) {
            return;
        }
        let waiting = usize::from(self.is_waiting(node_id));
        if let Some(node) = self.nodes.get_mut(&node_id) {
            let remaining = node.incoming_edges.len() + waiting;
            node.node_type = node.node_type.on_incoming_removed(remaining);
        }
    }

    // Whole-graph algorithms

    /// Kahn ordering of nodes, or `None` if the graph has a cycle.
    pub fn topological_node_order(&self) -> Option<Vec<T>> {
        let mut in_degree: FxHashMap<T, usize> = self
            .nodes
            .values()
            .map(|node| (node.id, node.incoming_edges.len()))
            .collect();
        let mut queue: VecDeque<T> = self
            .nodes
            .values()
            .filter(|node| node.incoming_edges.is_empty())
            .map(|node| node.id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node_id) = queue.pop_front() {
            order.push(node_id);
            let node = self.nodes.get(&node_id)?;
            for edge_id in &node.outgoing_edges {
                let head = self.edge_heads.get(edge_id)?;
                let degree = in_degree.get_mut(head)?;
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*head);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Every node's transitive set of ancestor nodes, or `None` if cyclic.
    ///
    /// Nodes without incoming edges have an empty set.
    pub fn ancestor_nodes_lookup(&self) -> Option<FxHashMap<T, BTreeSet<T>>> {
        let order = self.topological_node_order()?;
        let mut lookup: FxHashMap<T, BTreeSet<T>> =
            FxHashMap::with_capacity_and_hasher(order.len(), Default::default());

        for node_id in order {
            let node = self.nodes.get(&node_id)?;
            let mut ancestors = BTreeSet::new();
            for edge_id in &node.incoming_edges {
                let tail = *self.edge_tails.get(edge_id)?;
                ancestors.insert(tail);
                if let Some(tail_ancestors) = lookup.get(&tail) {
                    ancestors.extend(tail_ancestors.iter().copied());
                }
            }
            lookup.insert(node_id, ancestors);
        }
        Some(lookup)
    }

    /// Incoming edges made redundant by a longer path, found by walking back
    /// from every end node. An incoming edge is redundant when its tail is an
    /// ancestor of another incoming edge's tail. Only edges accepted by
    /// `is_removable` are returned.
    pub fn transitively_redundant_edges<F>(
        &self,
        ancestors: &FxHashMap<T, BTreeSet<T>>,
        is_removable: F,
    ) -> Vec<T>
    where
        F: Fn(&Edge<T, E>) -> bool,
    {
        let mut redundant = Vec::new();
        let mut visited: FxHashSet<T> = FxHashSet::default();
        let mut worklist: Vec<T> = self
            .nodes
            .values()
            .filter(|node| node.outgoing_edges.is_empty())
            .map(|node| node.id)
            .collect();

        while let Some(node_id) = worklist.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            let incoming: Vec<(T, T)> = node
                .incoming_edges
                .iter()
                .filter_map(|&edge_id| self.edge_tails.get(&edge_id).map(|&tail| (edge_id, tail)))
                .collect();

            for &(edge_id, tail) in &incoming {
                let implied = incoming.iter().any(|&(_, other_tail)| {
                    other_tail != tail
                        && ancestors
                            .get(&other_tail)
                            .is_some_and(|other_ancestors| other_ancestors.contains(&tail))
                });
                if implied && self.edges.get(&edge_id).is_some_and(&is_removable) {
                    redundant.push(edge_id);
                }
                if !visited.contains(&tail) {
                    worklist.push(tail);
                }
            }
        }

        redundant.sort();
        redundant.dedup();
        redundant
    }

    /// Number of weakly connected components.
    pub fn weakly_connected_components(&self) -> usize {
        let mut seen: FxHashSet<T> = FxHashSet::default();
        let mut components = 0;

        for &start in self.nodes.keys() {
            if !seen.insert(start) {
                continue;
            }
            components += 1;
            let mut stack = vec![start];
            while let Some(node_id) = stack.pop() {
                let Some(node) = self.nodes.get(&node_id) else {
                    continue;
                };
                let neighbours = node
                    .outgoing_edges
                    .iter()
                    .filter_map(|edge_id| self.edge_heads.get(edge_id))
                    .chain(
                        node.incoming_edges
                            .iter()
                            .filter_map(|edge_id| self.edge_tails.get(edge_id)),
                    );
                for &neighbour in neighbours {
                    if seen.insert(neighbour) {
                        stack.push(neighbour);
                    }
                }
            }
        }
        components
    }

    /// McCabe complexity: edges - nodes + 2 * components.
    pub fn cyclomatic_complexity(&self) -> i32 {
        if self.nodes.is_empty() {
            return 0;
        }
        let edges = self.edges.len() as i32;
        let nodes = self.nodes.len() as i32;
        let components = self.weakly_connected_components() as i32;
        edges - nodes + 2 * components
    }

    /// Check that the edge side tables agree with node adjacency.
    pub fn verify_bookkeeping(&self) -> Result<()> {
        let edge_count = self.edges.len();
        if self.edge_tails.len() != edge_count || self.edge_heads.len() != edge_count {
            return Err(GraphError::InvariantViolation(format!(
                "{} edges but {} tails and {} heads",
                edge_count,
                self.edge_tails.len(),
                self.edge_heads.len()
            )));
        }
        for (&edge_id, &tail) in &self.edge_tails {
            if !self.node_ref(tail)?.outgoing_edges.contains(&edge_id) {
                return Err(GraphError::InvariantViolation(format!(
                    "edge {:?} missing from outgoing edges of tail {:?}",
                    edge_id, tail
                )));
            }
        }
        for (&edge_id, &head) in &self.edge_heads {
            if !self.node_ref(head)?.incoming_edges.contains(&edge_id) {
                return Err(GraphError::InvariantViolation(format!(
                    "edge {:?} missing from incoming edges of head {:?}",
                    edge_id, head
                )));
            }
        }
        for node in self.nodes.values() {
            for edge_id in &node.outgoing_edges {
                if self.edge_tails.get(edge_id) != Some(&node.id) {
                    return Err(GraphError::InvariantViolation(format!(
                        "node {:?} lists edge {:?} as outgoing but is not its tail",
                        node.id, edge_id
                    )));
                }
            }
            for edge_id in &node.incoming_edges {
                if self.edge_heads.get(edge_id) != Some(&node.id) {
                    return Err(GraphError::InvariantViolation(format!(
                        "node {:?} lists edge {:?} as incoming but is not its head",
                        node.id, edge_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deep copy of every edge and node, ordered by id.
    pub fn to_graph(&self) -> Graph<T, E, N> {
        Graph::new(
            self.edges.values().cloned().collect(),
            self.nodes.values().cloned().collect(),
        )
    }

    /// Rebuild a store from a snapshot, rejecting inconsistent adjacency.
    pub fn from_graph(graph: Graph<T, E, N>, typing: NodeTyping) -> Result<Self> {
        let mut store = Self::new(typing);

        for edge in graph.edges {
            let id = edge.id;
            if store.edges.insert(id, edge).is_some() {
                return Err(GraphError::InvalidSnapshot(format!(
                    "duplicate edge id {:?}",
                    id
                )));
            }
        }

        for node in graph.nodes {
            let id = node.id;
            if store.nodes.contains_key(&id) {
                return Err(GraphError::InvalidSnapshot(format!(
                    "duplicate node id {:?}",
                    id
                )));
            }
            for &edge_id in &node.outgoing_edges {
                if !store.edges.contains_key(&edge_id) {
                    return Err(GraphError::InvalidSnapshot(format!(
                        "node {:?} references unknown outgoing edge {:?}",
                        id, edge_id
                    )));
                }
                if store.edge_tails.insert(edge_id, id).is_some() {
                    return Err(GraphError::InvalidSnapshot(format!(
                        "edge {:?} has more than one tail node",
                        edge_id
                    )));
                }
            }
            for &edge_id in &node.incoming_edges {
                if !store.edges.contains_key(&edge_id) {
                    return Err(GraphError::InvalidSnapshot(format!(
                        "node {:?} references unknown incoming edge {:?}",
                        id, edge_id
                    )));
                }
                if store.edge_heads.insert(edge_id, id).is_some() {
                    return Err(GraphError::InvalidSnapshot(format!(
                        "edge {:?} has more than one head node",
                        edge_id
                    )));
                }
            }
            store.nodes.insert(id, node);
        }

        let edge_count = store.edges.len();
        if store.edge_tails.len() != edge_count || store.edge_heads.len() != edge_count {
            return Err(GraphError::InvalidSnapshot(format!(
                "{} edges but {} referenced as outgoing and {} as incoming",
                edge_count,
                store.edge_tails.len(),
                store.edge_heads.len()
            )));
        }
        Ok(store)
    }
}
