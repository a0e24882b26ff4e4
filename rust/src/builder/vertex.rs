//! Activity-on-node graph builder.
//!
//! Every activity is a node and every dependency is an edge from the
//! dependency to the dependent. Node ids are activity ids; edge ids come from
//! the caller's generator. No dummies are ever needed.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::critical_path::{self, vertex as flow};
use crate::error::{GraphError, Result};
use crate::graph::cycles::{strong_circular_dependencies, strongly_connected_components};
use crate::graph::{Edge, Graph, GraphStore, Node, NodeType, NodeTyping};
use crate::models::{Activity, CircularDependency, Event};
use crate::sequence::{IdGenerator, SequentialId};

use super::ActivityGraphBuilder;

/// Snapshot of a vertex graph: events on edges, activities on nodes.
pub type VertexGraph<T, R> = Graph<T, Event<T>, Activity<T, R>>;

#[derive(Clone)]
pub struct VertexGraphBuilder<T: SequentialId, R> {
    store: GraphStore<T, Event<T>, Activity<T, R>>,
    edge_id_generator: IdGenerator<T>,
}

impl<T: SequentialId, R: Clone> fmt::Debug for VertexGraphBuilder<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexGraphBuilder")
            .field("edges", &self.store.edge_count())
            .field("nodes", &self.store.node_count())
            .finish_non_exhaustive()
    }
}

impl<T: SequentialId, R: Clone> VertexGraphBuilder<T, R> {
    pub fn new(edge_id_generator: IdGenerator<T>) -> Self {
        Self {
            store: GraphStore::new(NodeTyping::Adjacency),
            edge_id_generator,
        }
    }

    /// Rebuild a builder from a snapshot.
    ///
    /// Node types must match adjacency, node and edge ids must match their
    /// content ids, and any graph with edges needs at least one Start and one
    /// End node.
    pub fn from_graph(graph: VertexGraph<T, R>, edge_id_generator: IdGenerator<T>) -> Result<Self> {
        let mut store = GraphStore::from_graph(graph, NodeTyping::Adjacency)?;

        // Authored dependencies with no node are still being waited for
        let waits: Vec<(T, T)> = store
            .nodes()
            .flat_map(|node| {
                node.content
                    .dependencies
                    .iter()
                    .map(move |&dependency| (dependency, node.id))
            })
            .filter(|(dependency, _)| !store.contains_node(*dependency))
            .collect();
        for (dependency, node_id) in waits {
            store.restore_unsatisfied_successor(dependency, node_id)?;
        }

        for node in store.nodes() {
            if node.content.id != node.id {
                return Err(GraphError::InvalidSnapshot(format!(
                    "node {:?} carries activity {:?}",
                    node.id, node.content.id
                )));
            }
            let expected = NodeType::from_adjacency(
                !node.incoming_edges.is_empty() || store.is_waiting(node.id),
                !node.outgoing_edges.is_empty(),
            );
            if node.node_type != expected {
                return Err(GraphError::InvalidSnapshot(format!(
                    "node {:?} is {:?} but its edges make it {:?}",
                    node.id, node.node_type, expected
                )));
            }
        }
        for edge in store.edges() {
            if edge.content.id != edge.id {
                return Err(GraphError::InvalidSnapshot(format!(
                    "edge {:?} carries event {:?}",
                    edge.id, edge.content.id
                )));
            }
        }
        if store.edge_count() > 0 {
            let starts = store
                .nodes()
                .filter(|node| node.node_type == NodeType::Start)
                .count();
            let ends = store
                .nodes()
                .filter(|node| node.node_type == NodeType::End)
                .count();
            if starts == 0 || ends == 0 {
                return Err(GraphError::InvalidSnapshot(format!(
                    "connected graph has {} start and {} end nodes",
                    starts, ends
                )));
            }
        }

        Ok(Self {
            store,
            edge_id_generator,
        })
    }

    pub fn node(&self, id: T) -> Option<&Node<T, Activity<T, R>>> {
        self.store.node(id)
    }

    /// True if an edge already runs from `tail` to `head`.
    fn is_linked(&self, tail: T, head: T) -> bool {
        match (self.store.node(tail), self.store.node(head)) {
            (Some(tail_node), Some(head_node)) => !tail_node
                .outgoing_edges
                .is_disjoint(&head_node.incoming_edges),
            _ => false,
        }
    }

    fn link(&mut self, dependency: T, dependent: T) -> Result<()> {
        if self.is_linked(dependency, dependent) {
            return Ok(());
        }
        let edge_id = (self.edge_id_generator)();
        self.store
            .insert_edge(Edge::new(edge_id, Event::new(edge_id)), dependency, dependent)?;
        debug!(edge = ?edge_id, dependency = ?dependency, dependent = ?dependent, "linked activities");
        Ok(())
    }

    fn unlink(&mut self, dependency: T, dependent: T) -> Result<bool> {
        let (Some(tail_node), Some(head_node)) = (self.store.node(dependency), self.store.node(dependent))
        else {
            return Ok(false);
        };
        let shared: Vec<T> = tail_node
            .outgoing_edges
            .intersection(&head_node.incoming_edges)
            .copied()
            .collect();
        for edge_id in &shared {
            self.store.remove_edge(*edge_id)?;
        }
        Ok(!shared.is_empty())
    }
}

impl<T: SequentialId, R: Clone> ActivityGraphBuilder<T, R> for VertexGraphBuilder<T, R> {
    type Snapshot = VertexGraph<T, R>;

    fn add_activity(
        &mut self,
        mut activity: Activity<T, R>,
        dependencies: &BTreeSet<T>,
    ) -> Result<bool> {
        let id = activity.id;
        if self.store.contains_node(id) || dependencies.contains(&id) {
            debug!(activity = ?id, "rejected activity");
            return Ok(false);
        }
        activity.dependencies = dependencies.clone();

        self.store
            .insert_node(Node::new(id, NodeType::Isolated, activity))?;
        for &dependency in dependencies {
            if self.store.contains_node(dependency) {
                self.link(dependency, id)?;
            } else {
                self.store.add_unsatisfied_successor(dependency, id)?;
            }
        }

        // Activities added earlier may have been waiting for this one
        if let Some(waiting) = self.store.take_unsatisfied_successors(id) {
            for successor in waiting {
                self.link(id, successor)?;
            }
        }
        debug!(activity = ?id, dependencies = dependencies.len(), "added activity");
        Ok(true)
    }

    fn remove_activity(&mut self, id: T) -> Result<bool> {
        let Some(node) = self.store.node(id) else {
            return Ok(false);
        };
        if !node.content.can_be_removed {
            return Ok(false);
        }
        let incident: Vec<T> = node
            .incoming_edges
            .iter()
            .chain(node.outgoing_edges.iter())
            .copied()
            .collect();
        // Dependents may have lost their edge to a transitive reduction
        for node in self.store.nodes_mut() {
            node.content.dependencies.remove(&id);
        }
        for edge_id in incident {
            self.store.remove_edge(edge_id)?;
        }
        self.store.remove_node(id)?;
        debug!(activity = ?id, "removed activity");
        Ok(true)
    }

    fn add_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>) -> Result<bool> {
        if !self.store.contains_node(id) || dependencies.contains(&id) {
            return Ok(false);
        }
        for &dependency in dependencies {
            if self.store.contains_node(dependency) {
                self.link(dependency, id)?;
            } else {
                self.store.add_unsatisfied_successor(dependency, id)?;
            }
        }
        if let Some(node) = self.store.node_mut(id) {
            node.content.dependencies.extend(dependencies.iter().copied());
        }
        Ok(true)
    }

    fn remove_activity_dependencies(&mut self, id: T, dependencies: &BTreeSet<T>) -> Result<bool> {
        if !self.store.contains_node(id) {
            return Ok(false);
        }
        for &dependency in dependencies {
            if !self.store.remove_unsatisfied_successor(dependency, id) {
                self.unlink(dependency, id)?;
            }
        }
        if let Some(node) = self.store.node_mut(id) {
            node.content
                .dependencies
                .retain(|dependency| !dependencies.contains(dependency));
        }
        Ok(true)
    }

    fn activity(&self, id: T) -> Option<&Activity<T, R>> {
        self.store.node(id).map(|node| &node.content)
    }

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R>> {
        self.store.node_mut(id).map(|node| &mut node.content)
    }

    fn activity_ids(&self) -> Vec<T> {
        self.store.node_ids()
    }

    fn activity_dependency_ids(&self, id: T) -> Option<BTreeSet<T>> {
        self.store.incoming_tail_nodes(id).ok()
    }

    fn waiting_dependency_ids(&self, id: T) -> BTreeSet<T> {
        self.store.waiting_dependencies(id)
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
        strongly_connected_components(self.store.node_ids(), |node_id| {
            self.store
                .incoming_tail_nodes(node_id)
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
        let redundant = self.store.transitively_redundant_edges(&ancestors, |_| true);
        for &edge_id in &redundant {
            self.store.remove_edge(edge_id)?;
        }
        debug!(removed = redundant.len(), "transitive reduction");
        Ok(true)
    }

    fn redirect_edges(&mut self) -> Result<bool> {
        Ok(self.all_dependencies_satisfied())
    }

    fn remove_redundant_edges(&mut self) -> Result<bool> {
        Ok(self.all_dependencies_satisfied())
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
            self.store.nodes().map(|node| &node.content),
        )
    }

    fn find_invalid_post_compilation_constraints(&self) -> Vec<T> {
        critical_path::invalid_post_compilation_constraints(
            self.store.nodes().map(|node| &node.content),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::sequential_generator;

    type Builder = VertexGraphBuilder<i32, i32>;

    fn builder() -> Builder {
        VertexGraphBuilder::new(sequential_generator(1000))
    }

    fn deps(ids: &[i32]) -> BTreeSet<i32> {
        ids.iter().copied().collect()
    }

    fn add(builder: &mut Builder, id: i32, duration: i32, dependencies: &[i32]) {
        assert!(builder
            .add_activity(Activity::new(id, duration), &deps(dependencies))
            .unwrap());
    }

    fn node_type(builder: &Builder, id: i32) -> NodeType {
        builder.node(id).unwrap().node_type
    }

    #[test]
    fn test_single_activity_is_isolated() {
        let mut b = builder();
        add(&mut b, 1, 5, &[]);
        assert_eq!(b.node_count(), 1);
        assert_eq!(b.edge_count(), 0);
        assert_eq!(node_type(&b, 1), NodeType::Isolated);
        assert!(b.all_dependencies_satisfied());
    }

    #[test]
    fn test_duplicate_and_self_dependency_rejected() {
        let mut b = builder();
        add(&mut b, 1, 5, &[]);
        assert!(!b.add_activity(Activity::new(1, 3), &deps(&[])).unwrap());
        assert!(!b.add_activity(Activity::new(2, 3), &deps(&[2])).unwrap());
        assert_eq!(b.node_count(), 1);
    }

    #[test]
    fn test_dependency_promotes_node_types() {
        let mut b = builder();
        add(&mut b, 1, 5, &[]);
        add(&mut b, 2, 3, &[1]);
        add(&mut b, 3, 3, &[2]);
        assert_eq!(node_type(&b, 1), NodeType::Start);
        assert_eq!(node_type(&b, 2), NodeType::Normal);
        assert_eq!(node_type(&b, 3), NodeType::End);
        assert_eq!(b.edge_count(), 2);
        assert_eq!(b.activity_dependency_ids(3), Some(deps(&[2])));
    }

    #[test]
    fn test_missing_dependency_resolves_later() {
        let mut b = builder();
        add(&mut b, 2, 3, &[1]);
        assert!(!b.all_dependencies_satisfied());
        assert_eq!(b.missing_dependencies(), deps(&[1]));
        assert_eq!(node_type(&b, 2), NodeType::End);

        add(&mut b, 1, 5, &[]);
        assert!(b.all_dependencies_satisfied());
        assert_eq!(b.edge_count(), 1);
        assert_eq!(node_type(&b, 1), NodeType::Start);
        assert_eq!(node_type(&b, 2), NodeType::End);
    }

    #[test]
    fn test_remove_activity() {
        let mut b = builder();
        add(&mut b, 1, 5, &[]);
        let mut removable = Activity::new(2, 3);
        removable.can_be_removed = true;
        b.add_activity(removable, &deps(&[1])).unwrap();
        add(&mut b, 3, 3, &[2]);

        assert!(!b.remove_activity(1).unwrap());
        assert!(!b.remove_activity(42).unwrap());
        assert!(b.remove_activity(2).unwrap());

        assert_eq!(b.edge_count(), 0);
        assert_eq!(node_type(&b, 1), NodeType::Isolated);
        assert_eq!(node_type(&b, 3), NodeType::Isolated);
        assert_eq!(b.activity_dependency_ids(3), Some(deps(&[])));
    }

    #[test]
    fn test_remove_waiting_activity_clears_missing() {
        let mut b = builder();
        let mut waiting = Activity::new(2, 3);
        waiting.can_be_removed = true;
        b.add_activity(waiting, &deps(&[1])).unwrap();
        assert!(b.remove_activity(2).unwrap());
        assert!(b.all_dependencies_satisfied());
    }

    #[test]
    fn test_change_dependencies() {
        let mut b = builder();
        add(&mut b, 1, 5, &[]);
        add(&mut b, 2, 5, &[]);
        add(&mut b, 3, 3, &[1]);

        assert!(b.add_activity_dependencies(3, &deps(&[2, 9])).unwrap());
        assert_eq!(b.activity_dependency_ids(3), Some(deps(&[1, 2])));
        assert_eq!(b.missing_dependencies(), deps(&[9]));

        assert!(b.remove_activity_dependencies(3, &deps(&[1, 9])).unwrap());
        assert_eq!(b.activity_dependency_ids(3), Some(deps(&[2])));
        assert!(b.all_dependencies_satisfied());
        assert_eq!(node_type(&b, 1), NodeType::Isolated);
    }

    #[test]
    fn test_strong_circular_dependencies() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        add(&mut b, 2, 1, &[7]);
        add(&mut b, 3, 1, &[]);
        add(&mut b, 4, 1, &[2]);
        add(&mut b, 5, 1, &[1, 2, 3, 8]);
        add(&mut b, 6, 1, &[3]);
        add(&mut b, 7, 1, &[4]);
        add(&mut b, 8, 1, &[9, 6]);
        add(&mut b, 9, 1, &[5]);

        let cycles = b.find_strong_circular_dependencies();
        assert_eq!(
            cycles,
            vec![
                CircularDependency::new([2, 4, 7]),
                CircularDependency::new([5, 8, 9]),
            ]
        );
        assert!(b.ancestor_nodes_lookup().is_none());
        assert!(!b.transitive_reduction().unwrap());
    }

    #[test]
    fn test_transitive_reduction() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        add(&mut b, 2, 1, &[1]);
        add(&mut b, 3, 1, &[1, 2]);
        add(&mut b, 4, 1, &[1, 2, 3]);
        assert_eq!(b.edge_count(), 6);

        assert!(b.transitive_reduction().unwrap());
        assert_eq!(b.edge_count(), 3);
        assert_eq!(b.activity_dependency_ids(4), Some(deps(&[3])));

        let snapshot = b.to_graph();
        assert!(b.transitive_reduction().unwrap());
        assert_eq!(b.to_graph(), snapshot);
    }

    #[test]
    fn test_transitive_reduction_waits_for_missing() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        add(&mut b, 2, 1, &[1, 99]);
        assert!(!b.transitive_reduction().unwrap());
    }

    #[test]
    fn test_critical_path() {
        // 1 (2) -> 2 (3), 3 (1) on its own
        let mut b = builder();
        add(&mut b, 1, 2, &[]);
        add(&mut b, 2, 3, &[1]);
        add(&mut b, 3, 1, &[]);

        assert!(b.calculate_critical_path().unwrap());
        let a1 = b.activity(1).unwrap();
        assert_eq!(a1.earliest_start_time, Some(0));
        assert_eq!(a1.latest_finish_time, Some(2));
        assert_eq!(a1.free_slack, Some(0));
        assert!(a1.is_critical());

        let a2 = b.activity(2).unwrap();
        assert_eq!(a2.earliest_start_time, Some(2));
        assert_eq!(a2.latest_finish_time, Some(5));

        let a3 = b.activity(3).unwrap();
        assert_eq!(a3.earliest_finish_time(), Some(1));
        assert_eq!(a3.latest_finish_time, Some(5));
        assert_eq!(a3.free_slack, Some(4));
        assert_eq!(a3.total_slack(), Some(4));

        // The edge event carries the dependency's finish times
        let event = &b.to_graph().edges[0].content;
        assert_eq!(event.earliest_finish_time, Some(2));
        assert_eq!(event.latest_finish_time, Some(2));
    }

    #[test]
    fn test_critical_path_constraints() {
        let mut b = builder();
        let mut first = Activity::new(1, 2);
        first.minimum_free_slack = Some(3);
        b.add_activity(first, &deps(&[])).unwrap();
        let mut second = Activity::new(2, 2);
        second.minimum_earliest_start_time = Some(1);
        b.add_activity(second, &deps(&[1])).unwrap();

        assert!(b.calculate_critical_path().unwrap());
        let a1 = b.activity(1).unwrap();
        let a2 = b.activity(2).unwrap();
        assert_eq!(a2.earliest_start_time, Some(5));
        assert_eq!(a1.latest_finish_time, Some(2));
        assert_eq!(a1.free_slack, Some(3));
    }

    #[test]
    fn test_critical_path_rejects_invalid_constraints() {
        let mut b = builder();
        let mut late = Activity::new(1, 4);
        late.maximum_latest_finish_time = Some(2);
        b.add_activity(late, &deps(&[])).unwrap();
        assert_eq!(b.find_invalid_pre_compilation_constraints(), vec![1]);
        assert!(!b.calculate_critical_path().unwrap());

        let mut b = builder();
        add(&mut b, 1, 4, &[]);
        let mut deadline = Activity::new(2, 2);
        deadline.maximum_latest_finish_time = Some(5);
        b.add_activity(deadline, &deps(&[1])).unwrap();
        assert!(!b.calculate_critical_path().unwrap());
        assert_eq!(b.find_invalid_post_compilation_constraints(), vec![2]);
    }

    #[test]
    fn test_cycle_stalls_propagation() {
        let mut b = builder();
        add(&mut b, 1, 1, &[2]);
        add(&mut b, 2, 1, &[1]);
        assert!(matches!(
            b.calculate_critical_path(),
            Err(GraphError::CyclicGraph(2))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut b = builder();
        add(&mut b, 1, 2, &[]);
        add(&mut b, 2, 3, &[1]);
        add(&mut b, 3, 1, &[]);
        b.calculate_critical_path().unwrap();

        let snapshot = b.to_graph();
        let rebuilt = Builder::from_graph(snapshot.clone(), sequential_generator(2000)).unwrap();
        assert_eq!(rebuilt.to_graph(), snapshot);
    }

    #[test]
    fn test_snapshot_keeps_missing_dependencies() {
        let mut b = builder();
        add(&mut b, 1, 2, &[]);
        add(&mut b, 2, 3, &[9]);

        let snapshot = b.to_graph();
        let mut rebuilt = Builder::from_graph(snapshot.clone(), sequential_generator(2000)).unwrap();
        assert_eq!(rebuilt.to_graph(), snapshot);
        assert_eq!(rebuilt.missing_dependencies(), deps(&[9]));
        assert_eq!(rebuilt.waiting_dependency_ids(2), deps(&[9]));
        assert!(!rebuilt.transitive_reduction().unwrap());

        add(&mut rebuilt, 9, 1, &[]);
        assert!(rebuilt.all_dependencies_satisfied());
        assert_eq!(rebuilt.activity_dependency_ids(2), Some(deps(&[9])));
        assert_eq!(node_type(&rebuilt, 9), NodeType::Start);
    }

    #[test]
    fn test_authored_dependencies_follow_changes() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        add(&mut b, 2, 1, &[]);
        let mut removable = Activity::new(3, 1);
        removable.can_be_removed = true;
        b.add_activity(removable, &deps(&[])).unwrap();
        add(&mut b, 4, 1, &[1, 3]);

        b.add_activity_dependencies(4, &deps(&[2, 8])).unwrap();
        assert_eq!(b.activity(4).unwrap().dependencies, deps(&[1, 2, 3, 8]));
        b.remove_activity_dependencies(4, &deps(&[1, 8])).unwrap();
        assert_eq!(b.activity(4).unwrap().dependencies, deps(&[2, 3]));
        assert!(b.remove_activity(3).unwrap());
        assert_eq!(b.activity(4).unwrap().dependencies, deps(&[2]));
    }

    #[test]
    fn test_remove_reduced_dependency_leaves_no_wait() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        let mut middle = Activity::new(2, 1);
        middle.can_be_removed = true;
        b.add_activity(middle, &deps(&[1])).unwrap();
        add(&mut b, 3, 1, &[1, 2]);
        assert!(b.transitive_reduction().unwrap());
        assert!(b.remove_activity(2).unwrap());
        assert_eq!(b.activity(3).unwrap().dependencies, deps(&[1]));

        let rebuilt = Builder::from_graph(b.to_graph(), sequential_generator(2000)).unwrap();
        assert!(rebuilt.all_dependencies_satisfied());
    }

    #[test]
    fn test_snapshot_rejects_mistyped_node() {
        let mut b = builder();
        add(&mut b, 1, 2, &[]);
        add(&mut b, 2, 3, &[1]);
        let mut snapshot = b.to_graph();
        snapshot.nodes[0].node_type = NodeType::Normal;

        let err = Builder::from_graph(snapshot, sequential_generator(0)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_cyclomatic_complexity() {
        let mut b = builder();
        add(&mut b, 1, 1, &[]);
        add(&mut b, 2, 1, &[1]);
        add(&mut b, 3, 1, &[1]);
        add(&mut b, 4, 1, &[2, 3]);
        // 4 edges, 4 nodes, 1 component
        assert_eq!(b.cyclomatic_complexity(), 2);
    }
}
