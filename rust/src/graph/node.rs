//! Nodes, edges and immutable graph snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role of a node within its graph.
///
/// Transitions are total functions of the current type and the adjacency
/// left after the change, so they can be checked in isolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Outgoing edges only.
    Start,
    /// Both incoming and outgoing edges.
    Normal,
    /// Incoming edges only.
    End,
    /// No edges at all.
    Isolated,
}

impl NodeType {
    /// Type for a node with the given adjacency.
    pub fn from_adjacency(has_incoming: bool, has_outgoing: bool) -> Self {
        match (has_incoming, has_outgoing) {
            (false, false) => NodeType::Isolated,
            (false, true) => NodeType::Start,
            (true, false) => NodeType::End,
            (true, true) => NodeType::Normal,
        }
    }

    pub fn has_incoming(self) -> bool {
        matches!(self, NodeType::Normal | NodeType::End)
    }

    pub fn has_outgoing(self) -> bool {
        matches!(self, NodeType::Normal | NodeType::Start)
    }

    pub fn on_incoming_added(self) -> Self {
        Self::from_adjacency(true, self.has_outgoing())
    }

    pub fn on_outgoing_added(self) -> Self {
        Self::from_adjacency(self.has_incoming(), true)
    }

    pub fn on_incoming_removed(self, remaining: usize) -> Self {
        if remaining > 0 {
            return self;
        }
        Self::from_adjacency(false, self.has_outgoing())
    }

    pub fn on_outgoing_removed(self, remaining: usize) -> Self {
        if remaining > 0 {
            return self;
        }
        Self::from_adjacency(self.has_incoming(), false)
    }
}

/// A node with its content and adjacency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>, N: Deserialize<'de>"))]
pub struct Node<T, N> {
    pub id: T,
    pub node_type: NodeType,
    pub content: N,
    pub incoming_edges: BTreeSet<T>,
    pub outgoing_edges: BTreeSet<T>,
}

impl<T: Ord, N> Node<T, N> {
    pub fn new(id: T, node_type: NodeType, content: N) -> Self {
        Self {
            id,
            node_type,
            content,
            incoming_edges: BTreeSet::new(),
            outgoing_edges: BTreeSet::new(),
        }
    }

    pub fn is_unconnected(&self) -> bool {
        self.incoming_edges.is_empty() && self.outgoing_edges.is_empty()
    }
}

/// An edge with its content. Tail and head live in the store's side tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge<T, E> {
    pub id: T,
    pub content: E,
}

impl<T, E> Edge<T, E> {
    pub fn new(id: T, content: E) -> Self {
        Self { id, content }
    }
}

/// Immutable snapshot of a builder's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Ord + Deserialize<'de>, E: Deserialize<'de>, N: Deserialize<'de>"))]
pub struct Graph<T, E, N> {
    pub edges: Vec<Edge<T, E>>,
    pub nodes: Vec<Node<T, N>>,
}

impl<T, E, N> Graph<T, E, N> {
    pub fn new(edges: Vec<Edge<T, E>>, nodes: Vec<Node<T, N>>) -> Self {
        Self { edges, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [NodeType; 4] = [
        NodeType::Start,
        NodeType::Normal,
        NodeType::End,
        NodeType::Isolated,
    ];

    #[test]
    fn test_incoming_added() {
        assert_eq!(NodeType::Isolated.on_incoming_added(), NodeType::End);
        assert_eq!(NodeType::Start.on_incoming_added(), NodeType::Normal);
        assert_eq!(NodeType::End.on_incoming_added(), NodeType::End);
        assert_eq!(NodeType::Normal.on_incoming_added(), NodeType::Normal);
    }

    #[test]
    fn test_outgoing_added() {
        assert_eq!(NodeType::Isolated.on_outgoing_added(), NodeType::Start);
        assert_eq!(NodeType::End.on_outgoing_added(), NodeType::Normal);
        assert_eq!(NodeType::Start.on_outgoing_added(), NodeType::Start);
        assert_eq!(NodeType::Normal.on_outgoing_added(), NodeType::Normal);
    }

    #[test]
    fn test_removal_demotes_only_when_empty() {
        for node_type in ALL {
            assert_eq!(node_type.on_incoming_removed(2), node_type);
            assert_eq!(node_type.on_outgoing_removed(1), node_type);
        }
        assert_eq!(NodeType::Normal.on_incoming_removed(0), NodeType::Start);
        assert_eq!(NodeType::End.on_incoming_removed(0), NodeType::Isolated);
        assert_eq!(NodeType::Normal.on_outgoing_removed(0), NodeType::End);
        assert_eq!(NodeType::Start.on_outgoing_removed(0), NodeType::Isolated);
    }

    #[test]
    fn test_add_then_remove_round_trips() {
        for node_type in ALL {
            let incoming = node_type.on_incoming_added();
            if !node_type.has_incoming() {
                assert_eq!(incoming.on_incoming_removed(0), node_type);
            }
            let outgoing = node_type.on_outgoing_added();
            if !node_type.has_outgoing() {
                assert_eq!(outgoing.on_outgoing_removed(0), node_type);
            }
        }
    }
}
