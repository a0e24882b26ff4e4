//! Id-keyed graph storage shared by the vertex and arrow builders.

pub mod cycles;
mod node;
mod store;

pub use node::{Edge, Graph, Node, NodeType};
pub use store::{have_overlap, GraphStore, NodeTyping};
