//! Strongly connected components (Tarjan), run without recursion.
//!
//! The detector is representation agnostic: callers pass the vertex set and a
//! successor function. The vertex graph walks node -> incoming edge -> tail
//! node; the arrow graph walks edge -> tail node -> incoming edge.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

use crate::models::CircularDependency;
use crate::sequence::SequentialId;

/// One suspended visit on the explicit call stack.
struct Frame<T> {
    vertex: T,
    successors: Vec<T>,
    next: usize,
}

/// Components with more than one member, ordered by their smallest id.
pub fn strongly_connected_components<T, F, I>(
    vertices: impl IntoIterator<Item = T>,
    successors: F,
) -> Vec<BTreeSet<T>>
where
    T: SequentialId,
    F: Fn(T) -> I,
    I: IntoIterator<Item = T>,
{
    let mut index: FxHashMap<T, usize> = FxHashMap::default();
    let mut lowlink: FxHashMap<T, usize> = FxHashMap::default();
    let mut on_stack: FxHashSet<T> = FxHashSet::default();
    let mut stack: Vec<T> = Vec::new();
    let mut counter = 0usize;
    let mut components = Vec::new();

    for root in vertices {
        if index.contains_key(&root) {
            continue;
        }

        index.insert(root, counter);
        lowlink.insert(root, counter);
        counter += 1;
        stack.push(root);
        on_stack.insert(root);
        let mut call_stack = vec![Frame {
            vertex: root,
            successors: successors(root).into_iter().collect(),
            next: 0,
        }];

        while let Some(frame) = call_stack.last_mut() {
            let vertex = frame.vertex;

            let next = frame.successors.get(frame.next).copied();
            if let Some(successor) = next {
                frame.next += 1;
                if !index.contains_key(&successor) {
                    index.insert(successor, counter);
                    lowlink.insert(successor, counter);
                    counter += 1;
                    stack.push(successor);
                    on_stack.insert(successor);
                    call_stack.push(Frame {
                        vertex: successor,
                        successors: successors(successor).into_iter().collect(),
                        next: 0,
                    });
                } else if on_stack.contains(&successor) {
                    let successor_index = index[&successor];
                    let low = lowlink.entry(vertex).or_insert(successor_index);
                    *low = (*low).min(successor_index);
                }
                continue;
            }

            // All successors visited
            call_stack.pop();
            let vertex_low = lowlink[&vertex];
            if vertex_low == index[&vertex] {
                let mut component = BTreeSet::new();
                while let Some(member) = stack.pop() {
                    on_stack.remove(&member);
                    component.insert(member);
                    if member == vertex {
                        break;
                    }
                }
                if component.len() > 1 {
                    components.push(component);
                }
            }
            if let Some(parent) = call_stack.last() {
                let low = lowlink.entry(parent.vertex).or_insert(vertex_low);
                *low = (*low).min(vertex_low);
            }
        }
    }

    components.sort_by_key(|component| component.first().copied());
    components
}

/// Keep the authored part of each component: removable members are dropped,
/// and only components with more than one member left are reported.
pub fn strong_circular_dependencies<T, F>(
    components: &[BTreeSet<T>],
    is_removable: F,
) -> Vec<CircularDependency<T>>
where
    T: SequentialId,
    F: Fn(T) -> bool,
{
    components
        .iter()
        .filter_map(|component| {
            let strong: BTreeSet<T> = component
                .iter()
                .copied()
                .filter(|&member| !is_removable(member))
                .collect();
            (strong.len() > 1).then(|| CircularDependency::new(strong))
        })
        .collect()
}

/// Components that still block propagation but have no strong report,
/// returned whole.
pub fn unreported_cycles<T: SequentialId>(
    components: &[BTreeSet<T>],
    strong: &[CircularDependency<T>],
) -> Vec<CircularDependency<T>> {
    components
        .iter()
        .filter(|component| {
            !strong
                .iter()
                .any(|cycle| cycle.dependencies.is_subset(component))
        })
        .map(|component| CircularDependency::new(component.iter().copied()))
        .collect()
}
