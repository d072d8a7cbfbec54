//! Execution order for the nodes of one surface.
//!
//! Breadth-first search from the groups that matter (exposed and written),
//! stepping from a group to its writer and from a node to the groups it
//! reads. Reversing the visit order puts each writer before the reader it
//! was reached from. A link inside a cycle reads last sample's value,
//! acting as a one-sample delay. The same happens in a diamond where a
//! node reads a group whose writer the search reached later than the node
//! itself: it sees that group one sample late. Nodes the search never
//! reaches still run, after the rest, in creation order.

use std::collections::VecDeque;

use super::group::ControlGroup;

/// How one node touches the surface's groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAccess {
    pub reads: Vec<usize>,
    pub writes: Vec<usize>,
}

/// Node indices in execution order.
pub fn schedule(groups: &[ControlGroup], access: &[NodeAccess]) -> Vec<usize> {
    let mut node_seen = vec![false; access.len()];
    let mut group_seen = vec![false; groups.len()];
    let mut queue = VecDeque::new();
    let mut visited = Vec::with_capacity(access.len());

    for (g, group) in groups.iter().enumerate() {
        if group.exposed && group.writer.is_some() {
            group_seen[g] = true;
            queue.push_back(Visit::Group(g));
        }
    }

    while let Some(visit) = queue.pop_front() {
        match visit {
            Visit::Group(g) => {
                if let Some(node) = groups[g].writer {
                    if !node_seen[node] {
                        node_seen[node] = true;
                        queue.push_back(Visit::Node(node));
                    }
                }
            }
            Visit::Node(node) => {
                visited.push(node);
                for &g in &access[node].reads {
                    if !group_seen[g] {
                        group_seen[g] = true;
                        queue.push_back(Visit::Group(g));
                    }
                }
            }
        }
    }

    visited.reverse();
    visited.extend((0..access.len()).filter(|n| !node_seen[*n]));
    visited
}

enum Visit {
    Group(usize),
    Node(usize),
}
