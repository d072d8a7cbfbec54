//! Control groups: controls joined by links share one value.
//!
//! Built per surface with a union-find over the surface's controls. Each
//! group records which node writes it and whether it is visible outside the
//! surface.

use std::collections::HashMap;

use super::control::ControlId;

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlGroup {
    /// Members in ascending id order.
    pub members: Vec<ControlId>,
    /// Index (into the surface's node list) of the node that writes the group.
    pub writer: Option<usize>,
    /// Seen from outside the surface: a root output, or forwarded by the
    /// wrapping group node.
    pub exposed: bool,
}

impl ControlGroup {
    pub fn lowest(&self) -> ControlId {
        self.members[0]
    }
}

/// Partition of one surface's controls.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    pub groups: Vec<ControlGroup>,
    index: HashMap<ControlId, usize>,
}

impl Groups {
    /// Partition `controls` by `links`. Links touching other controls are
    /// ignored. Groups are ordered by their lowest control id.
    pub fn build(controls: &[ControlId], links: &[(ControlId, ControlId)]) -> Self {
        let position: HashMap<ControlId, usize> =
            controls.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let mut sets = UnionFind::new(controls.len());
        for (a, b) in links {
            if let (Some(&a), Some(&b)) = (position.get(a), position.get(b)) {
                sets.union(a, b);
            }
        }

        let mut by_root: HashMap<usize, Vec<ControlId>> = HashMap::new();
        for (i, control) in controls.iter().enumerate() {
            by_root.entry(sets.find(i)).or_default().push(*control);
        }
        let mut groups: Vec<ControlGroup> = by_root
            .into_values()
            .map(|mut members| {
                members.sort();
                ControlGroup {
                    members,
                    writer: None,
                    exposed: false,
                }
            })
            .collect();
        groups.sort_by_key(ControlGroup::lowest);

        let mut index = HashMap::new();
        for (g, group) in groups.iter().enumerate() {
            for member in &group.members {
                index.insert(*member, g);
            }
        }
        Self { groups, index }
    }

    pub fn of(&self, control: ControlId) -> Option<usize> {
        self.index.get(&control).copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<ControlId> {
        raw.iter().map(|i| ControlId(*i)).collect()
    }

    #[test]
    fn union_find_merges_transitively() {
        let mut sets = UnionFind::new(5);
        sets.union(0, 1);
        sets.union(3, 4);
        sets.union(1, 4);
        assert_eq!(sets.find(0), sets.find(3));
        assert_ne!(sets.find(0), sets.find(2));
    }

    #[test]
    fn groups_are_ordered_by_lowest_member() {
        let controls = ids(&[7, 2, 9, 4]);
        let links = [(ControlId(9), ControlId(2)), (ControlId(7), ControlId(100))];
        let groups = Groups::build(&controls, &links);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.groups[0].members, ids(&[2, 9]));
        assert_eq!(groups.groups[1].members, ids(&[4]));
        assert_eq!(groups.groups[2].members, ids(&[7]));
        assert_eq!(groups.of(ControlId(9)), Some(0));
        assert_eq!(groups.of(ControlId(100)), None);
    }
}
