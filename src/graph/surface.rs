//! Surface compiler: lays out one graph level and its nested groups as a
//! single block of storage and steps.
//!
//! Block layout: one slot per control group that has no forwarded member
//! (ordered by lowest control id), then each node's private block in
//! execution order. A group node's child block is spliced whole. A group
//! whose members forward into child blocks uses those child slots instead
//! of its own; when it spans several, copy steps keep them in sync.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::codegen::ir::{RegCounts, SlotKind};
use crate::lang::ast::ControlKind;
use crate::runtime::program::Step;

use super::control::{ControlId, StorageClass};
use super::group::Groups;
use super::node::{NodeKind, SurfaceId};
use super::patch::Patch;
use super::schedule::{schedule, NodeAccess};

#[derive(Debug, Clone, PartialEq)]
pub struct GroupLayout {
    pub members: Vec<ControlId>,
    pub class: StorageClass,
    pub written: bool,
    /// Physical slots, primary first.
    pub slots: Vec<u32>,
}

/// A compiled surface. Slot numbers are relative to the block start.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub steps: Vec<Step>,
    pub layout: Vec<SlotKind>,
    pub regs: RegCounts,
    pub control_slots: HashMap<ControlId, Vec<u32>>,
    pub groups: Vec<GroupLayout>,
    /// Slots of MIDI groups no node writes, at this level and below.
    pub midi_inputs: Vec<u32>,
    /// Slots of MIDI groups some node writes, at this level and below.
    midi_written: Vec<u32>,
    written: HashSet<ControlId>,
}

impl Block {
    /// Whether some node inside the block writes `control`'s group.
    pub fn is_written(&self, control: ControlId) -> bool {
        self.written.contains(&control)
    }

    /// MIDI slots the host fills and clears every sample. A slot shared
    /// with a written group anywhere in the block is left to its writer.
    pub fn host_midi_slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self
            .midi_inputs
            .iter()
            .copied()
            .filter(|s| !self.midi_written.contains(s))
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    fn primary(&self, control: ControlId) -> Option<u32> {
        self.control_slots
            .get(&control)
            .and_then(|slots| slots.first().copied())
    }
}

fn slot_kind(class: StorageClass) -> SlotKind {
    match class {
        StorageClass::Num => SlotKind::Num,
        StorageClass::Midi => SlotKind::Midi,
        StorageClass::Array => SlotKind::Array,
    }
}

/// Where a node's storage went.
enum Placement {
    Expr { base: u32 },
    Group { offset: u32, block: Block },
}

/// Compile `surface` and everything below it. Nodes without code are laid
/// out empty.
pub fn build(patch: &Patch, surface: SurfaceId) -> Block {
    let nodes: Vec<_> = patch.surface_nodes(surface).to_vec();
    let root = patch.surface(surface).map_or(true, |s| s.is_root());

    let mut children: Vec<Option<Block>> = nodes
        .iter()
        .map(|id| {
            patch
                .node(*id)
                .and_then(|node| node.child())
                .map(|child| build(patch, child))
        })
        .collect();

    let controls: Vec<ControlId> = nodes
        .iter()
        .filter_map(|id| patch.node(*id))
        .flat_map(|node| node.controls.iter().copied())
        .collect();
    let mut groups = Groups::build(&controls, patch.links());

    // Reads and writes per node.
    let mut access = Vec::with_capacity(nodes.len());
    for (i, id) in nodes.iter().enumerate() {
        let mut node_access = NodeAccess::default();
        if let Some(node) = patch.node(*id) {
            match (&node.kind, &node.code, &children[i]) {
                (NodeKind::Expr { .. }, Some(code), _) => {
                    for usage in &code.controls {
                        let Some(g) = patch
                            .find_control(*id, &usage.key)
                            .and_then(|c| groups.of(c))
                        else {
                            continue;
                        };
                        if usage.reads {
                            node_access.reads.push(g);
                        }
                        if usage.writes {
                            node_access.writes.push(g);
                        }
                    }
                }
                (NodeKind::Group { .. }, _, Some(child)) => {
                    for control in &node.controls {
                        let (Some(inner), Some(g)) = (
                            patch.control(*control).and_then(|c| c.forwards),
                            groups.of(*control),
                        ) else {
                            continue;
                        };
                        if child.is_written(inner) {
                            node_access.writes.push(g);
                        } else {
                            node_access.reads.push(g);
                        }
                    }
                }
                _ => {}
            }
        }
        access.push(node_access);
    }

    // Writers and exposure.
    for (i, node_access) in access.iter().enumerate() {
        for &g in &node_access.writes {
            let group = &mut groups.groups[g];
            match group.writer {
                None => group.writer = Some(i),
                Some(first) if first != i => warn!(
                    "control group {} has several writers ({} and {}); {} wins",
                    group.lowest(),
                    nodes[first],
                    nodes[i],
                    nodes[first]
                ),
                Some(_) => {}
            }
        }
    }
    for group in &mut groups.groups {
        group.exposed = group.members.iter().any(|c| {
            if root {
                patch
                    .control(*c)
                    .is_some_and(|c| c.kind() == ControlKind::Output)
            } else {
                patch.is_exposed(*c)
            }
        });
    }

    let order = schedule(&groups.groups, &access);

    // Layout: own group slots first.
    let mut layout = Vec::new();
    let mut own_slot: Vec<Option<u32>> = Vec::with_capacity(groups.len());
    let mut classes = Vec::with_capacity(groups.len());
    for group in &groups.groups {
        let class = patch
            .control(group.lowest())
            .map_or(StorageClass::Num, |c| c.kind().storage_class());
        classes.push(class);
        let forwarded = group
            .members
            .iter()
            .any(|c| patch.control(*c).is_some_and(|c| c.forwards.is_some()));
        if forwarded {
            own_slot.push(None);
        } else {
            own_slot.push(Some(layout.len() as u32));
            layout.push(slot_kind(class));
        }
    }

    // Then node blocks in execution order.
    let mut regs = RegCounts::default();
    let mut placements: Vec<Option<Placement>> = (0..nodes.len()).map(|_| None).collect();
    for &i in &order {
        let Some(node) = patch.node(nodes[i]) else {
            continue;
        };
        let start = layout.len() as u32;
        if let Some(block) = children[i].take() {
            layout.extend_from_slice(&block.layout);
            regs = regs.max(block.regs);
            placements[i] = Some(Placement::Group {
                offset: start,
                block,
            });
        } else if let Some(code) = &node.code {
            layout.extend_from_slice(&code.slots);
            regs = regs.max(code.regs);
            placements[i] = Some(Placement::Expr { base: start });
        }
    }

    // Physical slots per group, primary first.
    let child_slot = |control: ControlId| -> Option<u32> {
        let inner = patch.control(control)?.forwards?;
        let owner = patch.control(control)?.node;
        let i = nodes.iter().position(|n| *n == owner)?;
        match placements[i].as_ref()? {
            Placement::Group { offset, block } => block.primary(inner).map(|s| s + offset),
            Placement::Expr { .. } => None,
        }
    };
    let mut group_slots: Vec<Vec<u32>> = Vec::with_capacity(groups.len());
    for (g, group) in groups.groups.iter().enumerate() {
        let mut slots: Vec<u32> = own_slot[g].into_iter().collect();
        let writer_node = group.writer.map(|w| nodes[w]);
        let mut primary = None;
        for member in &group.members {
            let Some(slot) = child_slot(*member) else {
                continue;
            };
            let from_writer = writer_node.is_some_and(|w| {
                patch.control(*member).is_some_and(|c| c.node == w)
            });
            if from_writer && primary.is_none() {
                primary = Some(slot);
            }
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
        if let Some(primary) = primary {
            slots.retain(|s| *s != primary);
            slots.insert(0, primary);
        }
        group_slots.push(slots);
    }
    let primary_of = |control: ControlId| -> Option<u32> {
        groups
            .of(control)
            .and_then(|g| group_slots[g].first().copied())
    };

    // Steps.
    let mut steps = Vec::with_capacity(order.len());
    for &i in &order {
        let Some(node) = patch.node(nodes[i]) else {
            continue;
        };
        match placements[i].as_ref() {
            Some(Placement::Expr { base }) => {
                let Some(code) = &node.code else {
                    continue;
                };
                let bindings: Option<Vec<u32>> = code
                    .controls
                    .iter()
                    .map(|usage| {
                        patch
                            .find_control(node.id, &usage.key)
                            .and_then(primary_of)
                    })
                    .collect();
                let Some(bindings) = bindings else {
                    warn!("{} references a control that no longer exists; skipped", node.id);
                    continue;
                };
                steps.push(Step::Node {
                    node: node.id,
                    instrs: code.instrs.clone(),
                    base: *base,
                    bindings,
                });
            }
            Some(Placement::Group { offset, block }) => {
                let mut after = Vec::new();
                for control in &node.controls {
                    let (Some(mine), Some(primary), Some(inner)) = (
                        child_slot(*control),
                        primary_of(*control),
                        patch.control(*control).and_then(|c| c.forwards),
                    ) else {
                        continue;
                    };
                    if mine == primary {
                        continue;
                    }
                    if block.is_written(inner) {
                        after.push(Step::Copy {
                            from: mine,
                            to: primary,
                        });
                    } else {
                        steps.push(Step::Copy {
                            from: primary,
                            to: mine,
                        });
                    }
                }
                steps.push(Step::Surface {
                    offset: *offset,
                    steps: block.steps.clone(),
                });
                steps.extend(after);
            }
            None => {}
        }
    }

    // Control lookup for this level and every level below.
    let mut control_slots = HashMap::new();
    for control in &controls {
        if let Some(g) = groups.of(*control) {
            control_slots.insert(*control, group_slots[g].clone());
        }
    }
    for placement in placements.iter().flatten() {
        if let Placement::Group { offset, block } = placement {
            for (control, slots) in &block.control_slots {
                control_slots.insert(*control, slots.iter().map(|s| s + offset).collect());
            }
        }
    }

    let mut midi_inputs = Vec::new();
    let mut midi_written = Vec::new();
    for placement in placements.iter().flatten() {
        if let Placement::Group { offset, block } = placement {
            midi_inputs.extend(block.midi_inputs.iter().map(|s| s + offset));
            midi_written.extend(block.midi_written.iter().map(|s| s + offset));
        }
    }

    let mut written = HashSet::new();
    let mut layouts = Vec::with_capacity(groups.len());
    for (g, group) in groups.groups.iter().enumerate() {
        if group.writer.is_some() {
            written.extend(group.members.iter().copied());
        }
        if classes[g] == StorageClass::Midi {
            let target = if group.writer.is_some() {
                &mut midi_written
            } else {
                &mut midi_inputs
            };
            target.extend(&group_slots[g]);
        }
        layouts.push(GroupLayout {
            members: group.members.clone(),
            class: classes[g],
            written: group.writer.is_some(),
            slots: group_slots[g].clone(),
        });
    }

    Block {
        steps,
        layout,
        regs,
        control_slots,
        groups: layouts,
        midi_inputs,
        midi_written,
        written,
    }
}
