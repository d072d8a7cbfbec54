//! The deployable program: a step list over one flat storage layout.
//!
//! Slot numbers inside a [`Step::Surface`] are relative to the enclosing
//! surface's offset, so a child block is spliced in without rewriting it.

use std::collections::HashMap;

use crate::codegen::ir::{Instr, RegCounts, SlotKind};
use crate::graph::control::ControlId;
use crate::graph::node::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Run one expression node. Its private slots start at `base`; binding
    /// `k` resolves to slot `bindings[k]`.
    Node {
        node: NodeId,
        instrs: Vec<Instr>,
        base: u32,
        bindings: Vec<u32>,
    },
    /// Run a group node's child block placed at `offset`.
    Surface { offset: u32, steps: Vec<Step> },
    /// Synchronise two physical slots of one control group.
    Copy { from: u32, to: u32 },
}

impl Step {
    /// Number of expression nodes this step runs.
    pub fn node_count(&self) -> usize {
        match self {
            Step::Node { .. } => 1,
            Step::Surface { steps, .. } => steps.iter().map(Step::node_count).sum(),
            Step::Copy { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub steps: Vec<Step>,
    /// Kind of every storage slot, in slot order.
    pub layout: Vec<SlotKind>,
    pub regs: RegCounts,
    /// Every physical slot of each control, the primary slot first.
    pub control_slots: HashMap<ControlId, Vec<u32>>,
    /// Primary slots of the root output groups, summed into the host output.
    pub outputs: Vec<u32>,
    /// Slots of root MIDI groups that no node writes. They take external
    /// events and are cleared after every sample.
    pub midi_inputs: Vec<u32>,
}

impl Program {
    pub fn slots_of(&self, control: ControlId) -> Option<&[u32]> {
        self.control_slots.get(&control).map(Vec::as_slice)
    }

    pub fn primary_slot(&self, control: ControlId) -> Option<u32> {
        self.slots_of(control).and_then(|slots| slots.first().copied())
    }

    pub fn node_count(&self) -> usize {
        self.steps.iter().map(Step::node_count).sum()
    }
}
