//! Register-based instruction set executed by the runtime machine.
//!
//! Each node compiles to a flat `Vec<Instr>`. Temporaries live in three
//! register banks (numbers, MIDI buffers, arrays); persistent data lives in
//! storage slots, addressed either inside the node's own block
//! ([`SlotRef::Local`]) or through the node's control bindings
//! ([`SlotRef::Control`]).

use crate::graph::control::ControlKey;
use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::value::{Conversion, Sample};

use super::fold::PureFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumReg(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiReg(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayReg(pub u32);

/// A storage slot seen from inside one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    /// Index into the node's private block.
    Local(u32),
    /// Index into the node's control bindings.
    Control(u32),
}

/// Shape of one storage slot. Two layouts are interchangeable exactly when
/// their slot kind sequences are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Num,
    Midi,
    Array,
    Phase,
    Noise { seed: u64 },
    Biquad,
    Delay { len: usize },
    Hold,
    Accum,
    Voices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sine,
    Saw,
    Square,
    Triangle,
    Phasor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Const { dst: NumReg, value: Sample },
    Binary { op: BinaryOp, dst: NumReg, lhs: NumReg, rhs: NumReg },
    Unary { op: UnaryOp, dst: NumReg, src: NumReg },
    Convert { conversion: Conversion, dst: NumReg, src: NumReg },
    /// Unused trailing argument registers repeat `args[0]`.
    Pure { func: PureFn, dst: NumReg, args: [NumReg; 3] },

    Load { dst: NumReg, slot: SlotRef },
    Store { slot: SlotRef, src: NumReg },
    LoadMidi { dst: MidiReg, slot: SlotRef },
    StoreMidi { slot: SlotRef, src: MidiReg },
    LoadArray { dst: ArrayReg, slot: SlotRef },

    MidiCount { dst: NumReg, src: MidiReg },
    Transpose { dst: MidiReg, src: MidiReg, semitones: NumReg },

    Fill { dst: ArrayReg, src: NumReg },
    Sum { dst: NumReg, src: ArrayReg },
    At { dst: NumReg, array: ArrayReg, index: NumReg },

    Oscillator { shape: Shape, dst: NumReg, freq: NumReg, slot: SlotRef },
    Noise { dst: NumReg, slot: SlotRef },
    Filter { mode: FilterMode, dst: NumReg, input: NumReg, freq: NumReg, q: NumReg, slot: SlotRef },
    Delay { dst: NumReg, input: NumReg, amount: NumReg, slot: SlotRef },
    Hold { dst: NumReg, input: NumReg, gate: NumReg, otherwise: NumReg, slot: SlotRef },
    Accum { dst: NumReg, input: NumReg, gate: NumReg, slot: SlotRef },
    /// Writes note, velocity, gate, bend and aftertouch.
    Note { dst: [NumReg; 5], midi: MidiReg, slot: SlotRef },
    Voices { dst: NumReg, midi: MidiReg, slot: SlotRef },
}

/// Register bank sizes a node needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegCounts {
    pub nums: u32,
    pub midis: u32,
    pub arrays: u32,
}

impl RegCounts {
    pub fn max(self, other: RegCounts) -> RegCounts {
        RegCounts {
            nums: self.nums.max(other.nums),
            midis: self.midis.max(other.midis),
            arrays: self.arrays.max(other.arrays),
        }
    }
}

/// How a node uses one of its controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlUse {
    pub key: ControlKey,
    pub reads: bool,
    pub writes: bool,
}

/// The compiled form of one expression node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCode {
    pub instrs: Vec<Instr>,
    /// Private slots, addressed by `SlotRef::Local`.
    pub slots: Vec<SlotKind>,
    /// Controls in binding order, addressed by `SlotRef::Control`.
    pub controls: Vec<ControlUse>,
    pub regs: RegCounts,
}

impl NodeCode {
    pub fn writes(&self, key: &ControlKey) -> bool {
        self.controls.iter().any(|c| c.writes && &c.key == key)
    }

    pub fn uses(&self, key: &ControlKey) -> bool {
        self.controls.iter().any(|c| &c.key == key)
    }
}
