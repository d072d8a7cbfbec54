use crate::graph::control::ControlKey;
use crate::value::{Num, NumRepr};

use super::ir::*;

/// Accumulates one node's instructions, registers, private slots and
/// control uses. Slots are append-only; a slot index never changes once
/// handed out.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    instrs: Vec<Instr>,
    slots: Vec<SlotKind>,
    controls: Vec<ControlUse>,
    regs: RegCounts,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn num_reg(&mut self) -> NumReg {
        let reg = NumReg(self.regs.nums);
        self.regs.nums += 1;
        reg
    }

    pub fn midi_reg(&mut self) -> MidiReg {
        let reg = MidiReg(self.regs.midis);
        self.regs.midis += 1;
        reg
    }

    pub fn array_reg(&mut self) -> ArrayReg {
        let reg = ArrayReg(self.regs.arrays);
        self.regs.arrays += 1;
        reg
    }

    /// Reserve a private slot for a stateful built-in.
    pub fn slot(&mut self, kind: SlotKind) -> SlotRef {
        let index = self.slots.len() as u32;
        self.slots.push(kind);
        SlotRef::Local(index)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Binding index for `key`, registering the control on first use.
    pub fn control(&mut self, key: &ControlKey) -> u32 {
        if let Some(index) = self.controls.iter().position(|c| &c.key == key) {
            return index as u32;
        }
        self.controls.push(ControlUse {
            key: key.clone(),
            reads: false,
            writes: false,
        });
        (self.controls.len() - 1) as u32
    }

    pub fn mark_read(&mut self, index: u32) {
        if let Some(control) = self.controls.get_mut(index as usize) {
            control.reads = true;
        }
    }

    pub fn mark_write(&mut self, index: u32) {
        if let Some(control) = self.controls.get_mut(index as usize) {
            control.writes = true;
        }
    }

    /// A register holding `num`, loading constants on demand.
    pub fn materialize(&mut self, num: &Num) -> NumReg {
        match num.repr {
            NumRepr::Reg(reg) => reg,
            NumRepr::Const(value) => {
                let dst = self.num_reg();
                self.emit(Instr::Const { dst, value });
                dst
            }
        }
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn finish(self) -> NodeCode {
        NodeCode {
            instrs: self.instrs,
            slots: self.slots,
            controls: self.controls,
            regs: self.regs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ast::ControlKind;
    use crate::value::{Form, Sample};

    #[test]
    fn controls_are_deduplicated_by_key() {
        let mut builder = NodeBuilder::new();
        let a = builder.control(&ControlKey::new("cut", ControlKind::Knob));
        let b = builder.control(&ControlKey::new("out", ControlKind::Output));
        let c = builder.control(&ControlKey::new("cut", ControlKind::Knob));
        assert_eq!(a, c);
        assert_ne!(a, b);
        builder.mark_write(b);
        let code = builder.finish();
        assert_eq!(code.controls.len(), 2);
        assert!(code.controls[1].writes);
        assert!(!code.controls[0].writes);
    }

    #[test]
    fn slots_are_append_only() {
        let mut builder = NodeBuilder::new();
        assert_eq!(builder.slot(SlotKind::Phase), SlotRef::Local(0));
        assert_eq!(builder.slot(SlotKind::Hold), SlotRef::Local(1));
        assert_eq!(builder.slot_count(), 2);
    }

    #[test]
    fn materialize_emits_const_once_per_call() {
        let mut builder = NodeBuilder::new();
        let num = Num::constant(Sample::splat(2.0), Form::LINEAR);
        let reg = builder.materialize(&num);
        assert_eq!(builder.instrs().len(), 1);
        assert_eq!(builder.materialize(&Num::reg(reg, Form::LINEAR)), reg);
        assert_eq!(builder.instrs().len(), 1);
    }
}
