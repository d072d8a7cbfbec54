//! Executes program steps against storage, one sample per call.
//!
//! Registers are sized once from the program's [`RegCounts`]; running never
//! allocates. Out-of-range registers or mismatched cells read as silence.

use crate::builtins::arrays::{sum_elements, wrap_index};
use crate::builtins::midi::transpose_events;
use crate::codegen::fold::{eval_binary, eval_unary};
use crate::codegen::ir::{ArrayReg, Instr, MidiReg, NumReg, RegCounts, SlotRef};
use crate::value::{MidiBuffer, Sample, ARRAY_SIZE};

use super::program::Step;
use super::storage::{Cell, Storage};

pub struct Machine {
    nums: Vec<Sample>,
    midis: Vec<MidiBuffer>,
    arrays: Vec<[Sample; ARRAY_SIZE]>,
    sample_rate: f64,
}

/// Slot addressing for the node being run.
struct Frame<'a> {
    offset: u32,
    base: u32,
    bindings: &'a [u32],
}

impl Frame<'_> {
    /// Absolute slot index. Unknown bindings resolve past the end of storage.
    fn resolve(&self, slot: SlotRef) -> u32 {
        match slot {
            SlotRef::Local(i) => self.offset + self.base + i,
            SlotRef::Control(k) => self
                .bindings
                .get(k as usize)
                .map_or(u32::MAX, |b| self.offset.saturating_add(*b)),
        }
    }
}

impl Machine {
    pub fn new(regs: RegCounts, sample_rate: f64) -> Self {
        Self {
            nums: vec![Sample::SILENT; regs.nums as usize],
            midis: vec![MidiBuffer::EMPTY; regs.midis as usize],
            arrays: vec![[Sample::ZERO; ARRAY_SIZE]; regs.arrays as usize],
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Run `steps` once. Slot numbers are relative to `offset`.
    pub fn run(&mut self, steps: &[Step], storage: &mut Storage, offset: u32) {
        for step in steps {
            match step {
                Step::Node {
                    instrs,
                    base,
                    bindings,
                    ..
                } => {
                    let frame = Frame {
                        offset,
                        base: *base,
                        bindings,
                    };
                    for instr in instrs {
                        self.exec(instr, &frame, storage);
                    }
                }
                Step::Surface {
                    offset: inner,
                    steps,
                } => self.run(steps, storage, offset + inner),
                Step::Copy { from, to } => storage.copy(offset + from, offset + to),
            }
        }
    }

    fn num(&self, reg: NumReg) -> Sample {
        self.nums.get(reg.0 as usize).copied().unwrap_or(Sample::SILENT)
    }

    fn set_num(&mut self, reg: NumReg, value: Sample) {
        if let Some(r) = self.nums.get_mut(reg.0 as usize) {
            *r = value;
        }
    }

    fn midi(&self, reg: MidiReg) -> MidiBuffer {
        self.midis.get(reg.0 as usize).copied().unwrap_or(MidiBuffer::EMPTY)
    }

    fn set_midi(&mut self, reg: MidiReg, value: MidiBuffer) {
        if let Some(r) = self.midis.get_mut(reg.0 as usize) {
            *r = value;
        }
    }

    fn array(&self, reg: ArrayReg) -> [Sample; ARRAY_SIZE] {
        self.arrays
            .get(reg.0 as usize)
            .copied()
            .unwrap_or([Sample::SILENT; ARRAY_SIZE])
    }

    fn set_array(&mut self, reg: ArrayReg, value: [Sample; ARRAY_SIZE]) {
        if let Some(r) = self.arrays.get_mut(reg.0 as usize) {
            *r = value;
        }
    }

    fn exec(&mut self, instr: &Instr, frame: &Frame<'_>, storage: &mut Storage) {
        let slot = |s: SlotRef| frame.resolve(s);
        let sr = self.sample_rate;

        match *instr {
            Instr::Const { dst, value } => self.set_num(dst, value),
            Instr::Binary { op, dst, lhs, rhs } => {
                let value = eval_binary(op, self.num(lhs), self.num(rhs));
                self.set_num(dst, value);
            }
            Instr::Unary { op, dst, src } => self.set_num(dst, eval_unary(op, self.num(src))),
            Instr::Convert {
                conversion,
                dst,
                src,
            } => self.set_num(dst, conversion.apply(self.num(src))),
            Instr::Pure { func, dst, args } => {
                let value = func.eval(args.map(|r| self.num(r)));
                self.set_num(dst, value);
            }

            Instr::Load { dst, slot: s } => self.set_num(dst, storage.num(slot(s))),
            Instr::Store { slot: s, src } => storage.set_num(slot(s), self.num(src)),
            Instr::LoadMidi { dst, slot: s } => {
                let value = storage.midi(slot(s)).copied().unwrap_or(MidiBuffer::EMPTY);
                self.set_midi(dst, value);
            }
            Instr::StoreMidi { slot: s, src } => {
                let value = self.midi(src);
                if let Some(cell) = storage.midi_mut(slot(s)) {
                    *cell = value;
                }
            }
            Instr::LoadArray { dst, slot: s } => {
                let value = storage
                    .array(slot(s))
                    .copied()
                    .unwrap_or([Sample::ZERO; ARRAY_SIZE]);
                self.set_array(dst, value);
            }

            Instr::MidiCount { dst, src } => {
                self.set_num(dst, Sample::splat(self.midi(src).len() as f32));
            }
            Instr::Transpose {
                dst,
                src,
                semitones,
            } => {
                let value = transpose_events(&self.midi(src), self.num(semitones).left);
                self.set_midi(dst, value);
            }

            Instr::Fill { dst, src } => self.set_array(dst, [self.num(src); ARRAY_SIZE]),
            Instr::Sum { dst, src } => self.set_num(dst, sum_elements(&self.array(src))),
            Instr::At { dst, array, index } => {
                let value = self.array(array)[wrap_index(self.num(index).left)];
                self.set_num(dst, value);
            }

            Instr::Oscillator {
                shape,
                dst,
                freq,
                slot: s,
            } => {
                let freq = self.num(freq);
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Phase(state)) => state.tick(shape, freq, sr),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Noise { dst, slot: s } => {
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Noise(state)) => state.tick(),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Filter {
                mode,
                dst,
                input,
                freq,
                q,
                slot: s,
            } => {
                let (input, freq, q) = (self.num(input), self.num(freq), self.num(q));
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Biquad(state)) => state.tick(mode, input, freq, q, sr),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Delay {
                dst,
                input,
                amount,
                slot: s,
            } => {
                let (input, amount) = (self.num(input), self.num(amount));
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Delay(line)) => line.tick(input, amount, sr),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Hold {
                dst,
                input,
                gate,
                otherwise,
                slot: s,
            } => {
                let (input, gate, otherwise) = (self.num(input), self.num(gate), self.num(otherwise));
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Hold(state)) => state.tick(input, gate, otherwise),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Accum {
                dst,
                input,
                gate,
                slot: s,
            } => {
                let (input, gate) = (self.num(input), self.num(gate));
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Accum(state)) => state.tick(input, gate),
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
            Instr::Note { dst, midi, slot: s } => {
                let events = self.midi(midi);
                let values = match storage.cell_mut(slot(s)) {
                    Some(Cell::Voices(state)) => {
                        state.update(&events);
                        state.outputs()
                    }
                    _ => [Sample::SILENT; 5],
                };
                for (reg, value) in dst.into_iter().zip(values) {
                    self.set_num(reg, value);
                }
            }
            Instr::Voices { dst, midi, slot: s } => {
                let events = self.midi(midi);
                let value = match storage.cell_mut(slot(s)) {
                    Some(Cell::Voices(state)) => {
                        state.update(&events);
                        Sample::splat(state.voices as f32)
                    }
                    _ => Sample::SILENT,
                };
                self.set_num(dst, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ir::SlotKind;
    use crate::codegen::{CompileContext, NoControls, NodeCode};
    use crate::graph::node::NodeId;
    use crate::lang::Compiler;

    /// Compile one node whose controls get consecutive slots, then its
    /// private block.
    fn setup(src: &str) -> (NodeCode, Vec<Step>, Storage) {
        let mut ctx = CompileContext::new(1000.0, 120.0);
        let code = Compiler::compile(src, &mut ctx, &NoControls).unwrap();
        let mut layout: Vec<_> = code.controls.iter().map(|_| SlotKind::Num).collect();
        let base = layout.len() as u32;
        layout.extend_from_slice(&code.slots);
        let steps = vec![Step::Node {
            node: NodeId(0),
            instrs: code.instrs.clone(),
            base,
            bindings: (0..base).collect(),
        }];
        (code, steps, Storage::construct(&layout))
    }

    #[test]
    fn runs_arithmetic_into_output() {
        let (code, steps, mut storage) = setup("t:toggle\nout:output = t:toggle * 2 + 1");
        let mut machine = Machine::new(code.regs, 1000.0);
        storage.set_num(0, Sample::splat(3.0));
        machine.run(&steps, &mut storage, 0);
        let out = code
            .controls
            .iter()
            .position(|c| c.key.name == "out")
            .unwrap() as u32;
        assert_eq!(storage.num(out).lanes(), [7.0, 7.0]);
    }

    #[test]
    fn phasor_advances_each_run() {
        let (code, steps, mut storage) = setup("out:output = phasor(250hz)");
        let mut machine = Machine::new(code.regs, 1000.0);
        let mut seen = Vec::new();
        for _ in 0..5 {
            machine.run(&steps, &mut storage, 0);
            seen.push(storage.num(0).left);
        }
        assert_eq!(seen, vec![0.0, 0.25, 0.5, 0.75, 0.0]);
    }

    #[test]
    fn surface_offsets_shift_slots() {
        let (code, steps, _) = setup("out:output = 5");
        let mut storage = Storage::construct(&[SlotKind::Num, SlotKind::Num]);
        let nested = vec![
            Step::Surface { offset: 1, steps },
            Step::Copy { from: 1, to: 0 },
        ];
        let mut machine = Machine::new(code.regs, 1000.0);
        machine.run(&nested, &mut storage, 0);
        assert_eq!(storage.num(1).left, 5.0);
        assert_eq!(storage.num(0).left, 5.0);
    }
}
