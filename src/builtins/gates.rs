//! Gate-driven state machines: `hold` and `accum`.
//!
//! Both detect the rising edge of `gate` per lane. A lane's gate is high
//! while it is non-zero.

use crate::codegen::ir::{Instr, SlotKind};
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{Num, Sample, Value};

use super::arrays::next_num;
use super::{Builtin, Catalogue, Param};

pub fn register(catalogue: &mut Catalogue) {
    catalogue.add(Builtin::emit(
        "hold",
        vec![Param::num("x"), Param::num("gate"), Param::num("else").or(0.0)],
        hold,
    ));
    catalogue.add(Builtin::emit(
        "accum",
        vec![Param::num("x"), Param::num("gate").or(1.0)],
        accum,
    ));
}

fn hold(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let input = next_num(&mut args, span)?;
    let gate = next_num(&mut args, span)?;
    let otherwise = next_num(&mut args, span)?;

    let form = input.form;
    let input = gen.builder.materialize(&input);
    let gate = gen.builder.materialize(&gate);
    let otherwise = gen.builder.materialize(&otherwise);
    let slot = gen.builder.slot(SlotKind::Hold);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Hold {
        dst,
        input,
        gate,
        otherwise,
        slot,
    });
    Ok(Num::reg(dst, form).into())
}

fn accum(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let input = next_num(&mut args, span)?;
    let gate = next_num(&mut args, span)?;

    let form = input.form;
    let input = gen.builder.materialize(&input);
    let gate = gen.builder.materialize(&gate);
    let slot = gen.builder.slot(SlotKind::Accum);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Accum {
        dst,
        input,
        gate,
        slot,
    });
    Ok(Num::reg(dst, form).into())
}

fn high(gate: Sample) -> [bool; 2] {
    [gate.left != 0.0, gate.right != 0.0]
}

/// Latches `x` on the rising gate edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldState {
    held: Sample,
    last_gate: [bool; 2],
}

impl Default for HoldState {
    fn default() -> Self {
        Self {
            held: Sample::SILENT,
            last_gate: [false; 2],
        }
    }
}

impl HoldState {
    pub fn tick(&mut self, input: Sample, gate: Sample, otherwise: Sample) -> Sample {
        let gate = high(gate);
        let x = input.lanes();
        let mut held = self.held.lanes();
        let fallback = otherwise.lanes();
        let mut out = [0.0f32; 2];

        for lane in 0..2 {
            if gate[lane] && !self.last_gate[lane] {
                held[lane] = x[lane];
                self.held.active = input.active;
            }
            out[lane] = if gate[lane] { held[lane] } else { fallback[lane] };
        }
        self.held = Sample::from_lanes(held, self.held.active);
        self.last_gate = gate;

        let active = match gate {
            [false, false] => otherwise.active,
            [true, true] => self.held.active,
            _ => self.held.active || otherwise.active,
        };
        Sample::from_lanes(out, active)
    }
}

/// Integrates `x` while the gate is high; resets on each rising edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccumState {
    sum: [f64; 2],
    last_gate: [bool; 2],
}

impl AccumState {
    pub fn tick(&mut self, input: Sample, gate: Sample) -> Sample {
        let gate = high(gate);
        let x = input.lanes();
        for lane in 0..2 {
            if gate[lane] && !self.last_gate[lane] {
                self.sum[lane] = 0.0;
            }
            if gate[lane] {
                self.sum[lane] += x[lane] as f64;
            }
        }
        self.last_gate = gate;
        Sample::from_lanes([self.sum[0] as f32, self.sum[1] as f32], input.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{CompileContext, NoControls};
    use crate::lang::Compiler;

    fn s(x: f32) -> Sample {
        Sample::splat(x)
    }

    #[test]
    fn hold_latches_on_rising_edge() {
        let mut state = HoldState::default();
        let gates = [0.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        let inputs = [5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let out: Vec<f32> = gates
            .iter()
            .zip(inputs)
            .map(|(g, x)| state.tick(s(x), s(*g), s(-1.0)).left)
            .collect();
        assert_eq!(out, vec![-1.0, 6.0, 6.0, 6.0, -1.0, 10.0]);
    }

    #[test]
    fn hold_lanes_are_independent() {
        let mut state = HoldState::default();
        let out = state.tick(Sample::stereo(3.0, 4.0), Sample::stereo(1.0, 0.0), s(0.0));
        assert_eq!(out.lanes(), [3.0, 0.0]);
        let out = state.tick(Sample::stereo(5.0, 6.0), Sample::stereo(1.0, 1.0), s(0.0));
        assert_eq!(out.lanes(), [3.0, 6.0]);
    }

    #[test]
    fn accum_integrates_and_resets() {
        let mut state = AccumState::default();
        let gates = [1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        let out: Vec<f32> = gates
            .iter()
            .map(|g| state.tick(s(2.0), s(*g)).left)
            .collect();
        assert_eq!(out, vec![2.0, 4.0, 6.0, 6.0, 6.0, 2.0, 4.0]);
    }

    #[test]
    fn slots_follow_call_order() {
        let mut ctx = CompileContext::default();
        let code =
            Compiler::compile("out:output = accum(0.5) + hold(noise(), 1)", &mut ctx, &NoControls)
                .unwrap();
        assert_eq!(code.slots.len(), 3);
        assert_eq!(code.slots[0], SlotKind::Accum);
        assert!(matches!(code.slots[1], SlotKind::Noise { .. }));
        assert_eq!(code.slots[2], SlotKind::Hold);
    }
}
