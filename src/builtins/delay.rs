//! Ring-buffer delay line.
//!
//! `delay(x, d, r = d)`: the buffer holds `round(r * sample_rate)` samples
//! (at least one) and is sized once at compile time, so `r` must be
//! constant. `d` may vary per sample; it is clamped to the buffer length.

use crate::codegen::ir::{Instr, SlotKind};
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{FormKind, Num, Sample, Value};

use super::arrays::next_num;
use super::{Builtin, Catalogue, Param};

pub fn register(catalogue: &mut Catalogue) {
    catalogue.add(Builtin::emit(
        "delay",
        vec![
            Param::num("x"),
            Param::num("amount").form(FormKind::Seconds),
            Param::num("range")
                .form(FormKind::Seconds)
                .constant()
                .or_arg(1),
        ],
        emit,
    ));
}

/// Buffer length for a range of `seconds`.
pub fn buffer_len(seconds: f64, sample_rate: f64) -> usize {
    let len = (seconds * sample_rate).round();
    if len.is_finite() && len >= 1.0 {
        len as usize
    } else {
        1
    }
}

fn emit(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let input = next_num(&mut args, span)?;
    let amount = next_num(&mut args, span)?;
    let range = next_num(&mut args, span)?;

    let seconds = range
        .as_const()
        .map(|s| s.left.max(s.right) as f64)
        .ok_or_else(|| CompileError::codegen("delay range must be constant", span))?;
    let len = buffer_len(seconds, gen.ctx.sample_rate);

    let form = input.form;
    let input = gen.builder.materialize(&input);
    let amount = gen.builder.materialize(&amount);
    let slot = gen.builder.slot(SlotKind::Delay { len });
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Delay {
        dst,
        input,
        amount,
        slot,
    });
    Ok(Num::reg(dst, form).into())
}

/// Preallocated ring buffer. `tick` never allocates.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayLine {
    buffer: Vec<Sample>,
    write: usize,
    written: usize,
}

impl DelayLine {
    pub fn new(len: usize) -> Self {
        Self {
            buffer: vec![Sample::SILENT; len.max(1)],
            write: 0,
            written: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether every position has been written at least once.
    pub fn is_filled(&self) -> bool {
        self.written >= self.buffer.len()
    }

    /// Store `input`, then read `amount` seconds back.
    pub fn tick(&mut self, input: Sample, amount: Sample, sample_rate: f64) -> Sample {
        let len = self.buffer.len();
        self.buffer[self.write] = input;
        self.written = (self.written + 1).min(len);

        let mut out = [0.0f32; 2];
        let mut active = self.is_filled();
        for (lane, seconds) in amount.lanes().into_iter().enumerate() {
            let back = (seconds as f64 * sample_rate).round();
            let back = if back.is_finite() && back > 0.0 {
                (back as usize).min(len - 1)
            } else {
                0
            };
            let stored = self.buffer[(self.write + len - back) % len];
            out[lane] = stored.lanes()[lane];
            active &= stored.active;
        }

        self.write = (self.write + 1) % len;
        Sample::from_lanes(out, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{CompileContext, NoControls};
    use crate::lang::Compiler;

    #[test]
    fn buffer_is_sized_from_range() {
        assert_eq!(buffer_len(0.5, 48_000.0), 24_000);
        assert_eq!(buffer_len(0.0, 48_000.0), 1);
        assert_eq!(buffer_len(-3.0, 48_000.0), 1);
        assert_eq!(DelayLine::new(0).len(), 1);
    }

    #[test]
    fn reproduces_input_at_offset() {
        let sr = 1000.0;
        let mut line = DelayLine::new(8);
        let amount = Sample::splat(0.003); // three samples
        let outputs: Vec<Sample> = (0..16)
            .map(|n| line.tick(Sample::splat(n as f32), amount, sr))
            .collect();
        for (n, out) in outputs.iter().enumerate() {
            if n < 7 {
                assert!(!out.active, "sample {n} read before the buffer filled");
            } else {
                assert!(out.active);
                assert_eq!(out.left, (n - 3) as f32);
            }
        }
    }

    #[test]
    fn amount_is_clamped_to_buffer() {
        let mut line = DelayLine::new(4);
        let far = Sample::splat(100.0);
        let out: Vec<f32> = (0..8)
            .map(|n| line.tick(Sample::splat(n as f32), far, 1.0).left)
            .collect();
        assert_eq!(&out[4..], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn slot_uses_constant_range() {
        let mut ctx = CompileContext::new(1000.0, 120.0);
        let code =
            Compiler::compile("out:output = delay(noise(), 10ms, 0.25s)", &mut ctx, &NoControls)
                .unwrap();
        assert!(code.slots.contains(&SlotKind::Delay { len: 250 }));

        let code = Compiler::compile("out:output = delay(noise(), 0.1)", &mut ctx, &NoControls)
            .unwrap();
        assert!(code.slots.contains(&SlotKind::Delay { len: 100 }));
    }
}
