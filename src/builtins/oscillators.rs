//! Oscillator primitives: phase-accumulating waveforms and seeded noise.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::codegen::ir::{Instr, Shape, SlotKind};
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{Form, FormKind, Num, Sample, Value};

use super::arrays::next_num;
use super::{Builtin, Catalogue, EmitFn, Param};

pub fn register(catalogue: &mut Catalogue) {
    let shapes: [(&'static str, EmitFn); 5] = [
        ("sine", |g, a, s| oscillator(g, Shape::Sine, a, s)),
        ("saw", |g, a, s| oscillator(g, Shape::Saw, a, s)),
        ("square", |g, a, s| oscillator(g, Shape::Square, a, s)),
        ("tri", |g, a, s| oscillator(g, Shape::Triangle, a, s)),
        ("phasor", |g, a, s| oscillator(g, Shape::Phasor, a, s)),
    ];
    for (name, emit) in shapes {
        catalogue.add(Builtin::emit(
            name,
            vec![Param::num("frequency").form(FormKind::Frequency)],
            emit,
        ));
    }
    catalogue.add(Builtin::emit("noise", Vec::new(), noise));
}

fn oscillator(
    gen: &mut Generator<'_>,
    shape: Shape,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, CompileError> {
    let freq = next_num(&mut args.into_iter(), span)?;
    let freq = gen.builder.materialize(&freq);
    let slot = gen.builder.slot(SlotKind::Phase);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Oscillator {
        shape,
        dst,
        freq,
        slot,
    });
    Ok(Num::reg(dst, Form::LINEAR).into())
}

fn noise(gen: &mut Generator<'_>, _args: Vec<Value>, _span: Span) -> Result<Value, CompileError> {
    let seed = gen.noise_seed();
    let slot = gen.builder.slot(SlotKind::Noise { seed });
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Noise { dst, slot });
    Ok(Num::reg(dst, Form::LINEAR).into())
}

/// Waveform value at `phase` in [0, 1). Returns a value in [-1, 1], except
/// the phasor which returns the phase itself.
pub fn waveform(shape: Shape, phase: f64) -> f64 {
    match shape {
        Shape::Sine => (phase * 2.0 * PI).sin(),
        Shape::Saw => 2.0 * phase - 1.0,
        Shape::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Shape::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
        Shape::Phasor => phase,
    }
}

/// Per-lane phase accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseState {
    pub phase: [f64; 2],
}

impl PhaseState {
    /// Emit the current phase's waveform, then advance by `freq / sample_rate`.
    pub fn tick(&mut self, shape: Shape, freq: Sample, sample_rate: f64) -> Sample {
        let mut out = [0.0f32; 2];
        for (lane, hz) in freq.lanes().into_iter().enumerate() {
            let phase = self.phase[lane];
            out[lane] = waveform(shape, phase) as f32;
            self.phase[lane] = (phase + hz as f64 / sample_rate).rem_euclid(1.0);
        }
        Sample::from_lanes(out, freq.active)
    }
}

/// Deterministic white noise in [-1, 1).
#[derive(Debug, Clone)]
pub struct NoiseState {
    rng: ChaCha8Rng,
}

impl NoiseState {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn tick(&mut self) -> Sample {
        let left = self.rng.gen_range(-1.0f32..1.0);
        let right = self.rng.gen_range(-1.0f32..1.0);
        Sample::stereo(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn sine_at_quarter() {
        assert_approx_eq!(waveform(Shape::Sine, 0.25), 1.0);
    }

    #[test]
    fn triangle_corners() {
        assert_approx_eq!(waveform(Shape::Triangle, 0.0), 0.0);
        assert_approx_eq!(waveform(Shape::Triangle, 0.25), 1.0);
        assert_approx_eq!(waveform(Shape::Triangle, 0.75), -1.0);
    }

    #[test]
    fn all_waveforms_bounded() {
        for shape in [Shape::Sine, Shape::Saw, Shape::Square, Shape::Triangle] {
            for i in 0..1000 {
                let phase = i as f64 / 1000.0;
                let v = waveform(shape, phase);
                assert!((-1.0..=1.0).contains(&v), "{shape:?} at {phase}: {v}");
            }
        }
    }

    #[test]
    fn phase_advances_per_lane() {
        let mut state = PhaseState::default();
        let freq = Sample::stereo(1.0, 2.0);
        for _ in 0..4 {
            state.tick(Shape::Phasor, freq, 8.0);
        }
        assert_approx_eq!(state.phase[0], 0.5);
        assert_approx_eq!(state.phase[1], 0.0);
    }

    #[test]
    fn phasor_ramps_and_wraps() {
        let mut state = PhaseState::default();
        let freq = Sample::splat(1.0);
        let ramp: Vec<f32> = (0..5).map(|_| state.tick(Shape::Phasor, freq, 4.0).left).collect();
        assert_eq!(ramp, vec![0.0, 0.25, 0.5, 0.75, 0.0]);
    }

    #[test]
    fn inactive_frequency_gives_inactive_output() {
        let mut state = PhaseState::default();
        assert!(!state.tick(Shape::Sine, Sample::SILENT, 48_000.0).active);
    }

    #[test]
    fn noise_is_seeded() {
        let mut a = NoiseState::new(7);
        let mut b = NoiseState::new(7);
        let mut c = NoiseState::new(8);
        let first = a.tick();
        assert_eq!(first, b.tick());
        assert_ne!(first, c.tick());
        for _ in 0..1000 {
            let s = a.tick();
            assert!((-1.0..1.0).contains(&s.left) && (-1.0..1.0).contains(&s.right));
        }
    }
}
