//! Biquad filters (RBJ cookbook).

use std::f64::consts::PI;

use crate::codegen::ir::{FilterMode, Instr, SlotKind};
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{Form, FormKind, Num, Sample, Value};

use super::arrays::next_num;
use super::{Builtin, Catalogue, EmitFn, Param};

pub const DEFAULT_Q: f32 = 0.707;

pub fn register(catalogue: &mut Catalogue) {
    let modes: [(&'static str, EmitFn); 3] = [
        ("lowpass", |g, a, s| filter(g, FilterMode::Lowpass, a, s)),
        ("highpass", |g, a, s| filter(g, FilterMode::Highpass, a, s)),
        ("bandpass", |g, a, s| filter(g, FilterMode::Bandpass, a, s)),
    ];
    for (name, emit) in modes {
        catalogue.add(Builtin::emit(
            name,
            vec![
                Param::num("x"),
                Param::num("frequency").form(FormKind::Frequency),
                Param::num("q").form(FormKind::Q).or(DEFAULT_Q),
            ],
            emit,
        ));
    }
}

fn filter(
    gen: &mut Generator<'_>,
    mode: FilterMode,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let input = next_num(&mut args, span)?;
    let freq = next_num(&mut args, span)?;
    let q = next_num(&mut args, span)?;

    let form = input.form;
    let input = gen.builder.materialize(&input);
    let freq = gen.builder.materialize(&freq);
    let q = gen.builder.materialize(&q);
    let slot = gen.builder.slot(SlotKind::Biquad);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Filter {
        mode,
        dst,
        input,
        freq,
        q,
        slot,
    });
    Ok(Num::reg(dst, keep_linear(form)).into())
}

fn keep_linear(form: Form) -> Form {
    if form.is_linear() {
        form
    } else {
        Form::LINEAR
    }
}

/// Normalised coefficients (a0 divided out).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn design(mode: FilterMode, freq: f64, q: f64, sample_rate: f64) -> Self {
        let freq = freq.clamp(1.0, sample_rate * 0.49);
        let q = q.max(0.01);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        let (b0, b1, b2) = match mode {
            FilterMode::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterMode::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
            FilterMode::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Lane {
    coeffs: Coefficients,
    last_freq: f32,
    last_q: f32,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Default for Lane {
    fn default() -> Self {
        Self {
            coeffs: Coefficients::default(),
            // NaN never compares equal, so the first tick always designs.
            last_freq: f32::NAN,
            last_q: f32::NAN,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }
}

impl Lane {
    fn process(&mut self, mode: FilterMode, x: f32, freq: f32, q: f32, sample_rate: f64) -> f32 {
        if freq != self.last_freq || q != self.last_q {
            self.coeffs = Coefficients::design(mode, freq as f64, q as f64, sample_rate);
            self.last_freq = freq;
            self.last_q = q;
        }
        let c = self.coeffs;
        let x = x as f64;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y as f32
    }
}

/// Two-lane biquad with coefficients cached on the last frequency and Q.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    lanes: [Lane; 2],
}

impl BiquadState {
    pub fn tick(
        &mut self,
        mode: FilterMode,
        input: Sample,
        freq: Sample,
        q: Sample,
        sample_rate: f64,
    ) -> Sample {
        let x = input.lanes();
        let f = freq.lanes();
        let r = q.lanes();
        let mut out = [0.0f32; 2];
        for lane in 0..2 {
            out[lane] = self.lanes[lane].process(mode, x[lane], f[lane], r[lane], sample_rate);
        }
        Sample::from_lanes(out, input.active)
    }

    /// Whether the coefficients were designed for `freq` and `q` on both lanes.
    pub fn is_cached(&self, freq: f32, q: f32) -> bool {
        self.lanes.iter().all(|l| l.last_freq == freq && l.last_q == q)
    }
}
