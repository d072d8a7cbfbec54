//! Form converters.
//!
//! A converter maps a raw value from one form's domain into another's. The
//! registry is keyed by destination form, then by source form; each entry
//! builds a [`Conversion`] from the source form's parameters and the
//! session's sample rate and tempo. The resulting `Conversion` is plain
//! data, so the same value drives constant folding and the runtime.

use std::collections::HashMap;

use super::form::{Form, FormKind};
use super::sample::Sample;

/// Session constants a converter may depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertEnv {
    pub sample_rate: f64,
    pub bpm: f64,
}

/// A fully-resolved numeric mapping applied lane by lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// `x * scale`
    Scale(f32),
    /// `numerator / x`
    Reciprocal(f32),
    /// `min + x * (max - min)`
    Range { min: f32, max: f32 },
    /// `min * (max / min)^x`
    ExpRange { min: f32, max: f32 },
    DecibelToGain,
    GainToDecibel,
    NoteToFrequency,
    FrequencyToNote,
    ResonanceToQ,
    QToResonance,
}

impl Conversion {
    pub fn apply_lane(self, x: f32) -> f32 {
        match self {
            Conversion::Scale(scale) => x * scale,
            Conversion::Reciprocal(numerator) => {
                if x == 0.0 {
                    0.0
                } else {
                    numerator / x
                }
            }
            Conversion::Range { min, max } => min + x * (max - min),
            Conversion::ExpRange { min, max } => min * (max / min).powf(x),
            Conversion::DecibelToGain => 10f32.powf(x / 20.0),
            Conversion::GainToDecibel => 20.0 * x.abs().max(1e-9).log10(),
            Conversion::NoteToFrequency => 440.0 * 2f32.powf((x - 69.0) / 12.0),
            Conversion::FrequencyToNote => 69.0 + 12.0 * (x.max(1e-6) / 440.0).log2(),
            Conversion::ResonanceToQ => 0.5 / (1.0 - x.clamp(0.0, 0.999)),
            Conversion::QToResonance => 1.0 - 0.5 / x.max(0.5),
        }
    }

    pub fn apply(self, sample: Sample) -> Sample {
        sample.map(|x| self.apply_lane(x))
    }
}

type Builder = fn(&Form, &ConvertEnv) -> Conversion;

/// Table of registered converters.
pub struct ConverterRegistry {
    table: HashMap<FormKind, HashMap<FormKind, Builder>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// An empty registry; every conversion falls back to a relabel.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The standard converter set.
    pub fn new() -> Self {
        use FormKind::*;

        let mut registry = Self::empty();

        registry.register(Linear, Decibel, |_, _| Conversion::DecibelToGain);
        registry.register(Linear, Control, control_range);
        registry.register(Decibel, Linear, |_, _| Conversion::GainToDecibel);
        registry.register(Decibel, Control, control_range);

        registry.register(Frequency, Note, |_, _| Conversion::NoteToFrequency);
        registry.register(Frequency, Seconds, |_, _| Conversion::Reciprocal(1.0));
        registry.register(Frequency, Samples, |_, env| {
            Conversion::Reciprocal(env.sample_rate as f32)
        });
        registry.register(Frequency, Beats, |_, env| {
            Conversion::Reciprocal((env.bpm / 60.0) as f32)
        });
        registry.register(Frequency, Control, |form, _| {
            let [min, max] = form.params;
            if min > 0.0 && max > 0.0 {
                Conversion::ExpRange {
                    min: min as f32,
                    max: max as f32,
                }
            } else {
                control_range(form, &ConvertEnv::default())
            }
        });
        registry.register(Note, Frequency, |_, _| Conversion::FrequencyToNote);

        registry.register(Seconds, Frequency, |_, _| Conversion::Reciprocal(1.0));
        registry.register(Seconds, Samples, |_, env| {
            Conversion::Scale((1.0 / env.sample_rate) as f32)
        });
        registry.register(Seconds, Beats, |_, env| Conversion::Scale((60.0 / env.bpm) as f32));
        registry.register(Samples, Seconds, |_, env| Conversion::Scale(env.sample_rate as f32));
        registry.register(Samples, Frequency, |_, env| {
            Conversion::Reciprocal(env.sample_rate as f32)
        });
        registry.register(Samples, Beats, |_, env| {
            Conversion::Scale((60.0 / env.bpm * env.sample_rate) as f32)
        });
        registry.register(Beats, Seconds, |_, env| Conversion::Scale((env.bpm / 60.0) as f32));

        registry.register(Q, Resonance, |_, _| Conversion::ResonanceToQ);
        registry.register(Resonance, Q, |_, _| Conversion::QToResonance);

        registry
    }

    pub fn register(&mut self, to: FormKind, from: FormKind, builder: Builder) {
        self.table.entry(to).or_default().insert(from, builder);
    }

    /// Resolve the conversion from `from` into `to`, if one is registered.
    pub fn resolve(&self, from: &Form, to: FormKind, env: &ConvertEnv) -> Option<Conversion> {
        let builder = self.table.get(&to)?.get(&from.kind)?;
        Some(builder(from, env))
    }

    pub fn contains(&self, from: FormKind, to: FormKind) -> bool {
        self.table
            .get(&to)
            .is_some_and(|sources| sources.contains_key(&from))
    }
}

impl Default for ConvertEnv {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            bpm: 120.0,
        }
    }
}

fn control_range(form: &Form, _env: &ConvertEnv) -> Conversion {
    Conversion::Range {
        min: form.params[0] as f32,
        max: form.params[1] as f32,
    }
}
