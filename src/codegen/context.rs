use crate::builtins::Catalogue;
use crate::value::{ConvertEnv, ConverterRegistry, TypeInterner};

/// Everything code generation shares across nodes in one session.
///
/// Built once and passed by reference; nothing here is global.
pub struct CompileContext {
    pub types: TypeInterner,
    pub converters: ConverterRegistry,
    pub builtins: Catalogue,
    pub sample_rate: f64,
    pub bpm: f64,
    /// Base seed for `noise()`.
    pub noise_seed: u64,
}

impl CompileContext {
    pub fn new(sample_rate: f64, bpm: f64) -> Self {
        Self {
            types: TypeInterner::new(),
            converters: ConverterRegistry::new(),
            builtins: Catalogue::new(),
            sample_rate,
            bpm,
            noise_seed: 0x5EED,
        }
    }

    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = seed;
        self
    }

    pub fn convert_env(&self) -> ConvertEnv {
        ConvertEnv {
            sample_rate: self.sample_rate,
            bpm: self.bpm,
        }
    }

    /// Seed for the `index`-th noise instance of the node identified by
    /// `salt`. Stable across recompiles of unchanged source.
    pub fn noise_seed_for(&self, salt: u64, index: u64) -> u64 {
        self.noise_seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(salt.rotate_left(32))
            .wrapping_add(index)
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(48_000.0, 120.0)
    }
}
