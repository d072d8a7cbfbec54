//! Configuration: loads optional ~/.patchwire/config.yaml.
//!
//! Every section and field has a default, so a partial file (or none at
//! all) is fine.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codegen::CompileContext;
use crate::midi::MidiConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub midi: MidiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Tempo used by beat conversions.
    pub bpm: f64,
    /// Base seed for `noise()`. Same seed, same noise.
    pub noise_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            bpm: 120.0,
            noise_seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    pub fn compile_context(&self) -> CompileContext {
        CompileContext::new(self.sample_rate as f64, self.bpm).with_noise_seed(self.noise_seed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Master volume, 0.0 to 1.0.
    pub volume: f32,
    /// Limiter ceiling, in `(0.0, 1.0]`.
    pub ceiling: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 0.8,
            ceiling: 0.95,
        }
    }
}

/// `~/.patchwire/config.yaml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".patchwire").join("config.yaml"))
}

impl Config {
    /// Load from the standard path. Falls back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, io::Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(io::Error::other)?;
        std::fs::write(path, yaml)
    }
}
