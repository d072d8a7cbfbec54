//! MIDI controller support: external hardware/software MIDI input.

pub mod config;
pub mod input;
pub mod message;

pub use config::MidiConfig;
pub use input::MidiInput;
pub use message::parse_message;
