//! Commands sent from the control thread to the audio thread via ring buffer.

use crate::graph::ControlId;
use crate::value::MidiEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    /// Deliver an event to a MIDI control at the start of the next block.
    Midi { control: ControlId, event: MidiEvent },

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),

    /// Silence the output without stopping the program.
    Mute(bool),

    /// Drop every event still waiting in the runtime queue.
    ClearEvents,
}
