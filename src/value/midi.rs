//! MIDI-like events and the fixed-capacity buffer that carries them.

use serde::{Deserialize, Serialize};

/// Maximum number of events a MIDI value holds in one sample.
pub const MIDI_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidiKind {
    #[default]
    NoteOff,
    NoteOn,
    PolyAftertouch,
    ControlChange,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
}

/// One event. For pitch bend, `note` is the low 7 bits and `param` the high
/// 7 bits. `time` is the frame offset within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MidiEvent {
    pub kind: MidiKind,
    pub channel: u8,
    pub note: u8,
    pub param: u8,
    #[serde(default)]
    pub time: u32,
}

impl MidiEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: MidiKind::NoteOn,
            channel,
            note,
            param: velocity,
            time: 0,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            kind: MidiKind::NoteOff,
            channel,
            note,
            param: 0,
            time: 0,
        }
    }

    /// `value` is the 14-bit wheel position, 8192 = centre.
    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        Self {
            kind: MidiKind::PitchBend,
            channel,
            note: (value & 0x7F) as u8,
            param: ((value >> 7) & 0x7F) as u8,
            time: 0,
        }
    }

    pub fn aftertouch(channel: u8, pressure: u8) -> Self {
        Self {
            kind: MidiKind::ChannelAftertouch,
            channel,
            note: 0,
            param: pressure,
            time: 0,
        }
    }

    pub fn at(self, time: u32) -> Self {
        Self { time, ..self }
    }

    /// A note-on with zero velocity counts as a note-off.
    pub fn is_note_off(&self) -> bool {
        self.kind == MidiKind::NoteOff || (self.kind == MidiKind::NoteOn && self.param == 0)
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == MidiKind::NoteOn && self.param > 0
    }

    pub fn bend_value(&self) -> u16 {
        (self.param as u16) << 7 | self.note as u16
    }
}

/// A bounded, ordered run of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiBuffer {
    events: [MidiEvent; MIDI_CAPACITY],
    count: usize,
}

impl MidiBuffer {
    pub const EMPTY: MidiBuffer = MidiBuffer {
        events: [MidiEvent {
            kind: MidiKind::NoteOff,
            channel: 0,
            note: 0,
            param: 0,
            time: 0,
        }; MIDI_CAPACITY],
        count: 0,
    };

    /// Append an event. Returns false and drops it when full.
    pub fn push(&mut self, event: MidiEvent) -> bool {
        if self.count == MIDI_CAPACITY {
            return false;
        }
        self.events[self.count] = event;
        self.count += 1;
        true
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events[..self.count]
    }

    pub fn as_mut_slice(&mut self) -> &mut [MidiEvent] {
        &mut self.events[..self.count]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.as_slice().iter()
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        MidiBuffer::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full() {
        let mut buffer = MidiBuffer::default();
        for i in 0..MIDI_CAPACITY {
            assert!(buffer.push(MidiEvent::note_on(0, i as u8, 100)));
        }
        assert!(!buffer.push(MidiEvent::note_on(0, 99, 100)));
        assert_eq!(buffer.len(), MIDI_CAPACITY);
        assert_eq!(buffer.as_slice()[3].note, 3);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn pitch_bend_packs_fourteen_bits() {
        let event = MidiEvent::pitch_bend(2, 8192);
        assert_eq!(event.bend_value(), 8192);
        assert_eq!(MidiEvent::pitch_bend(0, 16383).bend_value(), 16383);
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        assert!(MidiEvent::note_on(0, 60, 0).is_note_off());
        assert!(!MidiEvent::note_on(0, 60, 1).is_note_off());
    }
}
