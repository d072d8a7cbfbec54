//! Raw MIDI bytes to [`MidiEvent`].

use crate::value::{MidiEvent, MidiKind};

/// Parse one raw MIDI message.
///
/// Format:
/// - Note Off:   [0x80 | channel, note, velocity]
/// - Note On:    [0x90 | channel, note, velocity]
/// - Poly AT:    [0xA0 | channel, note, pressure]
/// - CC:         [0xB0 | channel, controller, value]
/// - Program:    [0xC0 | channel, program]
/// - Channel AT: [0xD0 | channel, pressure]
/// - Pitch bend: [0xE0 | channel, lsb, msb]
///
/// System messages, truncated messages and messages on other channels than
/// `channel_filter` yield `None`.
pub fn parse_message(msg: &[u8], channel_filter: Option<u8>) -> Option<MidiEvent> {
    let (&status, data) = msg.split_first()?;
    if status < 0x80 || status >= 0xF0 {
        return None;
    }
    let channel = status & 0x0F;
    if channel_filter.is_some_and(|filter| filter != channel) {
        return None;
    }

    let (kind, note, param) = match (status & 0xF0, data) {
        (0x80, [note, _, ..]) => (MidiKind::NoteOff, *note, 0),
        // Velocity 0 is kept as a note-on; consumers treat it as a note-off.
        (0x90, [note, velocity, ..]) => (MidiKind::NoteOn, *note, *velocity),
        (0xA0, [note, pressure, ..]) => (MidiKind::PolyAftertouch, *note, *pressure),
        (0xB0, [controller, value, ..]) => (MidiKind::ControlChange, *controller, *value),
        (0xC0, [program, ..]) => (MidiKind::ProgramChange, 0, *program),
        (0xD0, [pressure, ..]) => (MidiKind::ChannelAftertouch, 0, *pressure),
        (0xE0, [lsb, msb, ..]) => (MidiKind::PitchBend, *lsb, *msb),
        _ => return None,
    };

    Some(MidiEvent {
        kind,
        channel,
        note: note & 0x7F,
        param: param & 0x7F,
        time: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_and_off() {
        let on = parse_message(&[0x92, 60, 100], None).unwrap();
        assert_eq!(on, MidiEvent::note_on(2, 60, 100));
        let off = parse_message(&[0x82, 60, 40], None).unwrap();
        assert_eq!(off, MidiEvent::note_off(2, 60));
    }

    #[test]
    fn zero_velocity_note_on_reads_as_off() {
        let event = parse_message(&[0x90, 60, 0], None).unwrap();
        assert!(event.is_note_off());
    }

    #[test]
    fn pitch_bend_keeps_both_bytes() {
        let event = parse_message(&[0xE0, 0x00, 0x40], None).unwrap();
        assert_eq!(event.kind, MidiKind::PitchBend);
        assert_eq!(event.bend_value(), 8192);
    }

    #[test]
    fn two_byte_messages() {
        let program = parse_message(&[0xC1, 5], None).unwrap();
        assert_eq!((program.kind, program.param), (MidiKind::ProgramChange, 5));
        let pressure = parse_message(&[0xD0, 90], None).unwrap();
        assert_eq!(pressure, MidiEvent::aftertouch(0, 90));
    }

    #[test]
    fn channel_filter_drops_other_channels() {
        assert!(parse_message(&[0x91, 60, 100], Some(0)).is_none());
        assert!(parse_message(&[0x90, 60, 100], Some(0)).is_some());
    }

    #[test]
    fn rejects_truncated_and_system_messages() {
        assert!(parse_message(&[], None).is_none());
        assert!(parse_message(&[0x90, 60], None).is_none());
        assert!(parse_message(&[0xF8], None).is_none());
        assert!(parse_message(&[0x40, 1, 2], None).is_none());
    }
}
