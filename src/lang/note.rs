//! Note literals: converts "C4", "F#3" to MIDI note numbers and back.

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Parse a note literal into a MIDI note number.
///
/// Format: `<letter><optional #><octave>` with letter `A`–`G` and a
/// non-negative octave. C4 = middle C = 60, A4 = 69.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars().peekable();

    let base: i32 = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let sharp = if chars.peek() == Some(&'#') {
        chars.next();
        1
    } else {
        0
    };

    let octave_str: String = chars.collect();
    if octave_str.is_empty() || !octave_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;

    let midi = (octave + 1) * 12 + base + sharp;
    if (0..=127).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Whether `text` has the shape of a note literal, valid or not.
pub fn looks_like_note(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.is_empty() || !(b'A'..=b'G').contains(&bytes[0]) {
        return false;
    }
    let rest = if bytes.get(1) == Some(&b'#') {
        &bytes[2..]
    } else {
        &bytes[1..]
    };
    !rest.is_empty() && rest.iter().all(u8::is_ascii_digit)
}

/// Render a MIDI note number as a note literal. Notes below C0 have no
/// literal form and return `None`.
pub fn note_name(midi: u8) -> Option<String> {
    if midi < 12 {
        return None;
    }
    let octave = midi as i32 / 12 - 1;
    Some(format!("{}{}", NAMES[midi as usize % 12], octave))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_c() {
        assert_eq!(parse_note_name("C4"), Some(60));
    }

    #[test]
    fn a4_concert() {
        assert_eq!(parse_note_name("A4"), Some(69));
    }

    #[test]
    fn f_sharp_3() {
        assert_eq!(parse_note_name("F#3"), Some(54));
    }

    #[test]
    fn g9_max() {
        assert_eq!(parse_note_name("G9"), Some(127));
        assert_eq!(parse_note_name("G#9"), None);
    }

    #[test]
    fn rejects_flats_and_bad_letters() {
        assert_eq!(parse_note_name("Eb4"), None);
        assert_eq!(parse_note_name("X4"), None);
        assert_eq!(parse_note_name("C"), None);
    }

    #[test]
    fn shape_detection() {
        assert!(looks_like_note("C#4"));
        assert!(looks_like_note("G12"));
        assert!(!looks_like_note("Cat"));
        assert!(!looks_like_note("c4"));
        assert!(!looks_like_note("D#"));
    }

    #[test]
    fn names_round_trip() {
        for midi in 12..=127u8 {
            let name = note_name(midi).unwrap();
            assert_eq!(parse_note_name(&name), Some(midi), "{name}");
        }
        assert_eq!(note_name(11), None);
    }
}
