//! MIDI reducers: `note`, `voices` and `transpose`.

use crate::codegen::ir::{Instr, SlotKind};
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{Form, FormKind, Midi, MidiBuffer, MidiKind, Num, Sample, Value};

use super::arrays::next_num;
use super::{Builtin, Catalogue, Param};

pub fn register(catalogue: &mut Catalogue) {
    catalogue.add(Builtin::emit("note", vec![Param::midi("midi")], note));
    catalogue.add(Builtin::emit("voices", vec![Param::midi("midi")], voices));
    catalogue.add(Builtin::emit(
        "transpose",
        vec![Param::midi("midi"), Param::num("semitones")],
        transpose,
    ));
}

fn next_midi(args: &mut impl Iterator<Item = Value>, span: Span) -> Result<Midi, CompileError> {
    args.next().unwrap_or_else(Value::unit).expect_midi(span)
}

fn note(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let midi = next_midi(&mut args.into_iter(), span)?;
    let slot = gen.builder.slot(SlotKind::Voices);
    let dst = [(); 5].map(|_| gen.builder.num_reg());
    gen.builder.emit(Instr::Note {
        dst,
        midi: midi.reg,
        slot,
    });

    let forms = [
        Form::new(FormKind::Note),
        Form::LINEAR,
        Form::LINEAR,
        Form::LINEAR,
        Form::LINEAR,
    ];
    let items = dst
        .into_iter()
        .zip(forms)
        .map(|(reg, form)| Value::Num(Num::reg(reg, form)))
        .collect();
    Ok(Value::Tuple(items))
}

fn voices(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let midi = next_midi(&mut args.into_iter(), span)?;
    let slot = gen.builder.slot(SlotKind::Voices);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Voices {
        dst,
        midi: midi.reg,
        slot,
    });
    Ok(Num::reg(dst, Form::LINEAR).into())
}

fn transpose(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let midi = next_midi(&mut args, span)?;
    let semitones = next_num(&mut args, span)?;
    let semitones = gen.builder.materialize(&semitones);
    let dst = gen.builder.midi_reg();
    gen.builder.emit(Instr::Transpose {
        dst,
        src: midi.reg,
        semitones,
    });
    Ok(Value::Midi(Midi { reg: dst }))
}

/// Shift the note number of every note-carrying event, clamped to 0..=127.
pub fn transpose_events(src: &MidiBuffer, semitones: f32) -> MidiBuffer {
    let shift = semitones.round() as i32;
    let mut out = *src;
    for event in out.as_mut_slice() {
        if matches!(
            event.kind,
            MidiKind::NoteOn | MidiKind::NoteOff | MidiKind::PolyAftertouch
        ) {
            event.note = (event.note as i32 + shift).clamp(0, 127) as u8;
        }
    }
    out
}

/// Last note, velocity, bend and aftertouch seen, plus a signed count of
/// held voices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceState {
    pub note: f32,
    pub velocity: f32,
    pub bend: f32,
    pub aftertouch: f32,
    pub voices: i32,
}

impl Default for VoiceState {
    fn default() -> Self {
        Self {
            note: 60.0,
            velocity: 0.0,
            bend: 0.0,
            aftertouch: 0.0,
            voices: 0,
        }
    }
}

impl VoiceState {
    pub fn update(&mut self, events: &MidiBuffer) {
        for event in events.iter() {
            if event.is_note_on() {
                self.note = event.note as f32;
                self.velocity = event.param as f32 / 127.0;
                self.voices += 1;
            } else if event.is_note_off() {
                self.voices -= 1;
            } else {
                match event.kind {
                    MidiKind::PitchBend => {
                        self.bend = (event.bend_value() as f32 - 8192.0) / 8192.0;
                    }
                    MidiKind::ChannelAftertouch | MidiKind::PolyAftertouch => {
                        self.aftertouch = event.param as f32 / 127.0;
                    }
                    _ => {}
                }
            }
        }
    }

    pub fn gate(&self) -> f32 {
        if self.voices > 0 {
            1.0
        } else {
            0.0
        }
    }

    /// `(note, velocity, gate, bend, aftertouch)`.
    pub fn outputs(&self) -> [Sample; 5] {
        [
            Sample::splat(self.note),
            Sample::splat(self.velocity),
            Sample::splat(self.gate()),
            Sample::splat(self.bend),
            Sample::splat(self.aftertouch),
        ]
    }
}
