//! The language's value model.
//!
//! [`Value`] is the compile-time handle the code generator passes around: a
//! number (constant or register, always with a [`Form`]), a MIDI register, a
//! tuple of values, or an array register. The `expect_*` helpers are the one
//! type-checking gate; there is no implicit coercion between kinds.

pub mod convert;
pub mod form;
pub mod midi;
pub mod sample;
pub mod types;

pub use convert::{Conversion, ConverterRegistry, ConvertEnv};
pub use form::{Form, FormKind};
pub use midi::{MidiBuffer, MidiEvent, MidiKind, MIDI_CAPACITY};
pub use sample::Sample;
pub use types::{Type, TypeId, TypeInterner};

use crate::codegen::ir::{ArrayReg, MidiReg, NumReg};
use crate::lang::error::{CompileError, Span};

/// Number of elements in every array value.
pub const ARRAY_SIZE: usize = 8;

/// Where a number lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumRepr {
    Const(Sample),
    Reg(NumReg),
}

/// A stereo number with its form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Num {
    pub form: Form,
    pub repr: NumRepr,
}

impl Num {
    pub fn constant(value: Sample, form: Form) -> Self {
        Self {
            form,
            repr: NumRepr::Const(value),
        }
    }

    pub fn reg(reg: NumReg, form: Form) -> Self {
        Self {
            form,
            repr: NumRepr::Reg(reg),
        }
    }

    pub fn as_const(&self) -> Option<Sample> {
        match self.repr {
            NumRepr::Const(value) => Some(value),
            NumRepr::Reg(_) => None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    pub fn with_form(self, form: Form) -> Self {
        Self { form, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Midi {
    pub reg: MidiReg,
}

/// An array register. Elements are numbers of the recorded form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Array {
    pub reg: ArrayReg,
    pub form: Form,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(Num),
    Midi(Midi),
    Tuple(Vec<Value>),
    Array(Array),
}

impl Value {
    pub fn constant(value: f32) -> Self {
        Value::Num(Num::constant(Sample::splat(value), Form::LINEAR))
    }

    pub fn unit() -> Self {
        Value::Tuple(Vec::new())
    }

    /// Whether the whole value is known at compile time.
    pub fn is_const(&self) -> bool {
        match self {
            Value::Num(num) => num.is_const(),
            Value::Tuple(items) => items.iter().all(Value::is_const),
            Value::Midi(_) | Value::Array(_) => false,
        }
    }

    pub fn type_id(&self, types: &mut TypeInterner) -> TypeId {
        match self {
            Value::Num(_) => TypeId::NUM,
            Value::Midi(_) => TypeId::MIDI,
            Value::Tuple(items) => {
                let elems = items.iter().map(|item| item.type_id(types)).collect();
                types.tuple(elems)
            }
            Value::Array(_) => types.array(TypeId::NUM),
        }
    }

    /// Short type name for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Num(num) => format!("num{}", num.form),
            Value::Midi(_) => "midi".to_string(),
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Value::describe).collect();
                format!("({})", inner.join(", "))
            }
            Value::Array(_) => format!("[num; {ARRAY_SIZE}]"),
        }
    }

    pub fn expect_num(self, span: Span) -> Result<Num, CompileError> {
        match self {
            Value::Num(num) => Ok(num),
            other => Err(CompileError::type_mismatch("num", &other.describe(), span)),
        }
    }

    pub fn expect_midi(self, span: Span) -> Result<Midi, CompileError> {
        match self {
            Value::Midi(midi) => Ok(midi),
            other => Err(CompileError::type_mismatch("midi", &other.describe(), span)),
        }
    }

    pub fn expect_tuple(self, span: Span) -> Result<Vec<Value>, CompileError> {
        match self {
            Value::Tuple(items) => Ok(items),
            other => Err(CompileError::type_mismatch("tuple", &other.describe(), span)),
        }
    }

    pub fn expect_array(self, span: Span) -> Result<Array, CompileError> {
        match self {
            Value::Array(array) => Ok(array),
            other => Err(CompileError::type_mismatch("array", &other.describe(), span)),
        }
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Self {
        Value::Num(num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::error::ErrorKind;

    #[test]
    fn expect_num_names_both_types() {
        let midi = Value::Midi(Midi { reg: MidiReg(0) });
        let err = midi.expect_num(Span::new(3, 7, 1, 4)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codegen);
        assert!(err.message.contains("num"));
        assert!(err.message.contains("midi"));
        assert_eq!(err.span.start, 3);
    }

    #[test]
    fn tuple_types_are_structural() {
        let mut types = TypeInterner::new();
        let a = Value::Tuple(vec![Value::constant(1.0), Value::Midi(Midi { reg: MidiReg(0) })]);
        let b = Value::Tuple(vec![Value::constant(5.0), Value::Midi(Midi { reg: MidiReg(3) })]);
        assert_eq!(a.type_id(&mut types), b.type_id(&mut types));
        assert_ne!(a.type_id(&mut types), Value::constant(1.0).type_id(&mut types));
    }

    #[test]
    fn constness() {
        assert!(Value::constant(2.0).is_const());
        assert!(Value::Tuple(vec![Value::constant(1.0)]).is_const());
        let reg = Value::Num(Num::reg(NumReg(0), Form::LINEAR));
        assert!(!Value::Tuple(vec![Value::constant(1.0), reg]).is_const());
    }

    #[test]
    fn describe_includes_form() {
        let freq = Value::Num(Num::constant(Sample::splat(1.0), Form::new(FormKind::Frequency)));
        assert_eq!(freq.describe(), "num[frequency]");
        assert_eq!(Value::unit().describe(), "()");
    }
}
