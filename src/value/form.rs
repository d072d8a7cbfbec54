//! Forms: the unit tag carried by every numeric value.

use std::fmt;

/// The fixed set of unit tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormKind {
    Linear,
    /// A 0..1 value that maps onto `[min, max]`.
    Control,
    Frequency,
    Note,
    Decibel,
    Q,
    Resonance,
    Seconds,
    Beats,
    Samples,
    Oscillator,
}

impl FormKind {
    pub const ALL: [FormKind; 11] = [
        FormKind::Linear,
        FormKind::Control,
        FormKind::Frequency,
        FormKind::Note,
        FormKind::Decibel,
        FormKind::Q,
        FormKind::Resonance,
        FormKind::Seconds,
        FormKind::Beats,
        FormKind::Samples,
        FormKind::Oscillator,
    ];

    pub fn from_name(name: &str) -> Option<FormKind> {
        FormKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            FormKind::Linear => "linear",
            FormKind::Control => "control",
            FormKind::Frequency => "frequency",
            FormKind::Note => "note",
            FormKind::Decibel => "decibel",
            FormKind::Q => "q",
            FormKind::Resonance => "resonance",
            FormKind::Seconds => "seconds",
            FormKind::Beats => "beats",
            FormKind::Samples => "samples",
            FormKind::Oscillator => "oscillator",
        }
    }
}

/// A form tag plus its two parameters. Unused parameters are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub params: [f64; 2],
}

impl Form {
    pub const LINEAR: Form = Form {
        kind: FormKind::Linear,
        params: [0.0, 0.0],
    };

    pub fn new(kind: FormKind) -> Self {
        Self {
            kind,
            params: [0.0, 0.0],
        }
    }

    pub fn with_params(kind: FormKind, params: [f64; 2]) -> Self {
        Self { kind, params }
    }

    /// The form of a knob value mapping 0..1 onto `min..max`.
    pub fn control(min: f64, max: f64) -> Self {
        Self::with_params(FormKind::Control, [min, max])
    }

    pub fn is_linear(&self) -> bool {
        self.kind == FormKind::Linear
    }
}

impl Default for Form {
    fn default() -> Self {
        Form::LINEAR
    }
}

impl From<FormKind> for Form {
    fn from(kind: FormKind) -> Self {
        Form::new(kind)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FormKind::Control => write!(
                f,
                "[{} {}, {}]",
                self.kind.name(),
                self.params[0],
                self.params[1]
            ),
            kind => write!(f, "[{}]", kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in FormKind::ALL {
            assert_eq!(FormKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FormKind::from_name("volts"), None);
    }

    #[test]
    fn forms_compare_by_tag_and_params() {
        assert_eq!(Form::control(0.0, 1.0), Form::control(0.0, 1.0));
        assert_ne!(Form::control(0.0, 1.0), Form::control(0.0, 2.0));
        assert_ne!(Form::new(FormKind::Seconds), Form::new(FormKind::Beats));
    }

    #[test]
    fn display() {
        assert_eq!(Form::control(20.0, 2000.0).to_string(), "[control 20, 2000]");
        assert_eq!(Form::new(FormKind::Decibel).to_string(), "[decibel]");
    }
}
