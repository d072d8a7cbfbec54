//! Controls: named, typed slots through which nodes exchange values.

use std::fmt;

use crate::lang::ast::ControlKind;
use crate::value::{MidiBuffer, Sample, ARRAY_SIZE};

use super::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub u32);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identity of a control within its node: name plus kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub name: String,
    pub kind: ControlKind,
}

impl ControlKey {
    pub fn new(name: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind.name())
    }
}

/// Physical cell type a control needs. Only controls of the same class
/// can share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Num,
    Midi,
    Array,
}

impl ControlKind {
    pub fn storage_class(self) -> StorageClass {
        match self {
            ControlKind::Knob | ControlKind::Toggle | ControlKind::Num | ControlKind::Output => {
                StorageClass::Num
            }
            ControlKind::Midi => StorageClass::Midi,
            ControlKind::Graph => StorageClass::Array,
        }
    }

    /// Set from the editor rather than written by source.
    pub fn is_editable(self) -> bool {
        matches!(self, ControlKind::Knob | ControlKind::Toggle | ControlKind::Graph)
    }

    /// May be assigned by node source.
    pub fn is_writable(self) -> bool {
        matches!(self, ControlKind::Num | ControlKind::Midi | ControlKind::Output)
    }

    pub fn default_value(self) -> ControlValue {
        match self {
            ControlKind::Knob | ControlKind::Toggle => ControlValue::Num(Sample::ZERO),
            ControlKind::Num | ControlKind::Output => ControlValue::Num(Sample::SILENT),
            ControlKind::Midi => ControlValue::Midi(MidiBuffer::EMPTY),
            ControlKind::Graph => ControlValue::Array([Sample::ZERO; ARRAY_SIZE]),
        }
    }
}

/// A control's current value as seen by the editor or host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Num(Sample),
    Midi(MidiBuffer),
    Array([Sample; ARRAY_SIZE]),
}

impl ControlValue {
    pub fn storage_class(&self) -> StorageClass {
        match self {
            ControlValue::Num(_) => StorageClass::Num,
            ControlValue::Midi(_) => StorageClass::Midi,
            ControlValue::Array(_) => StorageClass::Array,
        }
    }

    pub fn as_num(&self) -> Option<Sample> {
        match self {
            ControlValue::Num(sample) => Some(*sample),
            _ => None,
        }
    }
}

impl From<f32> for ControlValue {
    fn from(value: f32) -> Self {
        ControlValue::Num(Sample::splat(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: ControlId,
    pub key: ControlKey,
    pub node: NodeId,
    /// Created because source referenced it; pruned once unused.
    pub auto: bool,
    /// Knob range `[min, max]`.
    pub range: (f64, f64),
    /// Editor value, harvested from live storage before each recompile.
    pub value: ControlValue,
    /// For controls on group nodes: the inner control this one exposes.
    pub forwards: Option<ControlId>,
}

impl Control {
    pub fn new(id: ControlId, key: ControlKey, node: NodeId, auto: bool) -> Self {
        let value = key.kind.default_value();
        Self {
            id,
            key,
            node,
            auto,
            range: (0.0, 1.0),
            value,
            forwards: None,
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.key.kind
    }
}
