//! Program storage: an arena of typed cells addressed by slot index.

use log::debug;

use crate::builtins::delay::DelayLine;
use crate::builtins::filters::BiquadState;
use crate::builtins::gates::{AccumState, HoldState};
use crate::builtins::midi::VoiceState;
use crate::builtins::oscillators::{NoiseState, PhaseState};
use crate::codegen::ir::SlotKind;
use crate::graph::control::ControlValue;
use crate::value::{MidiBuffer, Sample, ARRAY_SIZE};

#[derive(Debug, Clone)]
pub enum Cell {
    Num(Sample),
    Midi(MidiBuffer),
    Array([Sample; ARRAY_SIZE]),
    Phase(PhaseState),
    Noise(NoiseState),
    Biquad(BiquadState),
    Delay(DelayLine),
    Hold(HoldState),
    Accum(AccumState),
    Voices(VoiceState),
}

impl Cell {
    fn new(kind: SlotKind) -> Self {
        match kind {
            SlotKind::Num => Cell::Num(Sample::SILENT),
            SlotKind::Midi => Cell::Midi(MidiBuffer::EMPTY),
            SlotKind::Array => Cell::Array([Sample::ZERO; ARRAY_SIZE]),
            SlotKind::Phase => Cell::Phase(PhaseState::default()),
            SlotKind::Noise { seed } => Cell::Noise(NoiseState::new(seed)),
            SlotKind::Biquad => Cell::Biquad(BiquadState::default()),
            SlotKind::Delay { len } => Cell::Delay(DelayLine::new(len)),
            SlotKind::Hold => Cell::Hold(HoldState::default()),
            SlotKind::Accum => Cell::Accum(AccumState::default()),
            SlotKind::Voices => Cell::Voices(VoiceState::default()),
        }
    }
}

/// Storage for one program. Built once per layout; nothing here allocates
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    layout: Vec<SlotKind>,
    cells: Vec<Cell>,
}

impl Storage {
    pub fn construct(layout: &[SlotKind]) -> Self {
        Self {
            layout: layout.to_vec(),
            cells: layout.iter().map(|kind| Cell::new(*kind)).collect(),
        }
    }

    pub fn layout(&self) -> &[SlotKind] {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `layout` describes exactly this storage, slot for slot.
    pub fn has_layout(&self, layout: &[SlotKind]) -> bool {
        self.layout == layout
    }

    pub fn cell_mut(&mut self, slot: u32) -> Option<&mut Cell> {
        self.cells.get_mut(slot as usize)
    }

    pub fn num(&self, slot: u32) -> Sample {
        match self.cells.get(slot as usize) {
            Some(Cell::Num(value)) => *value,
            _ => Sample::SILENT,
        }
    }

    pub fn set_num(&mut self, slot: u32, value: Sample) {
        if let Some(Cell::Num(cell)) = self.cells.get_mut(slot as usize) {
            *cell = value;
        }
    }

    pub fn midi(&self, slot: u32) -> Option<&MidiBuffer> {
        match self.cells.get(slot as usize) {
            Some(Cell::Midi(buffer)) => Some(buffer),
            _ => None,
        }
    }

    pub fn midi_mut(&mut self, slot: u32) -> Option<&mut MidiBuffer> {
        match self.cells.get_mut(slot as usize) {
            Some(Cell::Midi(buffer)) => Some(buffer),
            _ => None,
        }
    }

    pub fn array(&self, slot: u32) -> Option<&[Sample; ARRAY_SIZE]> {
        match self.cells.get(slot as usize) {
            Some(Cell::Array(array)) => Some(array),
            _ => None,
        }
    }

    /// Copy a value cell. Only slots of the same kind are copied.
    pub fn copy(&mut self, from: u32, to: u32) {
        let value = match self.cells.get(from as usize) {
            Some(Cell::Num(v)) => Cell::Num(*v),
            Some(Cell::Midi(v)) => Cell::Midi(*v),
            Some(Cell::Array(v)) => Cell::Array(*v),
            _ => return,
        };
        if let Some(target) = self.cells.get_mut(to as usize) {
            if std::mem::discriminant(target) == std::mem::discriminant(&value) {
                *target = value;
            }
        }
    }

    /// A control's value as stored in `slot`.
    pub fn read(&self, slot: u32) -> Option<ControlValue> {
        match self.cells.get(slot as usize)? {
            Cell::Num(v) => Some(ControlValue::Num(*v)),
            Cell::Midi(v) => Some(ControlValue::Midi(*v)),
            Cell::Array(v) => Some(ControlValue::Array(*v)),
            _ => None,
        }
    }

    /// Store a control value. Returns false when the slot holds another kind.
    pub fn write(&mut self, slot: u32, value: ControlValue) -> bool {
        match (self.cells.get_mut(slot as usize), value) {
            (Some(Cell::Num(cell)), ControlValue::Num(v)) => *cell = v,
            (Some(Cell::Midi(cell)), ControlValue::Midi(v)) => *cell = v,
            (Some(Cell::Array(cell)), ControlValue::Array(v)) => *cell = v,
            _ => return false,
        }
        true
    }

    /// Hook run on storage a new layout replaces.
    pub fn release(self) {
        let buffered: usize = self
            .cells
            .iter()
            .map(|cell| match cell {
                Cell::Delay(line) => line.len(),
                _ => 0,
            })
            .sum();
        debug!(
            "released storage: {} slots, {} buffered samples",
            self.cells.len(),
            buffered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_follows_layout() {
        let layout = [SlotKind::Num, SlotKind::Delay { len: 4 }, SlotKind::Midi];
        let storage = Storage::construct(&layout);
        assert_eq!(storage.len(), 3);
        assert!(storage.has_layout(&layout));
        assert!(!storage.has_layout(&[SlotKind::Num]));
        assert!(!storage.num(0).active);
        assert!(storage.midi(2).is_some());
        assert!(storage.midi(0).is_none());
    }

    #[test]
    fn write_checks_kind() {
        let mut storage = Storage::construct(&[SlotKind::Num, SlotKind::Array]);
        assert!(storage.write(0, ControlValue::from(0.5)));
        assert!(!storage.write(1, ControlValue::from(0.5)));
        assert!(!storage.write(7, ControlValue::from(0.5)));
        assert_eq!(storage.read(0), Some(ControlValue::from(0.5)));
    }

    #[test]
    fn copy_between_value_cells() {
        let mut storage = Storage::construct(&[SlotKind::Num, SlotKind::Num, SlotKind::Phase]);
        storage.set_num(0, Sample::splat(3.0));
        storage.copy(0, 1);
        assert_eq!(storage.num(1), Sample::splat(3.0));
        storage.copy(0, 2);
        assert!(matches!(storage.cell_mut(2), Some(Cell::Phase(_))));
    }
}
