//! Hot-reload runtime.
//!
//! [`Runtime`] owns the editable patch and the deployed engine behind two
//! mutexes. Editing and compiling take the session lock; the engine lock is
//! taken by sample generation, control I/O and the program swap, so every
//! sample runs against either the whole old or the whole new program. The
//! session lock is always taken first.

pub mod machine;
pub mod program;
pub mod reload;
pub mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use thiserror::Error;

use crate::codegen::CompileContext;
use crate::graph::{ControlId, ControlValue, GraphError, NodeId, Patch, SurfaceId};
use crate::lang::ast::ControlKind;
use crate::lang::CompileError;
use crate::value::{MidiEvent, Sample};

pub use machine::Machine;
pub use program::{Program, Step};
pub use reload::{Carryover, HotReload, ReloadState};
pub use storage::{Cell, Storage};

/// Pending events beyond this many are dropped.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("a reload is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Session {
    patch: Patch,
    ctx: CompileContext,
    reload: HotReload,
}

/// A MIDI event addressed to a control, `event.time` frames from now.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    control: ControlId,
    event: MidiEvent,
}

/// The deployed program and everything the audio side touches.
pub struct Engine {
    program: Program,
    storage: Storage,
    machine: Machine,
    events: Vec<Pending>,
}

impl Engine {
    fn new(sample_rate: f64) -> Self {
        let program = Program::default();
        Self {
            machine: Machine::new(program.regs, sample_rate),
            storage: Storage::construct(&program.layout),
            program,
            events: Vec::with_capacity(EVENT_CAPACITY),
        }
    }

    fn read(&self, control: ControlId) -> Option<ControlValue> {
        self.program
            .primary_slot(control)
            .and_then(|slot| self.storage.read(slot))
    }

    fn write(&mut self, control: ControlId, value: ControlValue) {
        if let Some(slots) = self.program.control_slots.get(&control) {
            for slot in slots {
                self.storage.write(*slot, value);
            }
        }
    }

    fn push_midi(&mut self, control: ControlId, event: MidiEvent) -> bool {
        let Some(slots) = self.program.control_slots.get(&control) else {
            return false;
        };
        let mut delivered = true;
        for slot in slots {
            if let Some(buffer) = self.storage.midi_mut(*slot) {
                delivered &= buffer.push(event.at(0));
            }
        }
        delivered
    }

    /// One sample. Delivers events due at `frame`, runs the program and
    /// sums the root outputs.
    fn tick(&mut self, frame: u32) -> Sample {
        for i in 0..self.events.len() {
            let pending = self.events[i];
            if pending.event.time == frame && !self.push_midi(pending.control, pending.event) {
                warn!("MIDI buffer of {} is full; event dropped", pending.control);
            }
        }

        self.machine
            .run(&self.program.steps, &mut self.storage, 0);

        let mut out = [0.0f32; 2];
        for slot in &self.program.outputs {
            let value = self.storage.num(*slot);
            if value.active {
                out[0] += value.left;
                out[1] += value.right;
            }
        }
        for slot in &self.program.midi_inputs {
            if let Some(buffer) = self.storage.midi_mut(*slot) {
                buffer.clear();
            }
        }
        Sample::stereo(out[0], out[1])
    }

    /// Drop delivered events and shift the rest into the next block.
    fn age_events(&mut self, frames: u32) {
        self.events.retain_mut(|pending| {
            if pending.event.time < frames {
                return false;
            }
            pending.event.time -= frames;
            true
        });
    }
}

pub struct Runtime {
    session: Mutex<Session>,
    engine: Mutex<Engine>,
}

impl Runtime {
    pub fn new(ctx: CompileContext) -> Self {
        let sample_rate = ctx.sample_rate;
        Self {
            session: Mutex::new(Session {
                patch: Patch::new(),
                ctx,
                reload: HotReload::new(),
            }),
            engine: Mutex::new(Engine::new(sample_rate)),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        lock(&self.session).ctx.sample_rate
    }

    /// Read access to the patch.
    pub fn with_patch<R>(&self, f: impl FnOnce(&Patch) -> R) -> R {
        f(&lock(&self.session).patch)
    }

    /// A copy of the patch carrying the live editable values.
    pub fn snapshot(&self) -> Patch {
        let session = lock(&self.session);
        let mut patch = session.patch.clone();
        self.harvest(&mut patch);
        patch
    }

    fn edit<R>(
        &self,
        f: impl FnOnce(&mut Patch) -> std::result::Result<R, GraphError>,
    ) -> Result<R> {
        Ok(f(&mut lock(&self.session).patch)?)
    }

    pub fn root(&self) -> SurfaceId {
        self.with_patch(Patch::root)
    }

    // --- Graph editing ---

    pub fn create_node(&self, surface: SurfaceId, name: &str) -> Result<NodeId> {
        self.edit(|patch| patch.create_node(surface, name))
    }

    pub fn create_group(&self, surface: SurfaceId, name: &str) -> Result<(NodeId, SurfaceId)> {
        self.edit(|patch| patch.create_group(surface, name))
    }

    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        self.edit(|patch| patch.remove_node(node))
    }

    pub fn set_source(&self, node: NodeId, source: &str) -> Result<()> {
        self.edit(|patch| patch.set_source(node, source))
    }

    pub fn create_control(&self, node: NodeId, name: &str, kind: ControlKind) -> Result<ControlId> {
        self.edit(|patch| patch.create_control(node, name, kind))
    }

    pub fn remove_control(&self, control: ControlId) -> Result<()> {
        self.edit(|patch| patch.remove_control(control))
    }

    pub fn rename_control(&self, control: ControlId, name: &str) -> Result<()> {
        self.edit(|patch| patch.rename_control(control, name))
    }

    pub fn set_knob_range(&self, control: ControlId, min: f64, max: f64) -> Result<()> {
        self.edit(|patch| patch.set_knob_range(control, min, max))
    }

    pub fn connect(&self, a: ControlId, b: ControlId) -> Result<()> {
        self.edit(|patch| patch.connect(a, b))
    }

    pub fn disconnect(&self, a: ControlId, b: ControlId) -> Result<()> {
        self.edit(|patch| patch.disconnect(a, b))
    }

    pub fn expose(&self, inner: ControlId) -> Result<ControlId> {
        self.edit(|patch| patch.expose(inner))
    }

    pub fn unexpose(&self, inner: ControlId) -> Result<()> {
        self.edit(|patch| patch.unexpose(inner))
    }

    pub fn find_control(&self, node: NodeId, name: &str, kind: ControlKind) -> Option<ControlId> {
        let key = crate::graph::ControlKey::new(name, kind);
        self.with_patch(|patch| patch.find_control(node, &key))
    }

    pub fn node_errors(&self, node: NodeId) -> Result<Vec<CompileError>> {
        let session = lock(&self.session);
        Ok(session.patch.node_errors(node)?.to_vec())
    }

    pub fn reload_state(&self) -> ReloadState {
        lock(&self.session).reload.state()
    }

    // --- Control values ---

    /// Current value: live storage when deployed, otherwise the patch value.
    pub fn get_control(&self, control: ControlId) -> Result<ControlValue> {
        let session = lock(&self.session);
        let stored = session
            .patch
            .control(control)
            .ok_or(GraphError::UnknownControl(control))?
            .value;
        let live = lock(&self.engine).read(control);
        Ok(live.unwrap_or(stored))
    }

    pub fn set_control(&self, control: ControlId, value: ControlValue) -> Result<()> {
        let mut session = lock(&self.session);
        session.patch.set_value(control, value)?;
        lock(&self.engine).write(control, value);
        Ok(())
    }

    /// Put an event into a MIDI control for the next sample.
    pub fn push_midi(&self, control: ControlId, event: MidiEvent) -> Result<()> {
        let session = lock(&self.session);
        let kind = session
            .patch
            .control(control)
            .ok_or(GraphError::UnknownControl(control))?
            .kind();
        if kind != ControlKind::Midi {
            return Err(GraphError::ValueMismatch(control).into());
        }
        if !lock(&self.engine).push_midi(control, event) {
            warn!("MIDI buffer of {control} is full; event dropped");
        }
        Ok(())
    }

    /// Schedule an event `event.time` frames into the next block. Returns
    /// false when the queue is full and the event was dropped.
    pub fn queue_event(&self, control: ControlId, event: MidiEvent) -> bool {
        let mut engine = lock(&self.engine);
        if engine.events.len() >= EVENT_CAPACITY {
            warn!("event queue full; dropping event for {control}");
            return false;
        }
        engine.events.push(Pending { control, event });
        true
    }

    pub fn clear_events(&self) {
        lock(&self.engine).events.clear();
    }

    pub fn pending_events(&self) -> usize {
        lock(&self.engine).events.len()
    }

    // --- Compile and swap ---

    /// Recompile the patch and deploy it. On failure the previous program
    /// keeps running and the error lists every failing node.
    pub fn compile(&self) -> Result<Carryover> {
        // The session lock is held for the whole reload, so a reload still
        // in progress here was cut short by a panic.
        let mut guard = self.session.lock().unwrap_or_else(|poisoned| {
            let mut session = poisoned.into_inner();
            if session.reload.state() != ReloadState::Stable {
                warn!("previous reload did not finish; resetting");
                session.reload.abort();
            }
            session
        });
        let session = &mut *guard;
        if !session.reload.begin() {
            return Err(RuntimeError::Busy);
        }

        self.harvest(&mut session.patch);
        let program = match session.patch.compile(&mut session.ctx) {
            Ok(program) => program,
            Err(err) => {
                session.reload.abort();
                return Err(err.into());
            }
        };

        session.reload.swapping();
        let carryover = {
            let mut engine = lock(&self.engine);
            let carryover = if engine.storage.has_layout(&program.layout) {
                Carryover::Restored
            } else {
                let fresh = Storage::construct(&program.layout);
                let old = std::mem::replace(&mut engine.storage, fresh);
                old.release();
                Carryover::Reset
            };
            engine.machine = Machine::new(program.regs, session.ctx.sample_rate);
            engine.program = program;
            if carryover == Carryover::Reset {
                for control in session.patch.controls() {
                    if control.kind().is_editable() {
                        engine.write(control.id, control.value);
                    }
                }
            }
            carryover
        };
        session.reload.finish(carryover);
        info!(
            "deployed generation {} ({:?})",
            session.reload.generation(),
            carryover
        );
        Ok(carryover)
    }

    /// Copy editable values from live storage back into the patch.
    fn harvest(&self, patch: &mut Patch) {
        let engine = lock(&self.engine);
        let editable: Vec<ControlId> = patch
            .controls()
            .filter(|c| c.kind().is_editable())
            .map(|c| c.id)
            .collect();
        for id in editable {
            if let Some(value) = engine.read(id) {
                // Same storage class by construction.
                let _ = patch.set_value(id, value);
            }
        }
        debug!("harvested editable control values");
    }

    // --- Audio ---

    /// Produce one stereo sample.
    pub fn generate(&self) -> Sample {
        let mut engine = lock(&self.engine);
        let sample = engine.tick(0);
        engine.age_events(1);
        sample
    }

    /// Fill an interleaved buffer of `channels` channels. Mono buffers get
    /// the mid signal; channels past the second are silent.
    pub fn fill_buffer(&self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut engine = lock(&self.engine);
        let frames = out.len() / channels;
        for (frame, chunk) in out.chunks_mut(channels).enumerate() {
            let sample = engine.tick(frame as u32);
            match chunk {
                [mono] => *mono = (sample.left + sample.right) * 0.5,
                [left, right, rest @ ..] => {
                    *left = sample.left;
                    *right = sample.right;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
        engine.age_events(frames as u32);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(CompileContext::default())
    }
}
