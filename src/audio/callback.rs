//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, renders the block from the
//! runtime, applies volume and the master limiter.

use std::sync::Arc;

use log::warn;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use super::limiter::Limiter;
use crate::runtime::Runtime;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    runtime: Arc<Runtime>,
    volume: f32,
    muted: bool,
    limiter: Limiter,
    channels: u16,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        runtime: Arc<Runtime>,
        channels: u16,
        limiter: Limiter,
    ) -> Self {
        Self {
            consumer,
            runtime,
            volume: 1.0,
            muted: false,
            limiter,
            channels,
        }
    }

    /// Called by cpal for each output buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Midi { control, event } => {
                    if !self.runtime.queue_event(control, event) {
                        warn!("dropped MIDI event for {control}");
                    }
                }
                AudioCommand::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
                AudioCommand::Mute(muted) => self.muted = muted,
                AudioCommand::ClearEvents => self.runtime.clear_events(),
            }
        }

        // The program keeps running while muted so its state stays in time.
        self.runtime.fill_buffer(output, self.channels as usize);
        let gain = if self.muted { 0.0 } else { self.volume };
        for sample in output.iter_mut() {
            *sample *= gain;
        }
        self.limiter.process_block(output, self.channels as usize);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
