//! Audio host: a cpal output stream that pulls blocks from a [`Runtime`].
//!
//! Control-thread requests (MIDI, volume, mute) travel to the stream
//! callback as [`AudioCommand`]s over a lock-free ring buffer and are
//! applied at the start of the next block.

pub mod callback;
pub mod command;
pub mod limiter;

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use thiserror::Error;

pub use command::AudioCommand;
pub use limiter::Limiter;

use crate::config::AudioConfig;
use crate::graph::ControlId;
use crate::runtime::Runtime;
use crate::value::MidiEvent;
use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("device config error: {0}")]
    DeviceConfig(String),

    #[error("stream build error: {0}")]
    StreamBuild(String),

    #[error("stream play error: {0}")]
    StreamPlay(String),

    /// The audio thread is not draining commands fast enough.
    #[error("audio command ring buffer is full")]
    BufferFull,
}

/// The audio engine. Owns the cpal stream and ring buffer producer.
pub struct AudioEngine {
    stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    sample_rate: u32,
    channels: u16,
}

impl AudioEngine {
    /// Open the default output device at the runtime's sample rate and
    /// start playing.
    pub fn start(runtime: Arc<Runtime>, config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let channels = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?
            .channels();
        let sample_rate = runtime.sample_rate().round() as u32;

        let rb = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();
        let limiter = Limiter::new(config.ceiling.clamp(f32::EPSILON, 1.0), sample_rate);
        let mut audio_callback = AudioCallback::new(consumer, runtime, channels, limiter);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                |err: cpal::StreamError| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        info!("audio running at {sample_rate} Hz, {channels} channels");

        let mut engine = Self {
            stream,
            producer,
            sample_rate,
            channels,
        };
        engine.set_volume(config.volume)?;
        Ok(engine)
    }

    fn send(&mut self, command: AudioCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(command)
            .map_err(|_| AudioError::BufferFull)
    }

    /// Deliver a MIDI event to a control at the start of the next block.
    pub fn send_midi(&mut self, control: ControlId, event: MidiEvent) -> Result<(), AudioError> {
        self.send(AudioCommand::Midi { control, event })
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.send(AudioCommand::SetVolume(volume))
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), AudioError> {
        self.send(AudioCommand::Mute(muted))
    }

    pub fn clear_events(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::ClearEvents)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }

    pub fn play(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires audio device; run manually with `cargo test -- --ignored`
    fn engine_starts_on_default_device() {
        let runtime = Arc::new(Runtime::default());
        let engine = AudioEngine::start(runtime, &AudioConfig::default());
        assert!(engine.is_ok(), "{:?}", engine.err());
        let mut engine = engine.unwrap();
        assert!(engine.channels() > 0);
        assert!(engine.set_muted(true).is_ok());
        assert!(engine.pause().is_ok());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::BufferFull.to_string(),
            "audio command ring buffer is full"
        );
        assert_eq!(
            AudioError::DeviceConfig("test".to_string()).to_string(),
            "device config error: test"
        );
    }
}
