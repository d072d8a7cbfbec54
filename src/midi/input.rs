//! MIDI input: connects to a MIDI device and hands parsed events to a callback.

use std::io;

use log::{debug, info};
use midir::{MidiInput as MidirInput, MidiInputConnection};

use super::config::MidiConfig;
use super::message::parse_message;
use crate::value::MidiEvent;

/// Active MIDI input connection. Dropping it disconnects.
pub struct MidiInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiInput {
    /// Start listening on a MIDI port.
    /// Finds a port matching the config's device_name (or the first available port).
    /// `on_event` runs on the MIDI thread for every message that parses and
    /// passes the channel filter.
    pub fn start<F>(config: &MidiConfig, mut on_event: F) -> io::Result<Self>
    where
        F: FnMut(MidiEvent) + Send + 'static,
    {
        let midi_in = MidirInput::new("patchwire")
            .map_err(|e| io::Error::other(format!("MIDI init: {e}")))?;

        let ports = midi_in.ports();
        let (port, port_name) = match &config.device_name {
            Some(filter) => ports
                .iter()
                .find_map(|p| {
                    let name = midi_in.port_name(p).ok()?;
                    name.contains(filter.as_str()).then(|| (p.clone(), name))
                })
                .ok_or_else(|| {
                    io::Error::other(format!("MIDI device matching '{filter}' not found"))
                })?,
            None => {
                let p = ports
                    .first()
                    .cloned()
                    .ok_or_else(|| io::Error::other("no MIDI input ports available"))?;
                let name = midi_in
                    .port_name(&p)
                    .unwrap_or_else(|_| "unknown".to_string());
                (p, name)
            }
        };

        let channel_filter = config.channel_filter;
        let connection = midi_in
            .connect(
                &port,
                "patchwire-input",
                move |_timestamp, msg, _| match parse_message(msg, channel_filter) {
                    Some(event) => on_event(event),
                    None => debug!("ignored MIDI message {msg:02x?}"),
                },
                (),
            )
            .map_err(|e| io::Error::other(format!("MIDI connect: {e}")))?;

        info!("listening for MIDI on '{port_name}'");
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    /// Get the connected port name.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// List all available MIDI input device names.
    pub fn list_devices() -> Vec<String> {
        let Ok(midi_in) = MidirInput::new("patchwire-list") else {
            return Vec::new();
        };
        midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect()
    }
}
