//! midir-backed transport
//!
//! Opens real MIDI ports by name, pushes inbound traffic into a tokio channel
//! and sends outbound bytes synchronously.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use super::{InboundEvent, Transport};
use crate::error::TransportError;
use crate::midi::{ascii_to_sysex, format_hex, sysex_to_ascii, ShortMessage, SYSEX_START};

/// Inbound queue depth
const EVENT_QUEUE_SIZE: usize = 1000;

pub struct DeviceTransport {
    client_name: String,
    inputs: Vec<MidiInputConnection<()>>,
    outputs: Vec<MidiOutputConnection>,
    input_ids: HashMap<String, usize>,
    output_ids: HashMap<String, usize>,
    /// Read by the input callbacks; inbound data is dropped while false
    firing: Arc<AtomicBool>,
    event_tx: mpsc::Sender<InboundEvent>,
}

impl DeviceTransport {
    /// Create the transport and the receiver its input callbacks feed
    pub fn new(client_name: &str) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let transport = Self {
            client_name: client_name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_ids: HashMap::new(),
            output_ids: HashMap::new(),
            firing: Arc::new(AtomicBool::new(false)),
            event_tx,
        };
        (transport, event_rx)
    }

    fn backend(e: impl std::fmt::Display) -> TransportError {
        TransportError::Backend(e.to_string())
    }
}

impl Transport for DeviceTransport {
    fn resolve_output_port(&mut self, name: &str) -> Result<usize, TransportError> {
        if let Some(&id) = self.output_ids.get(name) {
            return Ok(id);
        }

        let midi_out =
            MidiOutput::new(&format!("{}-Output", self.client_name)).map_err(Self::backend)?;
        let (port, port_name) = discovery::find_output_port(&midi_out, name).ok_or_else(|| {
            TransportError::PortNotFound {
                direction: "output",
                name: name.to_string(),
            }
        })?;

        info!("Connecting to output port: {}", port_name);
        let conn = midi_out
            .connect(&port, &self.client_name)
            .map_err(Self::backend)?;

        let id = self.outputs.len();
        self.outputs.push(conn);
        self.output_ids.insert(name.to_string(), id);
        Ok(id)
    }

    fn resolve_input_port(&mut self, name: &str) -> Result<usize, TransportError> {
        if let Some(&slot) = self.input_ids.get(name) {
            return Ok(slot + 1);
        }

        let mut midi_in =
            MidiInput::new(&format!("{}-Input", self.client_name)).map_err(Self::backend)?;
        midi_in.ignore(Ignore::TimeAndActiveSense);

        let (port, port_name) = discovery::find_input_port(&midi_in, name).ok_or_else(|| {
            TransportError::PortNotFound {
                direction: "input",
                name: name.to_string(),
            }
        })?;

        info!("Connecting to input port: {}", port_name);

        let slot = self.inputs.len();
        let firing = self.firing.clone();
        let event_tx = self.event_tx.clone();

        let conn = midi_in
            .connect(
                &port,
                &self.client_name,
                move |timestamp, data, _| {
                    if !firing.load(Ordering::Relaxed) {
                        return;
                    }

                    let event = if data.first() == Some(&SYSEX_START) {
                        InboundEvent::SysEx {
                            port_id: slot,
                            text: sysex_to_ascii(data),
                        }
                    } else if let Some(message) = ShortMessage::parse(data) {
                        InboundEvent::Short {
                            timestamp,
                            port_id: slot,
                            message,
                        }
                    } else {
                        trace!("Ignoring {}", format_hex(data));
                        return;
                    };

                    forward(&event_tx, event);
                },
                (),
            )
            .map_err(Self::backend)?;

        self.inputs.push(conn);
        self.input_ids.insert(name.to_string(), slot);

        // Upstream numbering starts inputs at 1
        Ok(slot + 1)
    }

    fn send_raw_midi(
        &mut self,
        port_id: usize,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), TransportError> {
        let conn = self
            .outputs
            .get_mut(port_id)
            .ok_or(TransportError::UnknownPort(port_id))?;
        let data = ShortMessage::new(status, data1, data2).encode();
        conn.send(&data)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        trace!("Sent: {}", format_hex(&data));
        Ok(())
    }

    fn send_sysex(&mut self, port_id: usize, text: &str) -> Result<(), TransportError> {
        let data = ascii_to_sysex(text)?;
        let conn = self
            .outputs
            .get_mut(port_id)
            .ok_or(TransportError::UnknownPort(port_id))?;
        conn.send(&data)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        trace!("Sent SysEx: {}", text);
        Ok(())
    }

    /// midir has no default routing to divert from, so this only logs
    fn set_input_diversion(&mut self, enabled: bool) -> Result<(), TransportError> {
        debug!("Input diversion {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    fn set_input_firing(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.firing.store(enabled, Ordering::Relaxed);
        debug!("Input firing {}", if enabled { "on" } else { "off" });
        Ok(())
    }
}

/// Queue an inbound event without blocking the backend thread; returns
/// whether it was queued
fn forward(event_tx: &mpsc::Sender<InboundEvent>, event: InboundEvent) -> bool {
    match event_tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!("Inbound queue full, dropped {:?}", event);
            false
        }
        Err(TrySendError::Closed(_)) => {
            trace!("Inbound queue closed");
            false
        }
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        self.firing.store(false, Ordering::Relaxed);
        self.inputs.clear();
        self.outputs.clear();
        debug!("MIDI ports closed");
    }
}


/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    fn is_virtual(name: &str) -> bool {
        name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC")
    }

    fn name_matches(name: &str, pattern: &str) -> bool {
        name.to_lowercase().contains(&pattern.to_lowercase())
    }

    /// Index of the port `pattern` selects: an exact (case-insensitive) name
    /// wins over a substring match, so "loopMIDI Port" never lands on
    /// "loopMIDI Port 1" when both exist.
    pub fn select_port<S: AsRef<str>>(names: &[S], pattern: &str) -> Option<usize> {
        names
            .iter()
            .position(|name| name.as_ref().eq_ignore_ascii_case(pattern))
            .or_else(|| {
                names
                    .iter()
                    .position(|name| name_matches(name.as_ref(), pattern))
            })
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>, TransportError> {
        let midi_in = MidiInput::new("MP11-GW-Discovery").map_err(DeviceTransport::backend)?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in.port_name(port).ok().map(|name| PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    /// Discover output ports
    pub fn discover_output_ports() -> Result<Vec<PortInfo>, TransportError> {
        let midi_out = MidiOutput::new("MP11-GW-Discovery").map_err(DeviceTransport::backend)?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_out.port_name(port).ok().map(|name| PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    fn pick<P>(ports: Vec<(P, String)>, pattern: &str) -> Option<(P, String)> {
        let names: Vec<&str> = ports.iter().map(|(_, name)| name.as_str()).collect();
        let index = select_port(&names, pattern)?;
        let (port, name) = ports.into_iter().nth(index)?;
        debug!("Found port '{}' matching pattern '{}'", name, pattern);
        Some((port, name))
    }

    /// Find an input port by name (exact first, then substring)
    pub fn find_input_port(
        midi_in: &MidiInput,
        pattern: &str,
    ) -> Option<(midir::MidiInputPort, String)> {
        let ports = midi_in
            .ports()
            .into_iter()
            .filter_map(|port| midi_in.port_name(&port).ok().map(|name| (port, name)))
            .collect();
        pick(ports, pattern)
    }

    /// Find an output port by name (exact first, then substring)
    pub fn find_output_port(
        midi_out: &MidiOutput,
        pattern: &str,
    ) -> Option<(midir::MidiOutputPort, String)> {
        let ports = midi_out
            .ports()
            .into_iter()
            .filter_map(|port| midi_out.port_name(&port).ok().map(|name| (port, name)))
            .collect();
        pick(ports, pattern)
    }

}
