//! MIDI transport capability
//!
//! The gateway core never touches ports directly. It resolves port ids once
//! through a [`Transport`], sends through it, and receives [`InboundEvent`]s
//! from a channel the transport feeds.

pub mod device;

use crate::error::TransportError;
use crate::midi::ShortMessage;

pub use device::DeviceTransport;

/// Inbound notification from an open input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Channel message, `timestamp` in microseconds as reported by the backend
    Short {
        timestamp: u64,
        port_id: usize,
        message: ShortMessage,
    },
    /// Complete SysEx frame in ASCII-hex form with its terminator space
    SysEx { port_id: usize, text: String },
}

impl InboundEvent {
    pub fn port_id(&self) -> usize {
        match self {
            InboundEvent::Short { port_id, .. } | InboundEvent::SysEx { port_id, .. } => *port_id,
        }
    }
}

/// Port operations the session needs from a MIDI backend.
///
/// Input ids come back one higher than the id carried by inbound
/// notifications for the same port; callers correct by subtracting one.
pub trait Transport {
    fn resolve_output_port(&mut self, name: &str) -> Result<usize, TransportError>;

    fn resolve_input_port(&mut self, name: &str) -> Result<usize, TransportError>;

    fn send_raw_midi(
        &mut self,
        port_id: usize,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), TransportError>;

    fn send_sysex(&mut self, port_id: usize, text: &str) -> Result<(), TransportError>;

    /// Route inbound traffic to the gateway instead of the backend's default handling
    fn set_input_diversion(&mut self, enabled: bool) -> Result<(), TransportError>;

    /// Deliver inbound notifications at all
    fn set_input_firing(&mut self, enabled: bool) -> Result<(), TransportError>;

    fn send_short(&mut self, port_id: usize, msg: ShortMessage) -> Result<(), TransportError> {
        self.send_raw_midi(port_id, msg.status, msg.data1, msg.data2)
    }
}
