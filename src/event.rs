//! Decoded events and the outbound messages they turn into

use std::fmt;

use crate::midi::{format_hex, ShortMessage};

/// Semantic event produced from one inbound message. Consumed immediately by
/// the encoder, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// A section and its tone were selected on the piano
    ToneSelect {
        section: usize,
        tone: u8,
        code: u8,
        value: u8,
    },
    /// Section parameter or MMC command, sent on the section's tone channel
    ControlChange { section: usize, code: u8, value: u8 },
    /// Bank mode switched on or off
    BankToggle { on: bool },
    /// Bank chosen, confirmed with `code`
    BankSelect { bank: u8, code: u8 },
    /// Transport command from the fixed table
    TransportSimple { code: u8 },
    /// Transport command whose CC alternates on/off
    TransportToggle { code: u8, on: bool },
    /// Fader position 0-127
    FaderChange { code: u8, value: u8 },
    /// Channel message forwarded after bank remapping
    RawPassThrough(ShortMessage),
    /// Unrecognised SysEx forwarded verbatim
    SysExPassThrough(String),
}

/// Which of the two fixed endpoints a message goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// The stage piano
    Hardware,
    /// The DAW's virtual port
    Daw,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRole::Hardware => write!(f, "hardware"),
            PortRole::Daw => write!(f, "daw"),
        }
    }
}

/// A message ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Short { port: PortRole, message: ShortMessage },
    SysEx { port: PortRole, text: String },
}

impl Outbound {
    pub fn to_daw(message: ShortMessage) -> Self {
        Outbound::Short {
            port: PortRole::Daw,
            message,
        }
    }

    pub fn sysex_to_hardware(text: String) -> Self {
        Outbound::SysEx {
            port: PortRole::Hardware,
            text,
        }
    }

    pub fn port(&self) -> PortRole {
        match self {
            Outbound::Short { port, .. } | Outbound::SysEx { port, .. } => *port,
        }
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Short { port, message } => write!(
                f,
                "-> {} {} ({})",
                port,
                format_hex(&message.encode()),
                message
            ),
            Outbound::SysEx { port, text } => write!(f, "-> {} {}", port, text),
        }
    }
}
