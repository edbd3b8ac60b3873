//! MIDI utilities and message types
//!
//! Short channel messages, status constants and the ASCII-hex SysEx form
//! ("F0 7F 00 06 02 F7 ") exchanged with the transport.

use std::fmt;

use crate::error::TransportError;

/// Status byte of a Control Change on channel 1
pub const CC_STATUS_OFFSET: u8 = 0xB0;
/// Status byte of a Program Change on channel 1
pub const PC_STATUS_OFFSET: u8 = 0xC0;
/// Status byte of a Channel Aftertouch on channel 1
pub const CA_STATUS_OFFSET: u8 = 0xD0;

/// Controller number of the sustain pedal
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// Value sent for key-down style triggers
pub const TRIGGER_VALUE: u8 = 127;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// A three-byte channel message as delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl ShortMessage {
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// Control Change on a 0-based channel
    pub fn control_change(channel: u8, cc: u8, value: u8) -> Self {
        Self::new(CC_STATUS_OFFSET | (channel & 0x0F), cc & 0x7F, value & 0x7F)
    }

    /// Parse from raw bytes. Missing data bytes read as zero
    /// (Program Change and Channel Pressure only carry one).
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }
        Some(Self::new(
            status,
            data.get(1).copied().unwrap_or(0),
            data.get(2).copied().unwrap_or(0),
        ))
    }

    /// Message type nibble (0x80..=0xE0)
    pub fn kind(&self) -> u8 {
        self.status & 0xF0
    }

    /// 0-based channel
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    pub fn is_control_change(&self) -> bool {
        self.kind() == CC_STATUS_OFFSET
    }

    /// Encode to wire bytes, dropping the unused data byte for two-byte messages
    pub fn encode(&self) -> Vec<u8> {
        match self.kind() {
            PC_STATUS_OFFSET | CA_STATUS_OFFSET => vec![self.status, self.data1],
            _ => vec![self.status, self.data1, self.data2],
        }
    }
}

impl fmt::Display for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = self.channel() + 1;
        match self.kind() {
            0x80 => write!(f, "NoteOff ch:{} n:{} v:{}", ch, self.data1, self.data2),
            0x90 => write!(f, "NoteOn ch:{} n:{} v:{}", ch, self.data1, self.data2),
            0xA0 => write!(f, "PolyPressure ch:{} n:{} p:{}", ch, self.data1, self.data2),
            CC_STATUS_OFFSET => write!(f, "CC ch:{} cc:{} v:{}", ch, self.data1, self.data2),
            PC_STATUS_OFFSET => write!(f, "ProgramChange ch:{} p:{}", ch, self.data1),
            CA_STATUS_OFFSET => write!(f, "ChannelPressure ch:{} p:{}", ch, self.data1),
            _ => write!(
                f,
                "PitchBend ch:{} v:{}",
                ch,
                ((self.data2 as u16) << 7) | self.data1 as u16
            ),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two-digit uppercase hex, zero padded
pub fn int_to_hex(value: u8) -> String {
    format!("{:02X}", value)
}

/// Render a SysEx frame the way the hardware host reports it: space separated
/// uppercase pairs followed by a single terminator space.
pub fn sysex_to_ascii(data: &[u8]) -> String {
    let mut text = format_hex(data);
    text.push(' ');
    text
}

/// Parse an ASCII-hex SysEx string back to wire bytes
pub fn ascii_to_sysex(text: &str) -> Result<Vec<u8>, TransportError> {
    let compact: String = text.split_whitespace().collect();
    let bytes =
        hex::decode(&compact).map_err(|_| TransportError::InvalidSysEx(text.to_string()))?;

    match (bytes.first(), bytes.last()) {
        (Some(&SYSEX_START), Some(&SYSEX_END)) => Ok(bytes),
        _ => Err(TransportError::InvalidSysEx(text.to_string())),
    }
}

/// Drop the trailing terminator character the host appends to inbound SysEx
pub fn strip_terminator(raw: &str) -> &str {
    match raw.chars().last() {
        Some(c) if c.is_whitespace() => &raw[..raw.len() - c.len_utf8()],
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change_parsing() {
        let msg = ShortMessage::parse(&[0xB2, 7, 100]).unwrap();
        assert!(msg.is_control_change());
        assert_eq!(msg.channel(), 2);
        assert_eq!(msg.to_string(), "CC ch:3 cc:7 v:100");
    }

    #[test]
    fn test_program_change_is_two_bytes() {
        let msg = ShortMessage::parse(&[0xC1, 5]).unwrap();
        assert_eq!(msg.data2, 0);
        assert_eq!(msg.encode(), vec![0xC1, 5]);
    }

    #[test]
    fn test_system_messages_are_not_short_messages() {
        assert!(ShortMessage::parse(&[0xF0, 0x7F, 0xF7]).is_none());
        assert!(ShortMessage::parse(&[0xF8]).is_none());
        assert!(ShortMessage::parse(&[]).is_none());
    }

    #[test]
    fn test_int_to_hex_pads() {
        assert_eq!(int_to_hex(0), "00");
        assert_eq!(int_to_hex(7), "07");
        assert_eq!(int_to_hex(127), "7F");
    }

    #[test]
    fn test_ascii_sysex_forms() {
        let bytes = [0xF0, 0x7F, 0x00, 0x06, 0x02, 0xF7];
        let text = sysex_to_ascii(&bytes);
        assert_eq!(text, "F0 7F 00 06 02 F7 ");
        assert_eq!(strip_terminator(&text), "F0 7F 00 06 02 F7");
        assert_eq!(ascii_to_sysex(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_ascii_sysex_rejects_unframed() {
        assert!(ascii_to_sysex("7F 00 06").is_err());
        assert!(ascii_to_sysex("F0 ZZ F7").is_err());
    }

    #[test]
    fn test_strip_terminator_leaves_bare_strings() {
        assert_eq!(strip_terminator("F0 F7"), "F0 F7");
        assert_eq!(strip_terminator(""), "");
    }
}
