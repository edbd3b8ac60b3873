//! SysEx decoder for piano-side parameter and transport messages
//!
//! Matches inbound ASCII SysEx against the control map: MMC commands by exact
//! string, section parameters by their 29-character prefix. A section prefix
//! ends with a data-size byte; the value is the last data byte.

use tracing::debug;

use crate::control_map::{ControlEntry, ControlMap, PREFIX_LEN, TONE_CONTROL};
use crate::error::DecodeError;
use crate::event::DecodedEvent;
use crate::midi::{strip_terminator, TRIGGER_VALUE};
use crate::state::SessionState;
use crate::tone;

/// Character offset of the data-size byte
const DATA_SIZE_OFFSET: usize = 27;

/// Width of one "XX " byte in the ASCII form
const BYTE_STRIDE: usize = 3;

/// Decode one inbound SysEx string, applying section/tone selection to `state`.
///
/// `Ok(None)` means no control matched and the message is dropped.
pub fn decode(
    map: &ControlMap,
    state: &mut SessionState,
    raw: &str,
) -> Result<Option<DecodedEvent>, DecodeError> {
    let clean = strip_terminator(raw);

    if let Some(entry) = map.lookup_simple(clean) {
        debug!("MMC '{}' -> cc {}", entry.name, entry.control_number);
        return Ok(Some(DecodedEvent::ControlChange {
            section: state.active_section_index,
            code: entry.control_number,
            value: TRIGGER_VALUE,
        }));
    }

    let Some((entry, section)) = clean.get(..PREFIX_LEN).and_then(|p| map.lookup_prefix(p)) else {
        return Ok(None);
    };

    let data_size = hex_at(entry, clean, raw, DATA_SIZE_OFFSET)? as usize;
    let data = hex_at(entry, clean, raw, DATA_SIZE_OFFSET + BYTE_STRIDE * data_size)? as i32;

    if entry.name == TONE_CONTROL {
        let hi = hex_at(entry, clean, raw, PREFIX_LEN + 1)? as i32;
        let lo = hex_at(entry, clean, raw, PREFIX_LEN + 1 + BYTE_STRIDE)? as i32;
        let payload = (hi << 8) | lo;

        let tone = tone::tone_from_payload(section, payload).ok_or_else(|| {
            DecodeError::malformed(
                &entry.name,
                format!("tone payload {} outside section {}", payload, section),
                raw,
            )
        })? as u8;

        state.active_section_index = section;
        state.sections[section].active_tone = tone;
        debug!(
            "Section {} ({}) active, tone {}",
            section, state.sections[section].name, tone
        );

        // Tone select triggers the track instead of carrying controller data
        let value = scaled(entry, 1, raw)?;
        return Ok(Some(DecodedEvent::ToneSelect {
            section,
            tone,
            code: entry.control_number,
            value,
        }));
    }

    let value = scaled(entry, data, raw)?;
    debug!(
        "'{}' on section {} = {} (raw {})",
        entry.name, section, value, data
    );
    Ok(Some(DecodedEvent::ControlChange {
        section,
        code: entry.control_number,
        value,
    }))
}

/// Two hex characters at `offset`
fn hex_at(entry: &ControlEntry, sysex: &str, raw: &str, offset: usize) -> Result<u8, DecodeError> {
    let pair = sysex.get(offset..offset + 2).ok_or_else(|| {
        DecodeError::malformed(
            &entry.name,
            format!("no byte at offset {} (length {})", offset, sysex.len()),
            raw,
        )
    })?;
    u8::from_str_radix(pair, 16).map_err(|_| {
        DecodeError::malformed(
            &entry.name,
            format!("'{}' at offset {} is not hex", pair, offset),
            raw,
        )
    })
}

fn scaled(entry: &ControlEntry, data: i32, raw: &str) -> Result<u8, DecodeError> {
    let value = data * entry.scale;
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 127)
        .ok_or_else(|| {
            DecodeError::malformed(
                &entry.name,
                format!("value {} x scale {} exceeds 127", data, entry.scale),
                raw,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_map::{default_section_names, load_default_map};
    use proptest::prelude::*;

    fn setup() -> (ControlMap, SessionState) {
        let map = load_default_map().unwrap();
        let state = SessionState::new(&default_section_names(), &[]);
        (map, state)
    }

    #[test]
    fn test_mmc_addresses_active_section() {
        let (map, mut state) = setup();
        let event = decode(&map, &mut state, "F0 7F 00 06 01 F7 ").unwrap();
        assert_eq!(
            event,
            Some(DecodedEvent::ControlChange {
                section: 1,
                code: 116,
                value: 127
            })
        );
    }

    #[test]
    fn test_volume_on_section() {
        let (map, mut state) = setup();
        let event = decode(&map, &mut state, "F0 40 00 10 00 12 40 12 01 01 64 F7 ").unwrap();
        assert_eq!(
            event,
            Some(DecodedEvent::ControlChange {
                section: 2,
                code: 7,
                value: 100
            })
        );
        // parameter changes do not move the active section
        assert_eq!(state.active_section_index, 1);
    }

    #[test]
    fn test_scaled_switch() {
        let (map, mut state) = setup();
        let event = decode(&map, &mut state, "F0 40 00 10 00 12 40 10 05 01 01 F7 ").unwrap();
        assert_eq!(
            event,
            Some(DecodedEvent::ControlChange {
                section: 0,
                code: 103,
                value: 127
            })
        );
    }

    #[test]
    fn test_tone_select_single_section() {
        let (map, mut state) = setup();
        let event = decode(&map, &mut state, "F0 40 00 10 00 12 40 11 00 02 00 11 F7 ").unwrap();
        assert_eq!(
            event,
            Some(DecodedEvent::ToneSelect {
                section: 1,
                tone: 5,
                code: 102,
                value: 127
            })
        );
        assert_eq!(state.active_section_index, 1);
        assert_eq!(state.sections[1].active_tone, 5);
    }

    #[test]
    fn test_tone_select_sub_return_channel() {
        let (map, mut state) = setup();
        // raw sub channel 7 (payload 24 + 7 = 0x1F) is return tone 13
        decode(&map, &mut state, "F0 40 00 10 00 12 40 12 00 02 00 1F F7 ").unwrap();
        assert_eq!(state.active_section_index, 2);
        assert_eq!(state.sections[2].active_tone, 13);
    }

    #[test]
    fn test_tone_outside_section_is_error() {
        let (map, mut state) = setup();
        let err = decode(&map, &mut state, "F0 40 00 10 00 12 40 10 00 02 00 20 F7 ").unwrap_err();
        assert_eq!(err.sysex(), "F0 40 00 10 00 12 40 10 00 02 00 20 F7 ");
        assert_eq!(state.active_section_index, 1);
    }

    #[test]
    fn test_unmatched_is_dropped() {
        let (map, mut state) = setup();
        assert_eq!(decode(&map, &mut state, "F0 41 10 42 12 F7 ").unwrap(), None);
        assert_eq!(decode(&map, &mut state, "").unwrap(), None);
        assert_eq!(
            decode(&map, &mut state, "F0 40 00 10 00 12 40 1F 01 01 10 F7 ").unwrap(),
            None
        );
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let (map, mut state) = setup();
        let err = decode(&map, &mut state, "F0 40 00 10 00 12 40 10 01 01 ").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { ref control, .. } if control == "volume"));
    }

    #[test]
    fn test_non_hex_payload_is_error() {
        let (map, mut state) = setup();
        assert!(decode(&map, &mut state, "F0 40 00 10 00 12 40 10 01 01 G1 F7 ").is_err());
    }

    #[test]
    fn test_out_of_range_value_is_error() {
        let (map, mut state) = setup();
        // section_on scales by 127, so 02 overflows
        assert!(decode(&map, &mut state, "F0 40 00 10 00 12 40 10 05 01 02 F7 ").is_err());
    }

    proptest! {
        #[test]
        fn prop_single_section_tone_select(section in 0usize..2, channel in 0u8..12) {
            let (map, mut state) = setup();
            let payload = channel + section as u8 * 12;
            let raw = format!(
                "{} 00 {:02X} F7 ",
                map.tone_entry().template(section).unwrap(),
                payload
            );
            decode(&map, &mut state, &raw).unwrap();
            let expected = payload as i32 - section as i32 * 12;
            prop_assert_eq!(state.sections[section].active_tone as i32, expected);
            prop_assert!(state.sections[section].active_tone < 12);
        }
    }
}
