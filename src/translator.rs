//! Transport and bank translator
//!
//! Handles the fixed SysEx command tables (toggles, bank-aware transport
//! commands, faders), the two bank-switching sequences, and the bank channel
//! shift applied to channel messages coming from the piano.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{FaderEntry, SimpleEntry, TranslatorConfig};
use crate::error::DecodeError;
use crate::event::DecodedEvent;
use crate::midi::{
    strip_terminator, ShortMessage, CC_STATUS_OFFSET, PC_STATUS_OFFSET, SUSTAIN_CONTROLLER,
};
use crate::state::SessionState;

/// Bank mode on/off: `<prefix><digit> F7`, digit 1 switches banks on
const BANK_MODE_PREFIX: &str = "F0 40 00 10 00 12 40 00 49 01 0";

/// Bank select A1-B8: `<prefix><group 0-1> 0<slot 0-7> F7`
const BANK_SELECT_PREFIX: &str = "F0 40 00 10 00 12 40 00 19 02 0";

const SYSEX_TAIL: &str = " F7";

/// Slots per bank group
const BANK_SLOTS: u8 = 8;

pub struct Translator {
    toggles: HashMap<String, usize>,
    simple: HashMap<String, SimpleEntry>,
    faders: Vec<FaderEntry>,
    bank_control_number: u8,
}

impl Translator {
    /// Toggle indices follow `config.toggles`, the same order `SessionState` stores them in
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            toggles: config
                .toggles
                .iter()
                .enumerate()
                .map(|(i, t)| (t.sysex.clone(), i))
                .collect(),
            simple: config
                .simple
                .iter()
                .map(|s| (s.sysex.clone(), s.clone()))
                .collect(),
            faders: config.faders.clone(),
            bank_control_number: config.bank_control_number,
        }
    }

    /// Classify an inbound SysEx string. `Ok(None)` when no table matches.
    pub fn translate_sysex(
        &self,
        state: &mut SessionState,
        raw: &str,
    ) -> Result<Option<DecodedEvent>, DecodeError> {
        let clean = strip_terminator(raw);

        if let Some(&index) = self.toggles.get(clean) {
            let on = state.flip_toggle(index);
            let code = state.toggles[index].cc;
            debug!("Toggle cc {} -> {}", code, on);
            return Ok(Some(DecodedEvent::TransportToggle { code, on }));
        }

        if let Some(entry) = self.simple.get(clean) {
            let code = if state.banks_active {
                entry.local
            } else {
                entry.global
            };
            return Ok(Some(DecodedEvent::TransportSimple { code }));
        }

        if let Some(fader) = self.faders.iter().find(|f| clean.starts_with(&f.prefix)) {
            let value = fader_value(fader, clean, raw)?;
            return Ok(Some(DecodedEvent::FaderChange {
                code: fader.cc,
                value,
            }));
        }

        if let Some(on) = parse_bank_mode(clean) {
            state.set_banks_active(on);
            debug!("Bank mode {}", if on { "on" } else { "off" });
            return Ok(Some(DecodedEvent::BankToggle { on }));
        }

        if let Some(bank) = parse_bank_select(clean) {
            state.select_bank(bank);
            debug!("Bank {} selected", bank);
            return Ok(Some(DecodedEvent::BankSelect {
                bank,
                code: self.bank_control_number,
            }));
        }

        Ok(None)
    }

    /// Bank-shift a channel message from the piano. `None` when it is suppressed
    /// (the sustain pedal controller never reaches the DAW).
    pub fn translate_short(&self, state: &SessionState, msg: ShortMessage) -> Option<DecodedEvent> {
        let kind = msg.kind();
        let filtered_kind = kind == CC_STATUS_OFFSET || kind == PC_STATUS_OFFSET;
        if filtered_kind && msg.data1 == SUSTAIN_CONTROLLER {
            return None;
        }

        let channel = (msg.channel() + state.active_bank()) & 0x0F;
        Some(DecodedEvent::RawPassThrough(ShortMessage::new(
            kind | channel,
            msg.data1,
            msg.data2,
        )))
    }
}

fn fader_value(fader: &FaderEntry, clean: &str, raw: &str) -> Result<u8, DecodeError> {
    let start = fader.prefix.len();
    let control = format!("fader cc {}", fader.cc);
    let pair = clean
        .get(start..start + 2)
        .ok_or_else(|| DecodeError::malformed(&control, "missing fader value", raw))?;
    u8::from_str_radix(pair, 16)
        .ok()
        .filter(|v| *v <= 127)
        .ok_or_else(|| DecodeError::malformed(&control, format!("bad fader value '{}'", pair), raw))
}

fn parse_bank_mode(clean: &str) -> Option<bool> {
    let digit = clean
        .strip_prefix(BANK_MODE_PREFIX)?
        .strip_suffix(SYSEX_TAIL)?;
    let mut chars = digit.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c == '1'),
        _ => None,
    }
}

fn parse_bank_select(clean: &str) -> Option<u8> {
    let rest = clean
        .strip_prefix(BANK_SELECT_PREFIX)?
        .strip_suffix(SYSEX_TAIL)?;
    match rest.as_bytes() {
        [group @ b'0'..=b'1', b' ', b'0', slot @ b'0'..=b'7'] => {
            Some(BANK_SLOTS * (group - b'0') + (slot - b'0'))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_map::default_section_names;

    fn setup() -> (Translator, SessionState) {
        let config = TranslatorConfig::default();
        let state = SessionState::new(&default_section_names(), &config.toggles);
        (Translator::new(&config), state)
    }

    #[test]
    fn test_toggle_alternates_starting_on() {
        let (t, mut state) = setup();
        let mut seen = Vec::new();
        for _ in 0..4 {
            match t.translate_sysex(&mut state, "F0 7F 00 06 06 F7 ").unwrap() {
                Some(DecodedEvent::TransportToggle { code, on }) => {
                    assert_eq!(code, 3);
                    seen.push(on);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(seen, vec![true, false, true, false]);
    }

    #[test]
    fn test_simple_follows_bank_mode() {
        let (t, mut state) = setup();
        assert_eq!(
            t.translate_sysex(&mut state, "F0 7F 00 06 02 F7 ").unwrap(),
            Some(DecodedEvent::TransportSimple { code: 0 })
        );

        state.set_banks_active(true);
        assert_eq!(
            t.translate_sysex(&mut state, "F0 7F 00 06 02 F7 ").unwrap(),
            Some(DecodedEvent::TransportSimple { code: 9 })
        );
    }

    #[test]
    fn test_fader_values() {
        let (t, mut state) = setup();
        assert_eq!(
            t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 01 70 01 7F F7 ").unwrap(),
            Some(DecodedEvent::FaderChange { code: 22, value: 127 })
        );
        assert_eq!(
            t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 04 38 01 00 F7 ").unwrap(),
            Some(DecodedEvent::FaderChange { code: 23, value: 0 })
        );
    }

    #[test]
    fn test_fader_garbage_is_error() {
        let (t, mut state) = setup();
        assert!(t
            .translate_sysex(&mut state, "F0 40 00 10 00 12 40 01 70 01 ZZ F7 ")
            .is_err());
        assert!(t
            .translate_sysex(&mut state, "F0 40 00 10 00 12 40 01 70 01 7")
            .is_err());
    }

    #[test]
    fn test_bank_select_group_and_slot() {
        let (t, mut state) = setup();
        t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 49 01 01 F7 ").unwrap();
        let event = t
            .translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 19 02 01 05 F7 ")
            .unwrap();
        assert_eq!(event, Some(DecodedEvent::BankSelect { bank: 13, code: 110 }));
        assert_eq!(state.active_bank(), 13);
    }

    #[test]
    fn test_bank_mode_off_resets_bank() {
        let (t, mut state) = setup();
        t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 49 01 01 F7 ").unwrap();
        t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 19 02 00 07 F7 ").unwrap();
        assert_eq!(state.active_bank(), 7);

        let event = t
            .translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 49 01 00 F7 ")
            .unwrap();
        assert_eq!(event, Some(DecodedEvent::BankToggle { on: false }));
        assert!(!state.banks_active);
        state.set_banks_active(true);
        assert_eq!(state.active_bank(), 0);
    }

    #[test]
    fn test_bank_select_out_of_range_is_unmatched() {
        let (t, mut state) = setup();
        assert_eq!(
            t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 19 02 02 05 F7 ").unwrap(),
            None
        );
        assert_eq!(
            t.translate_sysex(&mut state, "F0 40 00 10 00 12 40 00 19 02 01 08 F7 ").unwrap(),
            None
        );
    }

    #[test]
    fn test_unknown_sysex_unmatched() {
        let (t, mut state) = setup();
        assert_eq!(t.translate_sysex(&mut state, "F0 7F 00 06 01 F7 ").unwrap(), None);
    }

    #[test]
    fn test_sustain_is_filtered() {
        let (t, state) = setup();
        for status in [0xB0, 0xB5, 0xC0] {
            for value in [0, 64, 127] {
                let msg = ShortMessage::new(status, SUSTAIN_CONTROLLER, value);
                assert_eq!(t.translate_short(&state, msg), None);
            }
        }
    }

    #[test]
    fn test_channel_shift_by_bank() {
        let (t, mut state) = setup();
        state.set_banks_active(true);
        state.select_bank(3);

        let event = t.translate_short(&state, ShortMessage::new(0xB0, 7, 90));
        assert_eq!(
            event,
            Some(DecodedEvent::RawPassThrough(ShortMessage::new(0xB3, 7, 90)))
        );

        let event = t.translate_short(&state, ShortMessage::new(0xC0, 12, 0));
        assert_eq!(
            event,
            Some(DecodedEvent::RawPassThrough(ShortMessage::new(0xC3, 12, 0)))
        );
    }

    #[test]
    fn test_note_on_sustain_number_passes() {
        let (t, state) = setup();
        let msg = ShortMessage::new(0x90, 64, 100);
        assert_eq!(
            t.translate_short(&state, msg),
            Some(DecodedEvent::RawPassThrough(msg))
        );
    }
}
