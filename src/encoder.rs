//! Event-to-output encoder
//!
//! Turns decoded events into DAW-bound CCs, and DAW CC feedback into SysEx
//! updates for the piano display.

use tracing::debug;

use crate::control_map::ControlMap;
use crate::event::{DecodedEvent, Outbound, PortRole};
use crate::midi::{int_to_hex, ShortMessage, TRIGGER_VALUE};
use crate::state::SessionState;
use crate::tone;

/// Outbound messages for a decoded event.
///
/// Section events go out on the section's active tone channel, translator
/// events on the active bank channel.
pub fn encode(event: &DecodedEvent, state: &SessionState) -> Vec<Outbound> {
    let bank = state.active_bank();
    let cc = |channel: u8, code: u8, value: u8| {
        vec![Outbound::to_daw(ShortMessage::control_change(channel, code, value))]
    };

    match event {
        DecodedEvent::ToneSelect {
            tone, code, value, ..
        } => cc(*tone, *code, *value),
        DecodedEvent::ControlChange {
            section,
            code,
            value,
        } => match state.sections.get(*section) {
            Some(s) => cc(s.active_tone, *code, *value),
            None => Vec::new(),
        },
        DecodedEvent::BankToggle { .. } => Vec::new(),
        DecodedEvent::BankSelect { code, .. } => cc(bank, *code, TRIGGER_VALUE),
        DecodedEvent::TransportSimple { code } => cc(bank, *code, TRIGGER_VALUE),
        DecodedEvent::TransportToggle { code, on } => {
            cc(bank, *code, if *on { TRIGGER_VALUE } else { 0 })
        }
        DecodedEvent::FaderChange { code, value } => cc(bank, *code, *value),
        DecodedEvent::RawPassThrough(msg) => vec![Outbound::to_daw(*msg)],
        DecodedEvent::SysExPassThrough(text) => vec![Outbound::SysEx {
            port: PortRole::Daw,
            text: text.clone(),
        }],
    }
}

/// SysEx updates for a CC coming back from the DAW.
///
/// The CC channel is a tone index; every section sitting on that tone is
/// updated. When none is, the active section is switched to the tone first.
/// Non reverse-mapped controls produce nothing.
pub fn encode_feedback(
    map: &ControlMap,
    state: &mut SessionState,
    msg: ShortMessage,
) -> Vec<Outbound> {
    if !msg.is_control_change() {
        return Vec::new();
    }
    let Some(entry) = map.reverse_entry(msg.data1) else {
        return Vec::new();
    };

    let value = (i32::from(msg.data2) / entry.scale).clamp(0, 0xFF) as u8;
    let value_hex = int_to_hex(value);
    let affected_tone = msg.channel();

    let mut out: Vec<Outbound> = state
        .sections_on_tone(affected_tone)
        .filter_map(|section| entry.template(section))
        .map(|template| Outbound::sysex_to_hardware(format!("{} {} F7", template, value_hex)))
        .collect();

    if !out.is_empty() {
        debug!(
            "Feedback '{}' = {} on tone {} ({} sections)",
            entry.name,
            msg.data2,
            affected_tone,
            out.len()
        );
        return out;
    }

    let section = state.active_section_index;
    state.active_section_mut().active_tone = affected_tone;
    debug!(
        "Feedback '{}' selects tone {} on section {}",
        entry.name, affected_tone, section
    );

    let payload = tone::payload_for_tone(section, i32::from(affected_tone)).clamp(0, 0x7F) as u8;
    if let Some(template) = map.tone_entry().template(section) {
        out.push(Outbound::sysex_to_hardware(format!(
            "{} 00 {} F7",
            template,
            int_to_hex(payload)
        )));
    }
    if let Some(template) = entry.template(section) {
        out.push(Outbound::sysex_to_hardware(format!("{} {} F7", template, value_hex)));
    }
    out
}
