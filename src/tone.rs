//! Tone/channel arithmetic for the piano sections
//!
//! The two single sections carry 12 tones each, numbered consecutively in the
//! tone-select payload (section 1 starts at 12). The sub section carries 16
//! channels starting at 24; every 4th sub channel (3, 7, 11, 15) is kept for a
//! DAW return track and lands on tones 12..=15, the rest fill 0..=11.

/// Tones per single section
pub const SINGLE_SECTION_TONES: i32 = 12;

/// Payload value of the first sub-section channel
pub const SUB_CHANNEL_BASE: i32 = 24;

/// Number of sub-section channels
pub const SUB_CHANNELS: i32 = 16;

/// Sections below this index are single sections
pub const SINGLE_SECTIONS: usize = 2;

pub fn is_single_section(section_index: usize) -> bool {
    section_index < SINGLE_SECTIONS
}

/// Sub-section raw channel (0..16) to tone index
pub fn sub_channel_to_tone(raw: i32) -> i32 {
    let is_return = (raw + 1) % 4 == 0;
    raw - raw / 4 + i32::from(is_return) * (11 - 2 * ((raw + 1) / 4))
}

/// Tone index (0..16) back to the sub-section raw channel
pub fn tone_to_sub_channel(tone: i32) -> i32 {
    tone + tone / 3 - (i32::from(tone > 11) * (4 + 3 * (15 - tone)) + i32::from(tone == 15))
}

/// Tone selected by a tone-select payload, `None` when it falls outside the section
pub fn tone_from_payload(section_index: usize, payload: i32) -> Option<i32> {
    if is_single_section(section_index) {
        let tone = payload - section_index as i32 * SINGLE_SECTION_TONES;
        (0..SINGLE_SECTION_TONES).contains(&tone).then_some(tone)
    } else {
        let raw = payload - SUB_CHANNEL_BASE;
        (0..SUB_CHANNELS)
            .contains(&raw)
            .then(|| sub_channel_to_tone(raw))
    }
}

/// Tone-select payload that activates `tone` on a section
pub fn payload_for_tone(section_index: usize, tone: i32) -> i32 {
    if is_single_section(section_index) {
        tone + section_index as i32 * SINGLE_SECTION_TONES
    } else {
        tone_to_sub_channel(tone) + SUB_CHANNEL_BASE
    }
}
