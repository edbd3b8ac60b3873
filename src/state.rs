//! Session state - sections, active tones, bank mode and toggles
//!
//! One instance per running session, owned by the router and mutated only
//! on the single event-processing path.

use crate::config::ToggleEntry;

/// Section activated when a session starts (the E.PIANO zone)
pub const DEFAULT_ACTIVE_SECTION: usize = 1;

/// Number of banks addressable by bank select (groups A/B x slots 1-8)
pub const BANK_COUNT: u8 = 16;

/// A performance zone on the piano
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    /// Active tone/channel within the section
    pub active_tone: u8,
}

/// Toggle state for a SysEx command whose CC alternates on/off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub sysex: String,
    pub cc: u8,
    pub on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub sections: Vec<Section>,
    pub active_section_index: usize,
    pub banks_active: bool,
    active_bank: u8,
    pub toggles: Vec<Toggle>,
    initial_toggles: Vec<Toggle>,
}

impl SessionState {
    pub fn new(section_names: &[String], toggles: &[ToggleEntry]) -> Self {
        let toggles: Vec<Toggle> = toggles
            .iter()
            .map(|t| Toggle {
                sysex: t.sysex.clone(),
                cc: t.cc,
                on: t.initial,
            })
            .collect();

        Self {
            sections: section_names
                .iter()
                .map(|name| Section {
                    name: name.clone(),
                    active_tone: 0,
                })
                .collect(),
            active_section_index: DEFAULT_ACTIVE_SECTION.min(section_names.len().saturating_sub(1)),
            banks_active: false,
            active_bank: 0,
            initial_toggles: toggles.clone(),
            toggles,
        }
    }

    /// Back to the session-start state
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.active_tone = 0;
        }
        self.active_section_index =
            DEFAULT_ACTIVE_SECTION.min(self.sections.len().saturating_sub(1));
        self.banks_active = false;
        self.active_bank = 0;
        self.toggles = self.initial_toggles.clone();
    }

    pub fn active_section(&self) -> &Section {
        &self.sections[self.active_section_index]
    }

    pub fn active_section_mut(&mut self) -> &mut Section {
        &mut self.sections[self.active_section_index]
    }

    /// Bank offset applied to outgoing channels (0 while bank mode is off)
    pub fn active_bank(&self) -> u8 {
        if self.banks_active {
            self.active_bank
        } else {
            0
        }
    }

    pub fn set_banks_active(&mut self, on: bool) {
        self.banks_active = on;
        if !on {
            self.active_bank = 0;
        }
    }

    pub fn select_bank(&mut self, bank: u8) {
        self.active_bank = bank % BANK_COUNT;
    }

    /// Indices of all sections currently on `tone`
    pub fn sections_on_tone(&self, tone: u8) -> impl Iterator<Item = usize> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.active_tone == tone)
            .map(|(i, _)| i)
    }

    /// Flip a toggle and return its new state
    pub fn flip_toggle(&mut self, index: usize) -> bool {
        let toggle = &mut self.toggles[index];
        toggle.on = !toggle.on;
        toggle.on
    }
}
