//! Router - classification and state for one gateway session
//!
//! The Router is the single coordinator the event loop feeds:
//! - Hardware SysEx: translator tables first, then the control map
//! - Hardware channel messages: sustain filter and bank channel shift
//! - DAW CC feedback: SysEx updates for the piano display
//!
//! It owns the session state and returns the outbound messages for each
//! inbound one. Nothing is sent from here.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::control_map::ControlMap;
use crate::decoder;
use crate::encoder;
use crate::error::DecodeError;
use crate::event::{DecodedEvent, Outbound};
use crate::midi::{ShortMessage, TRIGGER_VALUE};
use crate::state::SessionState;
use crate::translator::Translator;

pub struct Router {
    map: Arc<ControlMap>,
    translator: Translator,
    state: SessionState,
    forward_unmatched_sysex: bool,
}

impl Router {
    pub fn new(config: &AppConfig, map: Arc<ControlMap>) -> Self {
        let state = SessionState::new(map.sections(), &config.translator.toggles);
        Self {
            translator: Translator::new(&config.translator),
            state,
            map,
            forward_unmatched_sysex: config.forward_unmatched_sysex,
        }
    }

    /// Classify one SysEx string from the piano.
    ///
    /// Transport/bank tables take priority over the control map. Unmatched
    /// SysEx is dropped unless forwarding is enabled.
    pub fn on_sysex_from_hardware(&mut self, raw: &str) -> Result<Vec<Outbound>, DecodeError> {
        trace!("SysEx in: {}", raw);

        let event = match self.translator.translate_sysex(&mut self.state, raw)? {
            Some(event) => Some(event),
            None => decoder::decode(&self.map, &mut self.state, raw)?,
        };

        let event = match event {
            Some(event) => event,
            None if self.forward_unmatched_sysex => {
                DecodedEvent::SysExPassThrough(raw.trim_end().to_string())
            }
            None => {
                debug!("Unmatched SysEx dropped: {}", raw.trim_end());
                return Ok(Vec::new());
            }
        };

        debug!("Decoded {:?}", event);
        Ok(encoder::encode(&event, &self.state))
    }

    /// Channel message from the piano
    pub fn on_midi_from_hardware(&mut self, msg: ShortMessage) -> Vec<Outbound> {
        trace!("MIDI in: {}", msg);
        match self.translator.translate_short(&self.state, msg) {
            Some(event) => encoder::encode(&event, &self.state),
            None => {
                trace!("Filtered {}", msg);
                Vec::new()
            }
        }
    }

    /// Channel message from the DAW. Only reverse-mapped CCs produce output.
    pub fn on_feedback_from_daw(&mut self, msg: ShortMessage) -> Vec<Outbound> {
        trace!("Feedback in: {}", msg);
        encoder::encode_feedback(&self.map, &mut self.state, msg)
    }

    /// Tone-select trigger for the active section, sent once at session start
    pub fn announce_active_track(&self) -> Vec<Outbound> {
        let section = self.state.active_section();
        vec![Outbound::to_daw(ShortMessage::control_change(
            section.active_tone,
            self.map.tone_entry().control_number,
            TRIGGER_VALUE,
        ))]
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn map(&self) -> &ControlMap {
        &self.map
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}
