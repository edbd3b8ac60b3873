//! Configuration management for MP11 GW
//!
//! Loads the YAML application config: port names, section layout, the
//! transport/bank translator tables and the control table location.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::control_map::{default_section_names, load_default_map, ControlMap};
use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub ports: PortsConfig,
    /// Path to the controller reference CSV (embedded table when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_map: Option<String>,
    #[serde(default = "default_section_names")]
    pub sections: Vec<String>,
    #[serde(default)]
    pub translator: TranslatorConfig,
    /// Forward SysEx no table recognises to the DAW instead of dropping it
    #[serde(default)]
    pub forward_unmatched_sysex: bool,
    /// Emit the tone-select CC for the active section once the session starts
    #[serde(default)]
    pub announce_active_track: bool,
}

/// The two fixed MIDI endpoints
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PortsConfig {
    #[serde(default = "default_hardware_ports")]
    pub hardware: PortNames,
    #[serde(default = "default_daw_ports")]
    pub daw: PortNames,
}

/// Input/output port names (case-insensitive substring match)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PortNames {
    pub input: String,
    pub output: String,
}

/// Fixed SysEx tables of the transport/bank translator
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TranslatorConfig {
    #[serde(default = "default_toggles")]
    pub toggles: Vec<ToggleEntry>,
    #[serde(default = "default_simple")]
    pub simple: Vec<SimpleEntry>,
    #[serde(default = "default_faders")]
    pub faders: Vec<FaderEntry>,
    #[serde(default = "default_bank_control_number")]
    pub bank_control_number: u8,
}

/// A SysEx command whose CC output alternates on/off
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToggleEntry {
    pub sysex: String,
    pub cc: u8,
    #[serde(default)]
    pub initial: bool,
}

/// A SysEx command answered by one of two CCs depending on bank mode
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SimpleEntry {
    pub sysex: String,
    /// CC sent while bank mode is off
    pub global: u8,
    /// CC sent while bank mode is on
    pub local: u8,
}

/// A SysEx prefix followed by a 0-127 fader value
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FaderEntry {
    pub prefix: String,
    pub cc: u8,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    /// Build the control map this config points at
    pub fn load_control_map(&self) -> Result<ControlMap, ConfigError> {
        match &self.control_map {
            Some(path) => ControlMap::load_from_path(path, &self.sections),
            None if self.sections == default_section_names() => load_default_map(),
            None => ControlMap::from_csv(crate::control_map::DEFAULT_CSV, &self.sections),
        }
    }

    /// Validate translator tables
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.translator;
        let bad = |key: &str, reason: &str| ConfigError::InvalidTranslatorEntry {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        for toggle in &t.toggles {
            if toggle.cc > 127 {
                return Err(bad(&toggle.sysex, "cc must be 0-127"));
            }
        }
        for simple in &t.simple {
            if simple.global > 127 || simple.local > 127 {
                return Err(bad(&simple.sysex, "cc must be 0-127"));
            }
        }
        for fader in &t.faders {
            if fader.cc > 127 {
                return Err(bad(&fader.prefix, "cc must be 0-127"));
            }
            if !fader.prefix.ends_with(' ') {
                return Err(bad(&fader.prefix, "prefix must end with a space before the value"));
            }
        }
        if t.bank_control_number > 127 {
            return Err(bad("bank_control_number", "cc must be 0-127"));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ports: PortsConfig::default(),
            control_map: None,
            sections: default_section_names(),
            translator: TranslatorConfig::default(),
            forward_unmatched_sysex: false,
            announce_active_track: false,
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            hardware: default_hardware_ports(),
            daw: default_daw_ports(),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            toggles: default_toggles(),
            simple: default_simple(),
            faders: default_faders(),
            bank_control_number: default_bank_control_number(),
        }
    }
}

// Default value functions
fn default_hardware_ports() -> PortNames {
    PortNames {
        input: "KAWAI USB MIDI".to_string(),
        output: "KAWAI USB MIDI".to_string(),
    }
}

fn default_daw_ports() -> PortNames {
    PortNames {
        input: "loopMIDI Port 1".to_string(),
        output: "loopMIDI Port".to_string(),
    }
}

fn default_toggles() -> Vec<ToggleEntry> {
    // RECORD
    vec![ToggleEntry {
        sysex: "F0 7F 00 06 06 F7".to_string(),
        cc: 3,
        initial: false,
    }]
}

fn default_simple() -> Vec<SimpleEntry> {
    let entry = |sysex: &str, global, local| SimpleEntry {
        sysex: sysex.to_string(),
        global,
        local,
    };
    vec![
        entry("F0 7F 00 06 02 F7", 0, 9),   // PLAY
        entry("F0 7F 00 06 04 F7", 14, 0),  // FAST FORWARD
        entry("F0 7F 00 06 05 F7", 15, 0),  // REWIND
        entry("F0 7F 00 06 08 F7", 21, 20), // RECORD PAUSE
    ]
}

fn default_faders() -> Vec<FaderEntry> {
    vec![
        FaderEntry {
            prefix: "F0 40 00 10 00 12 40 01 70 01 ".to_string(),
            cc: 22,
        },
        FaderEntry {
            prefix: "F0 40 00 10 00 12 40 04 38 01 ".to_string(),
            cc: 23,
        },
    ]
}

fn default_bank_control_number() -> u8 {
    110
}
