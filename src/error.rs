//! Error types for the gateway core
//!
//! Only structurally malformed input for a recognised control is an error.
//! Unmapped traffic is a normal outcome and never surfaces here.

use thiserror::Error;

/// A SysEx string matched a known control but its payload could not be extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed SysEx for '{control}': {reason} (input: {sysex:?})")]
    Malformed {
        control: String,
        reason: String,
        sysex: String,
    },
}

impl DecodeError {
    pub(crate) fn malformed(control: &str, reason: impl Into<String>, sysex: &str) -> Self {
        DecodeError::Malformed {
            control: control.to_string(),
            reason: reason.into(),
            sysex: sysex.to_string(),
        }
    }

    /// The raw SysEx string that failed to decode
    pub fn sysex(&self) -> &str {
        match self {
            DecodeError::Malformed { sysex, .. } => sysex,
        }
    }
}

/// Startup configuration problems. Fatal: raised before any message is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("control table has no entry named '{0}'")]
    MissingControl(String),

    #[error("control '{control}': {reason}")]
    InvalidControl { control: String, reason: String },

    #[error("control '{control}' has {found} SysEx templates, expected {expected}")]
    TemplateCount {
        control: String,
        found: usize,
        expected: usize,
    },

    #[error("control number {number} is assigned twice ({first} and {second})")]
    DuplicateControlNumber {
        number: u8,
        first: String,
        second: String,
    },

    #[error("section layout needs at least 3 sections, got {0}")]
    SectionCount(usize),

    #[error("invalid translator entry '{key}': {reason}")]
    InvalidTranslatorEntry { key: String, reason: String },

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures reported by the MIDI transport collaborator
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{direction} port '{name}' not found")]
    PortNotFound {
        direction: &'static str,
        name: String,
    },

    #[error("no open port with id {0}")]
    UnknownPort(usize),

    #[error("invalid ASCII SysEx '{0}'")]
    InvalidSysEx(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("MIDI backend: {0}")]
    Backend(String),
}

/// Anything that can go wrong while routing one inbound event
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
