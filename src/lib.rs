//! MP11 GW - Kawai MP11 to DAW MIDI gateway
//!
//! Translates the piano's SysEx and channel messages into CCs for a DAW's
//! virtual port, and DAW CC feedback back into SysEx for the piano.

pub mod cli;
pub mod config;
pub mod control_map;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod midi;
pub mod router;
pub mod session;
pub mod sniffer;
pub mod state;
pub mod tone;
pub mod transport;
pub mod translator;

pub use config::AppConfig;
pub use control_map::ControlMap;
pub use error::{ConfigError, DecodeError, DispatchError, TransportError};
pub use router::Router;
pub use session::Session;
