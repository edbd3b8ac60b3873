//! Session lifecycle and dispatch against a recording transport

use std::sync::Arc;

use parking_lot::Mutex;

use mp11_gw::control_map::load_default_map;
use mp11_gw::error::TransportError;
use mp11_gw::midi::ShortMessage;
use mp11_gw::session::PortMap;
use mp11_gw::transport::{InboundEvent, Transport};
use mp11_gw::{AppConfig, DispatchError, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Diversion(bool),
    Firing(bool),
    Short(usize, [u8; 3]),
    SysEx(usize, String),
}

/// Ports in the order the mock exposes them
const INPUTS: [&str; 2] = ["KAWAI USB MIDI", "loopMIDI Port 1"];
const OUTPUTS: [&str; 2] = ["loopMIDI Port", "KAWAI USB MIDI"];

#[derive(Clone, Default)]
struct MockTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_firing: bool,
}

impl MockTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn sent(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Short(..) | Call::SysEx(..)))
            .collect()
    }
}

impl Transport for MockTransport {
    fn resolve_output_port(&mut self, name: &str) -> Result<usize, TransportError> {
        OUTPUTS
            .iter()
            .position(|p| *p == name)
            .ok_or_else(|| TransportError::PortNotFound {
                direction: "output",
                name: name.to_string(),
            })
    }

    fn resolve_input_port(&mut self, name: &str) -> Result<usize, TransportError> {
        INPUTS
            .iter()
            .position(|p| *p == name)
            .map(|i| i + 1)
            .ok_or_else(|| TransportError::PortNotFound {
                direction: "input",
                name: name.to_string(),
            })
    }

    fn send_raw_midi(
        &mut self,
        port_id: usize,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), TransportError> {
        self.calls
            .lock()
            .push(Call::Short(port_id, [status, data1, data2]));
        Ok(())
    }

    fn send_sysex(&mut self, port_id: usize, text: &str) -> Result<(), TransportError> {
        self.calls.lock().push(Call::SysEx(port_id, text.to_string()));
        Ok(())
    }

    fn set_input_diversion(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Diversion(enabled));
        Ok(())
    }

    fn set_input_firing(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.calls.lock().push(Call::Firing(enabled));
        if enabled && self.fail_firing {
            return Err(TransportError::Backend("firing refused".to_string()));
        }
        Ok(())
    }
}

fn start(config: &AppConfig) -> (Session<MockTransport>, MockTransport) {
    let mock = MockTransport::default();
    let map = Arc::new(load_default_map().unwrap());
    let session = Session::start(mock.clone(), config, map).unwrap();
    (session, mock)
}

fn sysex_from_piano(text: &str) -> InboundEvent {
    InboundEvent::SysEx {
        port_id: 0,
        text: text.to_string(),
    }
}

#[test]
fn test_input_ids_are_corrected() {
    let mut mock = MockTransport::default();
    let ports = PortMap::resolve(&mut mock, &AppConfig::default().ports).unwrap();
    assert_eq!(
        ports,
        PortMap {
            hardware_in: 0,
            hardware_out: 1,
            daw_in: 1,
            daw_out: 0,
        }
    );
}

#[test]
fn test_start_enables_and_close_disables() {
    let (mut session, mock) = start(&AppConfig::default());
    assert_eq!(
        mock.calls(),
        vec![Call::Diversion(true), Call::Firing(true)]
    );

    session.close().unwrap();
    assert!(session.is_closed());
    assert_eq!(
        mock.calls()[2..].to_vec(),
        vec![Call::Firing(false), Call::Diversion(false)]
    );
}

#[test]
fn test_close_is_idempotent_and_runs_on_drop() {
    let (mut session, mock) = start(&AppConfig::default());
    session.close().unwrap();
    session.close().unwrap();
    drop(session);

    let releases = mock
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Firing(false)))
        .count();
    assert_eq!(releases, 1);

    let (session, mock) = start(&AppConfig::default());
    drop(session);
    assert_eq!(mock.calls().last(), Some(&Call::Diversion(false)));
}

#[test]
fn test_failed_start_releases_input() {
    let mock = MockTransport {
        fail_firing: true,
        ..MockTransport::default()
    };
    let map = Arc::new(load_default_map().unwrap());
    assert!(Session::start(mock.clone(), &AppConfig::default(), map).is_err());
    assert_eq!(
        mock.calls(),
        vec![
            Call::Diversion(true),
            Call::Firing(true),
            Call::Firing(false),
            Call::Diversion(false),
        ]
    );
}

#[test]
fn test_unknown_port_fails_start() {
    let mut config = AppConfig::default();
    config.ports.daw.output = "No Such Port".to_string();
    let map = Arc::new(load_default_map().unwrap());
    let result = Session::start(MockTransport::default(), &config, map);
    assert!(matches!(result, Err(TransportError::PortNotFound { .. })));
}

#[test]
fn test_play_goes_to_daw_port() {
    let (mut session, mock) = start(&AppConfig::default());
    let sent = session
        .dispatch(sysex_from_piano("F0 7F 00 06 02 F7 "))
        .unwrap();
    assert_eq!(sent, 1);
    assert_eq!(mock.sent(), vec![Call::Short(0, [0xB0, 0, 127])]);
}

#[test]
fn test_feedback_goes_to_piano_port() {
    let (mut session, mock) = start(&AppConfig::default());
    let event = InboundEvent::Short {
        timestamp: 0,
        port_id: 1,
        message: ShortMessage::new(0xB0, 7, 100),
    };
    // all sections start on tone 0
    assert_eq!(session.dispatch(event).unwrap(), 3);
    assert!(mock
        .sent()
        .iter()
        .all(|c| matches!(c, Call::SysEx(1, text) if text.ends_with(" 64 F7"))));
}

#[test]
fn test_hardware_midi_forwarded_and_sustain_dropped() {
    let (mut session, mock) = start(&AppConfig::default());
    let note = InboundEvent::Short {
        timestamp: 10,
        port_id: 0,
        message: ShortMessage::new(0x90, 60, 90),
    };
    let sustain = InboundEvent::Short {
        timestamp: 20,
        port_id: 0,
        message: ShortMessage::new(0xB0, 64, 127),
    };
    assert_eq!(session.dispatch(note).unwrap(), 1);
    assert_eq!(session.dispatch(sustain).unwrap(), 0);
    assert_eq!(mock.sent(), vec![Call::Short(0, [0x90, 60, 90])]);
}

#[test]
fn test_daw_sysex_ignored() {
    let (mut session, mock) = start(&AppConfig::default());
    let event = InboundEvent::SysEx {
        port_id: 1,
        text: "F0 7F 00 06 02 F7 ".to_string(),
    };
    assert_eq!(session.dispatch(event).unwrap(), 0);
    assert!(mock.sent().is_empty());
}

#[test]
fn test_malformed_sysex_reported() {
    let (mut session, mock) = start(&AppConfig::default());
    let err = session
        .dispatch(sysex_from_piano("F0 40 00 10 00 12 40 10 01 01 "))
        .unwrap_err();
    assert!(matches!(err, DispatchError::Decode(_)));
    assert!(mock.sent().is_empty());
}

#[test]
fn test_nothing_sent_after_close() {
    let (mut session, mock) = start(&AppConfig::default());
    session.close().unwrap();

    assert_eq!(
        session
            .dispatch(sysex_from_piano("F0 7F 00 06 02 F7 "))
            .unwrap(),
        0
    );
    assert_eq!(session.announce_active_track().unwrap(), 0);
    assert!(mock.sent().is_empty());
}

#[test]
fn test_announce_on_start() {
    let config = AppConfig {
        announce_active_track: true,
        ..AppConfig::default()
    };
    let (_session, mock) = start(&config);
    assert_eq!(mock.sent(), vec![Call::Short(0, [0xB0, 102, 127])]);
}
