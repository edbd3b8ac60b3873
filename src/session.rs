//! Gateway session - port resolution, lifecycle and dispatch
//!
//! A [`Session`] resolves the four port ids once, switches input diversion
//! and firing on, and hands every inbound event to its [`Router`]. Closing is
//! idempotent, happens on drop at the latest, and stops all output.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AppConfig, PortsConfig};
use crate::control_map::ControlMap;
use crate::error::{DispatchError, TransportError};
use crate::event::{Outbound, PortRole};
use crate::router::Router;
use crate::transport::{InboundEvent, Transport};

/// Port ids for both endpoints, fixed for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMap {
    pub hardware_in: usize,
    pub hardware_out: usize,
    pub daw_in: usize,
    pub daw_out: usize,
}

impl PortMap {
    /// Resolve all ports. Input ids are shifted down by one to match the ids
    /// inbound notifications carry.
    pub fn resolve<T: Transport>(
        transport: &mut T,
        ports: &PortsConfig,
    ) -> Result<Self, TransportError> {
        let map = Self {
            hardware_out: transport.resolve_output_port(&ports.hardware.output)?,
            daw_out: transport.resolve_output_port(&ports.daw.output)?,
            hardware_in: transport
                .resolve_input_port(&ports.hardware.input)?
                .saturating_sub(1),
            daw_in: transport.resolve_input_port(&ports.daw.input)?.saturating_sub(1),
        };
        debug!("Resolved ports: {:?}", map);
        Ok(map)
    }

    fn output(&self, role: PortRole) -> usize {
        match role {
            PortRole::Hardware => self.hardware_out,
            PortRole::Daw => self.daw_out,
        }
    }
}

pub struct Session<T: Transport> {
    transport: T,
    ports: PortMap,
    router: Router,
    closed: bool,
}

impl<T: Transport> Session<T> {
    /// Resolve ports and start receiving. On any failure the transport is
    /// released before the error is returned.
    pub fn start(
        mut transport: T,
        config: &AppConfig,
        map: Arc<ControlMap>,
    ) -> Result<Self, TransportError> {
        let ports = PortMap::resolve(&mut transport, &config.ports)?;

        let mut session = Self {
            transport,
            ports,
            router: Router::new(config, map),
            closed: false,
        };

        session.transport.set_input_diversion(true)?;
        session.transport.set_input_firing(true)?;
        info!("Session started");

        if config.announce_active_track {
            session.announce_active_track()?;
        }

        Ok(session)
    }

    /// Route one inbound event and send what it produces. Returns the number
    /// of messages sent.
    pub fn dispatch(&mut self, event: InboundEvent) -> Result<usize, DispatchError> {
        if self.closed {
            return Ok(0);
        }

        let outbound = match event {
            InboundEvent::SysEx { port_id, text } if port_id == self.ports.hardware_in => {
                self.router.on_sysex_from_hardware(&text)?
            }
            InboundEvent::Short {
                port_id, message, ..
            } if port_id == self.ports.hardware_in => self.router.on_midi_from_hardware(message),
            InboundEvent::Short {
                port_id, message, ..
            } if port_id == self.ports.daw_in => self.router.on_feedback_from_daw(message),
            other => {
                debug!("Ignoring {:?}", other);
                return Ok(0);
            }
        };

        Ok(self.send_all(&outbound)?)
    }

    /// Send the tone-select trigger for the active section
    pub fn announce_active_track(&mut self) -> Result<usize, TransportError> {
        if self.closed {
            return Ok(0);
        }
        let outbound = self.router.announce_active_track();
        self.send_all(&outbound)
    }

    fn send_all(&mut self, outbound: &[Outbound]) -> Result<usize, TransportError> {
        for out in outbound {
            debug!("{}", out);
            let port_id = self.ports.output(out.port());
            match out {
                Outbound::Short { message, .. } => self.transport.send_short(port_id, *message)?,
                Outbound::SysEx { text, .. } => self.transport.send_sysex(port_id, text)?,
            }
        }
        Ok(outbound.len())
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn ports(&self) -> PortMap {
        self.ports
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop input firing, then diversion. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let firing = self.transport.set_input_firing(false);
        let diversion = self.transport.set_input_diversion(false);
        info!("Session closed");
        firing.and(diversion)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to release MIDI input: {}", e);
        }
    }
}
