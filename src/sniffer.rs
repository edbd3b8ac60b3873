//! MIDI sniffer for debugging mappings
//!
//! Listens on the piano input, runs every message through a private router
//! and prints what the gateway would send. Nothing is sent.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;

use crate::config::AppConfig;
use crate::control_map::ControlMap;
use crate::event::{Outbound, PortRole};
use crate::midi::format_hex;
use crate::router::Router;
use crate::transport::device::discovery;
use crate::transport::{DeviceTransport, InboundEvent, Transport};

/// Direction of a printed message
#[derive(Debug, Clone, Copy)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn display(&self) -> ColoredString {
        match self {
            Direction::Input => "IN ".green(),
            Direction::Output => "OUT".red(),
        }
    }
}

/// CLI sniffer on the configured hardware input
pub async fn run_cli_sniffer(config: &AppConfig, map: Arc<ControlMap>) -> Result<()> {
    println!("{}", "=== MP11 Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (mut transport, mut event_rx) = DeviceTransport::new("MP11-GW-Sniffer");
    transport
        .resolve_input_port(&config.ports.hardware.input)
        .with_context(|| format!("Failed to open '{}'", config.ports.hardware.input))?;
    transport.set_input_firing(true)?;

    let mut router = Router::new(config, map);
    let start_time = Instant::now();

    println!("{}", "Monitoring MIDI traffic (dry run)...".green());
    println!(
        "{}",
        "Format: [timestamp] DIR | HEX => PARSED".dimmed()
    );
    println!("{}\n", "─".repeat(80).dimmed());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                let elapsed = start_time.elapsed().as_millis() as u64;
                print_event(&mut router, elapsed, event);
            }
            _ = &mut shutdown => break,
        }
    }

    transport.set_input_firing(false)?;
    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

fn print_event(router: &mut Router, timestamp_ms: u64, event: InboundEvent) {
    let timestamp = format!("{:08}", timestamp_ms);

    let outbound = match event {
        InboundEvent::SysEx { text, .. } => {
            println!(
                "[{}ms] {} | {}",
                timestamp.dimmed(),
                Direction::Input.display(),
                text.trim_end().bright_magenta()
            );
            match router.on_sysex_from_hardware(&text) {
                Ok(out) => out,
                Err(e) => {
                    println!("           {} {}", "ERR".bright_red(), e);
                    return;
                }
            }
        }
        InboundEvent::Short { message, .. } => {
            let hex = format_hex(&message.encode());
            let hex = if message.is_control_change() {
                hex.bright_yellow()
            } else {
                hex.normal()
            };
            println!(
                "[{}ms] {} | {} => {}",
                timestamp.dimmed(),
                Direction::Input.display(),
                hex,
                message.to_string().bright_blue()
            );
            router.on_midi_from_hardware(message)
        }
    };

    if outbound.is_empty() {
        println!("           {}", "(nothing sent)".dimmed());
    }
    for out in &outbound {
        println!("           {} {}", Direction::Output.display(), describe(out));
    }
}

/// One-line description of a message the gateway would send
pub fn describe(out: &Outbound) -> String {
    match out {
        Outbound::Short { port, message } => format!(
            "{:8} | {} => {}",
            port.to_string(),
            format_hex(&message.encode()),
            message
        ),
        Outbound::SysEx { port, text } => format!("{:8} | {}", port.to_string(), text),
    }
}

/// List all ports in a formatted way
pub fn list_ports_formatted(config: &AppConfig) {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let marker = |is_virtual: bool| {
        if is_virtual {
            "[VIRTUAL]".yellow()
        } else {
            "[PHYSICAL]".green()
        }
    };

    if let Ok(inputs) = discovery::discover_input_ports() {
        println!("\n{}", "Input Ports:".bold());
        if inputs.is_empty() {
            println!("  {}", "No input ports found".dimmed());
        }
        for port in inputs {
            println!("  {} {}: {}", marker(port.is_virtual), port.index, port.name);
        }
    }

    if let Ok(outputs) = discovery::discover_output_ports() {
        println!("\n{}", "Output Ports:".bold());
        if outputs.is_empty() {
            println!("  {}", "No output ports found".dimmed());
        }
        for port in outputs {
            println!("  {} {}: {}", marker(port.is_virtual), port.index, port.name);
        }
    }

    println!("\n{}", "Configured:".bold());
    for (role, names) in [
        (PortRole::Hardware, &config.ports.hardware),
        (PortRole::Daw, &config.ports.daw),
    ] {
        println!(
            "  {:8} in: {}  out: {}",
            role.to_string(),
            names.input.bright_white(),
            names.output.bright_white()
        );
    }

    println!();
}
