//! MP11 GW - Rust implementation
//!
//! Gateway between a Kawai MP11 stage piano and a DAW virtual MIDI port.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mp11_gw::cli::{self, ConsoleCommand};
use mp11_gw::control_map::SysExKind;
use mp11_gw::transport::{DeviceTransport, InboundEvent};
use mp11_gw::{sniffer, AppConfig, ControlMap, DispatchError, Session};

/// MP11 Gateway - Kawai MP11 SysEx/CC to DAW and back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs to a daily rotating file in this directory
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<String>,

    /// Run in sniffer mode (dry run, nothing is sent)
    #[arg(long)]
    sniffer: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print the loaded control map and exit
    #[arg(long)]
    test_mappings: bool,

    /// Do not start the interactive console
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    info!("Starting MP11 GW v{}...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    if args.list_ports {
        sniffer::list_ports_formatted(&config);
        return Ok(());
    }

    let map = Arc::new(
        config
            .load_control_map()
            .context("Failed to load control map")?,
    );

    if args.test_mappings {
        print_control_map(&map);
        return Ok(());
    }

    if args.sniffer {
        return sniffer::run_cli_sniffer(&config, map).await;
    }

    run_app(config, map, !args.no_console).await?;

    info!("MP11 GW shutdown complete");
    Ok(())
}

fn load_config(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        let config = AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?;
        info!("Configuration loaded from {}", path);
        Ok(config)
    } else {
        warn!("{} not found, using built-in defaults", path);
        Ok(AppConfig::default())
    }
}

async fn run_app(config: AppConfig, map: Arc<ControlMap>, console: bool) -> Result<()> {
    let (transport, mut event_rx) = DeviceTransport::new("MP11-GW");
    let mut session =
        Session::start(transport, &config, map).context("Failed to start MIDI session")?;
    info!("Ready to process MIDI events! {:?}", session.ports());

    let (console_tx, mut console_rx) = mpsc::channel::<ConsoleCommand>(16);
    if console {
        // Plain thread: a pending readline must not hold up runtime shutdown
        std::thread::spawn(move || {
            if let Err(e) = cli::run_repl(console_tx) {
                warn!("Console stopped: {}", e);
            }
        });
    } else {
        drop(console_tx);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => handle_event(&mut session, event),

            Some(command) = console_rx.recv() => match command {
                ConsoleCommand::Status => {
                    println!("{}", cli::format_status(session.router().state()))
                }
                ConsoleCommand::Sections => {
                    println!("{}", cli::format_sections(session.router().state()))
                }
                ConsoleCommand::Quit => {
                    info!("Console requested shutdown");
                    break;
                }
            },

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    session.close().context("Failed to release MIDI input")?;
    Ok(())
}

fn handle_event(session: &mut Session<DeviceTransport>, event: InboundEvent) {
    match session.dispatch(event) {
        Ok(sent) => debug!("{} message(s) sent", sent),
        Err(DispatchError::Decode(e)) => warn!("{}", e),
        Err(DispatchError::Transport(e)) => warn!("Send failed: {}", e),
    }
}

fn init_logging(level: &str, log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "mp11-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn print_control_map(map: &ControlMap) {
    println!("\n{}", "=== Control Map ===".bold().cyan());
    println!(
        "  Total controls: {}",
        map.entries().len().to_string().green()
    );
    println!("  Sections: {}", map.sections().join(", ").green());

    println!("\n{}", "Section controls:".bold());
    for entry in map.entries().iter().filter(|e| e.kind == SysExKind::Prefix) {
        let reverse = if entry.is_reverse_mapped {
            " [REVERSE]".yellow()
        } else {
            "".normal()
        };
        println!(
            "  {:12} cc {:3} x{}{}",
            entry.name.bright_white(),
            entry.control_number,
            entry.scale,
            reverse
        );
        for (section, template) in map.sections().iter().zip(&entry.sys_ex_templates) {
            println!("      {:8} {}", section, template.dimmed());
        }
    }

    println!("\n{}", "Transport (MMC) controls:".bold());
    for entry in map.entries().iter().filter(|e| e.kind == SysExKind::Simple) {
        println!(
            "  {:12} cc {:3}  {}",
            entry.name.bright_white(),
            entry.control_number,
            entry.sys_ex_templates.join(" ").green()
        );
    }

    println!("\n{}", "Control map check complete".green().bold());
}
