//! Command-line interface and REPL

use anyhow::Result;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::state::SessionState;

/// Commands understood by the session console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Sections,
    Quit,
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_lowercase().as_str() {
        "status" | "s" => Some(ConsoleCommand::Status),
        "sections" | "tones" => Some(ConsoleCommand::Sections),
        "quit" | "exit" | "q" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

/// Blocking prompt loop. Run it on a blocking thread; commands go to the
/// event loop through `tx`. Ends on quit, EOF or when the loop is gone.
pub fn run_repl(tx: mpsc::Sender<ConsoleCommand>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        let line = match rl.readline("mp11> ") {
            Ok(line) => line,
            Err(_) => {
                let _ = tx.blocking_send(ConsoleCommand::Quit);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        match parse_command(&line) {
            Some(command) => {
                if tx.blocking_send(command).is_err() || command == ConsoleCommand::Quit {
                    break;
                }
            }
            None => println!("Commands: status, sections, quit"),
        }
    }

    Ok(())
}

pub fn format_status(state: &SessionState) -> String {
    let section = state.active_section();
    let banks = if state.banks_active {
        format!("on, bank {}", state.active_bank())
    } else {
        "off".to_string()
    };
    let toggles = state
        .toggles
        .iter()
        .map(|t| format!("cc{}={}", t.cc, if t.on { "on" } else { "off" }))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "active section: {} ({}), tone {} | banks: {} | toggles: {}",
        state.active_section_index, section.name, section.active_tone, banks, toggles
    )
}

pub fn format_sections(state: &SessionState) -> String {
    state
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if i == state.active_section_index { "*" } else { " " };
            format!("{} {}: {:10} tone {}", marker, i, s.name, s.active_tone)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
