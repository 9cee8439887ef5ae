//! Interactive REPL.

use crate::commands::format_outcome;
use colored::Colorize;
use jsonfsm_runner::{Config, Session};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::Path;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help
  inject <source> <payload>     Inject an event
  fire <trigger>                Fire a trigger by name
  state                         Show the current state
  reset                         Return to the initial state
  journal                       Show and clear executed commands

  quit, exit                    Exit the REPL
"#;

pub fn run(config: &Config, machine: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let mut session = Session::open(config, machine)?;

    println!("{}", "jsonfsm REPL".bold().cyan());
    println!(
        "Machine {} in state {}",
        session.machine().checksum(),
        session.machine().current_state().yellow()
    );

    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(rl_config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".jsonfsm_history"))
        .unwrap_or_else(|_| ".jsonfsm_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "jsonfsm>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut session, line) {
                    Some(output) => println!("{}\n", output),
                    None => break,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(String::new())
}

/// Executes one REPL line. Returns `None` on exit.
fn execute_repl_command(session: &mut Session, line: &str) -> Option<String> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let output = match cmd.to_lowercase().as_str() {
        "help" | "?" => HELP_TEXT.to_string(),

        "quit" | "exit" | "q" => return None,

        "inject" | "i" => {
            let parsed = rest
                .split_once(char::is_whitespace)
                .and_then(|(source, payload)| Some((source.parse::<u32>().ok()?, payload.trim())));
            match parsed {
                Some((source, payload)) if !payload.is_empty() => {
                    let report = session.step(source, payload);
                    format_state(session, &format_outcome(&report.outcome))
                }
                _ => "Usage: inject <source> <payload>".to_string(),
            }
        }

        "fire" | "f" => {
            if rest.is_empty() {
                "Usage: fire <trigger>".to_string()
            } else {
                let outcome = session.machine_mut().fire_trigger(rest);
                format_state(session, &format_outcome(&outcome))
            }
        }

        "state" | "s" => {
            let machine = session.machine();
            let triggers = machine.triggers_in_current_state();
            format!(
                "{}\n  triggers: {}",
                format_state(session, ""),
                if triggers.is_empty() {
                    "-".to_string()
                } else {
                    triggers.join(", ")
                }
            )
        }

        "reset" => {
            session.machine_mut().reset();
            format_state(session, "reset")
        }

        "journal" | "j" => {
            let entries = session.journal().drain();
            if entries.is_empty() {
                "No entries".yellow().to_string()
            } else {
                entries
                    .iter()
                    .map(|e| format!("[{}] {}", e.device_id.to_string().cyan(), e.command))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }

        _ => format!("Unknown command: {}. Type 'help' for help.", cmd),
    };

    Some(output)
}

fn format_state(session: &Session, prefix: &str) -> String {
    let machine = session.machine();
    let mut s = String::new();
    if !prefix.is_empty() {
        s.push_str(prefix);
        s.push_str(" => ");
    }
    s.push_str(&machine.current_state().yellow().to_string());
    if machine.is_current_state_final() {
        s.push_str(&" (final)".green().to_string());
    }
    s
}
