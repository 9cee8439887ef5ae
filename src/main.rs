//! jsonfsm - check, replay and explore JSON-described state machines.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use jsonfsm_runner::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonfsm")]
#[command(about = "Validate, compile and run JSON-described feedback state machines")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "JSONFSM_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a machine description and print a summary
    Check {
        /// Machine description (JSON)
        machine: PathBuf,
    },

    /// Replay an event script against a machine
    Run {
        /// Machine description (JSON)
        machine: PathBuf,

        /// Event script, one `<eventSourceId> <payload>` per line
        events: PathBuf,

        /// Print one JSON object per step instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive prompt for a machine
    Repl {
        /// Machine description (JSON)
        machine: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.config {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let result: Result<String, Box<dyn std::error::Error>> = match cli.command {
        Commands::Check { machine } => commands::check(&machine).map_err(Into::into),
        Commands::Run {
            machine,
            events,
            json,
        } => commands::run(&config, &machine, &events, json),
        Commands::Repl { machine } => repl::run(&config, &machine),
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
