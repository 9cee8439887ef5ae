//! One-shot command execution.

use colored::Colorize;
use jsonfsm_core::{InjectOutcome, MachineCompiler};
use jsonfsm_runner::{load_script, Config, RunnerError, Session, StepReport};
use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;

/// Validates a machine file and summarizes it.
pub fn check(path: &Path) -> Result<String, RunnerError> {
    let json = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let compiler = MachineCompiler::parse(&json)?;
    let desc = compiler.descriptor();

    let states: Vec<&str> = desc.states().iter().map(|s| s.name.as_str()).collect();
    let mut output = format!("{} {}\n", "OK".green().bold(), path.display());
    output.push_str(&format!("  checksum:      {}\n", compiler.checksum()));
    output.push_str(&format!(
        "  initial state: {}\n",
        desc.initial_state().cyan()
    ));
    output.push_str(&format!(
        "  final states:  {}\n",
        desc.final_states().join(", ")
    ));
    output.push_str(&format!("  states:        {}\n", states.join(", ")));
    output.push_str(&format!("  triggers:      {}\n", desc.triggers().len()));
    output.push_str(&format!(
        "  devices:       {}\n",
        format_ids(compiler.required_devices())
    ));
    output.push_str(&format!(
        "  event sources: {}",
        format_ids(compiler.accepted_event_sources())
    ));
    Ok(output)
}

/// Replays an event script and prints each step followed by the journal.
pub fn run(
    config: &Config,
    machine: &Path,
    events: &Path,
    json: bool,
) -> Result<String, Box<dyn Error>> {
    let events = load_script(events)?;
    let mut session = Session::open(config, machine)?;
    let reports = session.replay(&events);

    if json {
        return Ok(json_lines(&reports)?);
    }

    let mut output = String::new();

    for report in &reports {
        output.push_str(&format_step(report));
        output.push('\n');
    }

    let journal = session.journal().entries();
    if !journal.is_empty() {
        output.push_str(&format!("\n{}\n", "Journal:".bold()));
        for entry in journal {
            output.push_str(&format!(
                "  [{}] {}\n",
                entry.device_id.to_string().cyan(),
                entry.command
            ));
        }
    }

    Ok(output.trim_end().to_string())
}

/// Renders one JSON object per step.
pub fn json_lines(reports: &[StepReport]) -> Result<String, serde_json::Error> {
    let lines = reports
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

pub fn format_step(report: &StepReport) -> String {
    let marker = if report.is_final {
        " (final)".green().to_string()
    } else {
        String::new()
    };
    format!(
        "{}:{} {} => {}{}",
        report.source,
        report.payload,
        format_outcome(&report.outcome),
        report.state.yellow(),
        marker
    )
}

pub fn format_outcome(outcome: &InjectOutcome) -> String {
    match outcome {
        InjectOutcome::UnknownEvent => "unknown event".dimmed().to_string(),
        InjectOutcome::Unhandled { trigger } => format!("{} unhandled", trigger.cyan()),
        InjectOutcome::Ignored { trigger } => format!("{} ignored", trigger.cyan()),
        InjectOutcome::Transitioned {
            trigger,
            from,
            to,
            failed_behaviors,
        } => {
            let mut s = format!("{} {} → {}", trigger.cyan(), from, to);
            if *failed_behaviors > 0 {
                s.push_str(&format!(" ({} failed)", failed_behaviors).red().to_string());
            }
            s
        }
    }
}

fn format_ids(ids: &BTreeSet<u32>) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}
