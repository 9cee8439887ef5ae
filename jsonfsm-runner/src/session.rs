//! Replay sessions.

use crate::config::Config;
use crate::devices::{build_compilers, Journal};
use crate::error::RunnerError;
use crate::script::ScriptEvent;
use jsonfsm_core::{parse_and_compile, InjectOutcome, MachineCompiler, StateMachine};
use serde::Serialize;
use std::path::Path;

/// Result of one injected event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub source: u32,
    pub payload: String,
    pub outcome: InjectOutcome,
    /// State after the event.
    pub state: String,
    pub is_final: bool,
}

/// A compiled machine bound to the configured devices.
#[derive(Debug)]
pub struct Session {
    machine: StateMachine,
    journal: Journal,
    stop_on_final: bool,
}

impl Session {
    /// Loads, validates and compiles a machine file.
    pub fn open(config: &Config, path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
        let session = Self::from_json(config, &json)?;
        tracing::info!("Loaded machine from {}", path.display());
        Ok(session)
    }

    /// Validates and compiles a machine description.
    pub fn from_json(config: &Config, json: &str) -> Result<Self, RunnerError> {
        let compiler = parse_and_compile(json)?;
        Self::compile(config, &compiler)
    }

    /// Compiles an already validated machine.
    pub fn compile(config: &Config, compiler: &MachineCompiler) -> Result<Self, RunnerError> {
        let journal = Journal::new();
        let compilers = build_compilers(config, compiler.required_devices(), &journal);
        let machine = compiler.compile(&compilers)?;

        tracing::info!(
            "Compiled machine {} (initial state '{}', {} devices)",
            machine.checksum(),
            machine.initial_state(),
            machine.controlled_device_ids().len()
        );

        Ok(Self {
            machine,
            journal,
            stop_on_final: config.run.stop_on_final,
        })
    }

    /// Injects one event.
    pub fn step(&mut self, source: u32, payload: &str) -> StepReport {
        let outcome = self.machine.fire(source, payload);
        StepReport {
            source,
            payload: payload.to_string(),
            outcome,
            state: self.machine.current_state().to_string(),
            is_final: self.machine.is_current_state_final(),
        }
    }

    /// Replays script events in order, stopping early on a final state if configured.
    pub fn replay(&mut self, events: &[ScriptEvent]) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(events.len());
        for event in events {
            let report = self.step(event.source, &event.payload);
            let stop = self.stop_on_final && report.is_final;
            reports.push(report);
            if stop {
                tracing::info!(
                    "Reached final state '{}' at script line {}",
                    self.machine.current_state(),
                    event.line
                );
                break;
            }
        }
        reports
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    /// Commands executed by print and fail devices.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}
