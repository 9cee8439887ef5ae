//! Compiler - binds a validated description to device command compilers.

use crate::command::{panic_message, CommandChain, GuardedCommand};
use crate::descriptor::{Behavior, MachineDescriptor, Reaction};
use crate::device::DeviceCompilers;
use crate::error::{CompilationError, Location, ValidationError};
use crate::machine::{Program, StateMachine};
use crate::table::{Rule, TransitionTable};
use crate::translator::EventTranslator;
use std::collections::{BTreeSet, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Parses and validates JSON text, returning a compiler for it.
pub fn parse_and_compile(json: &str) -> Result<MachineCompiler, ValidationError> {
    MachineCompiler::parse(json)
}

/// A validated description waiting for its device compilers.
#[derive(Debug, Clone)]
pub struct MachineCompiler {
    descriptor: MachineDescriptor,
    required_devices: BTreeSet<u32>,
    accepted_event_sources: BTreeSet<u32>,
}

impl MachineCompiler {
    /// Parses and validates JSON text.
    pub fn parse(json: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(MachineDescriptor::from_json(json)?))
    }

    /// Validates an already parsed JSON document.
    pub fn from_value(json: &serde_json::Value) -> Result<Self, ValidationError> {
        Ok(Self::new(MachineDescriptor::from_value(json)?))
    }

    pub fn new(descriptor: MachineDescriptor) -> Self {
        let required_devices = descriptor.required_devices();
        let accepted_event_sources = descriptor.accepted_event_sources();
        Self {
            descriptor,
            required_devices,
            accepted_event_sources,
        }
    }

    pub fn descriptor(&self) -> &MachineDescriptor {
        &self.descriptor
    }

    /// Device ids a compiler must be supplied for.
    pub fn required_devices(&self) -> &BTreeSet<u32> {
        &self.required_devices
    }

    /// Event source ids the machine will react to.
    pub fn accepted_event_sources(&self) -> &BTreeSet<u32> {
        &self.accepted_event_sources
    }

    pub fn checksum(&self) -> &str {
        self.descriptor.checksum()
    }

    /// Compiles every behavior and effect and builds a runnable state machine.
    ///
    /// Fails before compiling anything if a required device has no compiler,
    /// and aborts on the first command a device compiler rejects.
    pub fn compile(&self, compilers: &DeviceCompilers) -> Result<StateMachine, CompilationError> {
        self.check_compilers(compilers)?;

        let desc = &self.descriptor;
        let mut table = TransitionTable::with_states(desc.states().iter().map(|s| s.name.as_str()));
        let mut compiled_commands = 0;

        for state in desc.states() {
            let id = table
                .id_of(&state.name)
                .ok_or_else(|| unknown_state(&state.name))?;

            let on_entry = compile_chain(
                Location::OnEntry {
                    state: state.name.clone(),
                },
                &state.on_entry,
                compilers,
            )?;
            let on_exit = compile_chain(
                Location::OnExit {
                    state: state.name.clone(),
                },
                &state.on_exit,
                compilers,
            )?;
            compiled_commands += on_entry.len() + on_exit.len();

            let mut rules = Vec::with_capacity(state.transitions.len());
            for t in &state.transitions {
                let rule = match &t.reaction {
                    Reaction::Ignore => Rule::Ignore,
                    Reaction::Permit {
                        target_state,
                        effects,
                    } => {
                        let target = table
                            .id_of(target_state)
                            .ok_or_else(|| unknown_state(target_state))?;
                        let effect = if effects.is_empty() {
                            None
                        } else {
                            let location = Location::Transition {
                                source: state.name.clone(),
                                target: target_state.clone(),
                                trigger: t.trigger_name.clone(),
                            };
                            let chain = compile_chain(location, effects, compilers)?;
                            compiled_commands += chain.len();
                            Some(chain)
                        };
                        Rule::Permit { target, effect }
                    }
                };
                rules.push((t.trigger_name.clone(), rule));
            }

            let compiled = table.state_mut(id);
            compiled.on_entry = on_entry;
            compiled.on_exit = on_exit;
            compiled.rules.extend(rules);
        }

        let initial = table
            .id_of(desc.initial_state())
            .ok_or_else(|| unknown_state(desc.initial_state()))?;
        let final_states = desc
            .final_states()
            .iter()
            .filter_map(|name| table.id_of(name))
            .collect::<HashSet<_>>();

        tracing::debug!(
            "Compiled machine {}: {} states, {} triggers, {} commands",
            desc.checksum(),
            table.len(),
            desc.triggers().len(),
            compiled_commands
        );

        Ok(StateMachine::new(Program {
            table,
            translator: EventTranslator::from_triggers(desc.triggers()),
            triggers: desc.triggers().iter().map(|t| t.name.clone()).collect(),
            initial,
            final_states,
            controlled_device_ids: self.required_devices.clone(),
            handled_event_source_ids: self.accepted_event_sources.clone(),
            checksum: desc.checksum().to_string(),
        }))
    }

    fn check_compilers(&self, compilers: &DeviceCompilers) -> Result<(), CompilationError> {
        match self
            .required_devices
            .iter()
            .find(|id| !compilers.contains_key(*id))
        {
            Some(&device_id) => Err(CompilationError::MissingCompiler { device_id }),
            None => Ok(()),
        }
    }
}

fn compile_chain(
    location: Location,
    behaviors: &[Behavior],
    compilers: &DeviceCompilers,
) -> Result<CommandChain, CompilationError> {
    let location = Arc::new(location);
    let mut commands = Vec::with_capacity(behaviors.len());

    for b in behaviors {
        let compiler = compilers
            .get(&b.device_id)
            .ok_or(CompilationError::MissingCompiler {
                device_id: b.device_id,
            })?;

        let compiled = panic::catch_unwind(AssertUnwindSafe(|| compiler.compile(&b.command_string)))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref()).into()));
        let command = compiled.map_err(|cause| {
            tracing::warn!(
                location = %location,
                device_id = b.device_id,
                command = %b.command_string,
                "device compiler rejected command: {}",
                cause
            );
            CompilationError::Command {
                location: (*location).clone(),
                device_id: b.device_id,
                command_string: b.command_string.clone(),
                cause,
            }
        })?;

        commands.push(GuardedCommand::new(
            Arc::clone(&location),
            b.device_id,
            b.command_string.clone(),
            command,
        ));
    }

    Ok(CommandChain::new(commands))
}

// Validation guarantees every referenced state exists, so this only fires on
// internal inconsistencies.
fn unknown_state(name: &str) -> CompilationError {
    CompilationError::Internal {
        reason: format!("state '{}' missing from transition table", name),
    }
}
