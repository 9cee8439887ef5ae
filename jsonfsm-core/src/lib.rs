//! # jsonfsm-core
//!
//! Compiler and runtime for JSON-described feedback state machines.
//!
//! This crate provides:
//! - Machine description parsing and two-pass validation
//! - Event translation from `(eventSourceId, eventPayload)` to triggers
//! - Compilation of behaviors and effects through host-supplied device compilers
//! - A runtime that injects events and runs exit, effect and entry behaviors

pub mod command;
pub mod compiler;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod machine;
pub mod table;
pub mod translator;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use compiler::{parse_and_compile, MachineCompiler};
pub use descriptor::{Behavior, MachineDescriptor, MachineDescriptorRaw, Reaction, State, Transition, Trigger};
pub use device::{DeviceCommand, DeviceCommandCompiler, DeviceCompilers};
pub use error::{CompilationError, DeviceError, Expectation, Location, ValidationError, Violation};
pub use machine::{InjectOutcome, StateMachine};
pub use translator::EventTranslator;
pub use validator::validate;
