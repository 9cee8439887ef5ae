//! # jsonfsm-runner
//!
//! Helpers for embedding jsonfsm machines.
//!
//! This crate provides:
//! - YAML configuration with environment overrides
//! - Built-in device compilers (log, print, fail)
//! - Event scripts and replay sessions

pub mod config;
pub mod devices;
pub mod error;
pub mod script;
pub mod session;

pub use config::{Config, DeviceConfig, DeviceKind, LogConfig, RunConfig};
pub use devices::{build_compilers, FailingDevice, Journal, JournalEntry, LogDevice, PrintDevice};
pub use error::{ConfigError, RunnerError};
pub use script::{load_script, parse_script, ScriptEvent};
pub use session::{Session, StepReport};
