//! Core error types.
//!
//! Validation and compilation failures are kept apart: a [`ValidationError`]
//! means the machine description itself is broken, a [`CompilationError`]
//! means a caller-supplied device compiler could not be bound to it.

use std::fmt;
use thiserror::Error;

/// Error produced by a device compiler or a device command.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// A single check the validator applies to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    NotNull,
    NotBlank,
    NotEmpty,
    GreaterThan(i64),
    AtMost(i64),
    ContainedInStates,
    KnownTriggerName,
    Unique,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::NotNull => f.write_str("is not null"),
            Expectation::NotBlank => f.write_str("is not blank"),
            Expectation::NotEmpty => f.write_str("is not empty"),
            Expectation::GreaterThan(n) => write!(f, "is greater than {}", n),
            Expectation::AtMost(n) => write!(f, "is at most {}", n),
            Expectation::ContainedInStates => f.write_str("is contained in states"),
            Expectation::KnownTriggerName => f.write_str("is a known triggerName"),
            Expectation::Unique => f.write_str("is unique"),
        }
    }
}

/// A failed check, located by its field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field, e.g. `states[1].transitions[0].targetState`.
    pub path: String,
    /// The offending value, if there was one.
    pub value: Option<String>,
    /// What the field failed to satisfy.
    pub expectation: Expectation,
    /// Optional hint on how to fix the input.
    pub hint: Option<String>,
}

impl Violation {
    pub fn new(path: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            path: path.into(),
            value: None,
            expectation,
            hint: None,
        }
    }

    pub fn with_value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.path)?;
        if let Some(value) = &self.value {
            write!(f, " (value: '{}')", value)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " ({})", hint)?;
        }
        write!(f, " failed check: {}", self.expectation)
    }
}

/// The machine description is malformed or inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'jsonStateMachine' failed check: is not blank")]
    Blank,

    #[error("error while parsing given json: {reason}")]
    Malformed { reason: String },

    #[error("invalid machine description: {0}")]
    Violation(Violation),
}

impl ValidationError {
    /// Returns the violation if this error points at a specific field.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            ValidationError::Violation(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the path of the offending field, if any.
    pub fn path(&self) -> Option<&str> {
        self.violation().map(|v| v.path.as_str())
    }

    /// Returns an error code suitable for reporting to a host application.
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Blank => "EMPTY_INPUT",
            ValidationError::Malformed { .. } => "MALFORMED_JSON",
            ValidationError::Violation(_) => "INVALID_DESCRIPTION",
        }
    }
}

impl From<Violation> for ValidationError {
    fn from(v: Violation) -> Self {
        ValidationError::Violation(v)
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::Malformed {
            reason: e.to_string(),
        }
    }
}

/// Where in the description a command lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    OnEntry {
        state: String,
    },
    OnExit {
        state: String,
    },
    Transition {
        source: String,
        target: String,
        trigger: String,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::OnEntry { state } => write!(f, "onEntry ({})", state),
            Location::OnExit { state } => write!(f, "onExit ({})", state),
            Location::Transition {
                source,
                target,
                trigger,
            } => write!(
                f,
                "transition ({} -> {}; trigger: {})",
                source, target, trigger
            ),
        }
    }
}

/// Binding the description to device compilers failed.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("compiler for commands of device {device_id} is missing")]
    MissingCompiler { device_id: u32 },

    #[error("cannot compile '{command_string}' for device {device_id} in {location}: {cause}")]
    Command {
        location: Location,
        device_id: u32,
        command_string: String,
        #[source]
        cause: DeviceError,
    },

    #[error("internal compiler error: {reason}")]
    Internal { reason: String },
}

impl CompilationError {
    /// Returns the device involved in the failure, if any.
    pub fn device_id(&self) -> Option<u32> {
        match self {
            CompilationError::MissingCompiler { device_id }
            | CompilationError::Command { device_id, .. } => Some(*device_id),
            CompilationError::Internal { .. } => None,
        }
    }

    /// Returns the command string that failed to compile, if any.
    pub fn command_string(&self) -> Option<&str> {
        match self {
            CompilationError::Command { command_string, .. } => Some(command_string),
            _ => None,
        }
    }

    /// Returns where in the description the failure occurred, if known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompilationError::Command { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Returns an error code suitable for reporting to a host application.
    pub fn error_code(&self) -> &'static str {
        match self {
            CompilationError::MissingCompiler { .. } => "MISSING_COMPILER",
            CompilationError::Command { .. } => "COMMAND_REJECTED",
            CompilationError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
