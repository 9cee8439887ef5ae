//! Runner error types.

use jsonfsm_core::{CompilationError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Compilation(#[from] CompilationError),

    #[error("script line {line}: {reason}")]
    Script { line: usize, reason: String },
}

impl RunnerError {
    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            RunnerError::Io { .. } => "IO_ERROR",
            RunnerError::Config(_) => "CONFIG_ERROR",
            RunnerError::Validation(e) => e.error_code(),
            RunnerError::Compilation(e) => e.error_code(),
            RunnerError::Script { .. } => "BAD_SCRIPT",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
