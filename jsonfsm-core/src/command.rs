//! Compiled commands with failure isolation.

use crate::device::DeviceCommand;
use crate::error::Location;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A compiled device command together with where it came from.
///
/// Running it never fails: errors and panics raised by the wrapped command are
/// logged with the command's location, device id and command string.
pub struct GuardedCommand {
    location: Arc<Location>,
    device_id: u32,
    command_string: String,
    command: Arc<dyn DeviceCommand>,
}

impl GuardedCommand {
    pub fn new(
        location: Arc<Location>,
        device_id: u32,
        command_string: impl Into<String>,
        command: Arc<dyn DeviceCommand>,
    ) -> Self {
        Self {
            location,
            device_id,
            command_string: command_string.into(),
            command,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn command_string(&self) -> &str {
        &self.command_string
    }

    /// Executes the command. Returns false if it failed.
    pub fn run(&self) -> bool {
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| self.command.execute())) {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        tracing::error!(
            location = %self.location,
            device_id = self.device_id,
            command = %self.command_string,
            "device command failed: {}",
            failure
        );
        false
    }
}

impl std::fmt::Debug for GuardedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedCommand")
            .field("location", &self.location.to_string())
            .field("device_id", &self.device_id)
            .field("command_string", &self.command_string)
            .finish()
    }
}

/// Commands executed one after another, e.g. all `onEntry` behaviors of a state.
#[derive(Debug, Default)]
pub struct CommandChain(Vec<GuardedCommand>);

impl CommandChain {
    pub fn new(commands: Vec<GuardedCommand>) -> Self {
        Self(commands)
    }

    /// Runs every command in order, regardless of earlier failures.
    /// Returns how many of them failed.
    pub fn run(&self) -> usize {
        self.0.iter().filter(|c| !c.run()).count()
    }

    pub fn commands(&self) -> &[GuardedCommand] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
