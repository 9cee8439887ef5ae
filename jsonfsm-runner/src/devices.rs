//! Built-in device compilers.
//!
//! These stand in for real hardware when checking or replaying a machine:
//! [`LogDevice`] logs each command, [`PrintDevice`] records it in a shared
//! [`Journal`], and [`FailingDevice`] rejects selected commands at compile time.

use crate::config::{Config, DeviceConfig, DeviceKind};
use jsonfsm_core::{DeviceCommand, DeviceCommandCompiler, DeviceCompilers, DeviceError};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub device_id: u32,
    pub command: String,
}

/// Ordered record of executed commands, shared between devices.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, device_id: u32, command: impl Into<String>) {
        self.entries.lock().push(JournalEntry {
            device_id,
            command: command.into(),
        });
    }

    /// Returns a snapshot of all entries.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Removes and returns all entries.
    pub fn drain(&self) -> Vec<JournalEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Logs every executed command at info level.
#[derive(Debug, Clone)]
pub struct LogDevice {
    device_id: u32,
    prefix: String,
}

impl LogDevice {
    pub fn new(device_id: u32, prefix: impl Into<String>) -> Self {
        Self {
            device_id,
            prefix: prefix.into(),
        }
    }
}

impl DeviceCommandCompiler for LogDevice {
    fn compile(&self, command_string: &str) -> Result<Arc<dyn DeviceCommand>, DeviceError> {
        let device_id = self.device_id;
        let line = format!("{}{}", self.prefix, command_string);
        Ok(Arc::new(move || -> Result<(), DeviceError> {
            tracing::info!(device_id, "{}", line);
            Ok(())
        }))
    }
}

/// Records every executed command in a [`Journal`].
#[derive(Debug, Clone)]
pub struct PrintDevice {
    device_id: u32,
    prefix: String,
    journal: Journal,
}

impl PrintDevice {
    pub fn new(device_id: u32, prefix: impl Into<String>, journal: Journal) -> Self {
        Self {
            device_id,
            prefix: prefix.into(),
            journal,
        }
    }
}

impl DeviceCommandCompiler for PrintDevice {
    fn compile(&self, command_string: &str) -> Result<Arc<dyn DeviceCommand>, DeviceError> {
        let device_id = self.device_id;
        let line = format!("{}{}", self.prefix, command_string);
        let journal = self.journal.clone();
        Ok(Arc::new(move || -> Result<(), DeviceError> {
            journal.record(device_id, line.as_str());
            Ok(())
        }))
    }
}

/// Rejects commands containing `fail_on` (every command if unset); the rest
/// behave like a [`PrintDevice`].
#[derive(Debug, Clone)]
pub struct FailingDevice {
    fail_on: Option<String>,
    inner: PrintDevice,
}

impl FailingDevice {
    pub fn new(device_id: u32, fail_on: Option<String>, journal: Journal) -> Self {
        Self {
            fail_on,
            inner: PrintDevice::new(device_id, "", journal),
        }
    }
}

impl DeviceCommandCompiler for FailingDevice {
    fn compile(&self, command_string: &str) -> Result<Arc<dyn DeviceCommand>, DeviceError> {
        let rejected = match &self.fail_on {
            Some(needle) => command_string.contains(needle.as_str()),
            None => true,
        };
        if rejected {
            return Err(format!(
                "device {} refuses command '{}'",
                self.inner.device_id, command_string
            )
            .into());
        }
        self.inner.compile(command_string)
    }
}

fn device(config: &DeviceConfig, journal: &Journal) -> Box<dyn DeviceCommandCompiler> {
    let prefix = config.prefix.clone().unwrap_or_default();
    match config.kind {
        DeviceKind::Log => Box::new(LogDevice::new(config.id, prefix)),
        DeviceKind::Print => Box::new(PrintDevice::new(config.id, prefix, journal.clone())),
        DeviceKind::Fail => Box::new(FailingDevice::new(
            config.id,
            config.fail_on.clone(),
            journal.clone(),
        )),
    }
}

/// Builds device compilers for `required` device ids.
///
/// Explicitly configured devices are always included. Required ids without an
/// entry get a device of `config.default_device`'s kind; without a default
/// they are left out so compilation reports them as missing.
pub fn build_compilers(config: &Config, required: &BTreeSet<u32>, journal: &Journal) -> DeviceCompilers {
    let mut compilers = DeviceCompilers::new();

    for entry in &config.devices {
        compilers.insert(entry.id, device(entry, journal));
    }

    for id in required {
        if compilers.contains_key(id) {
            continue;
        }
        match config.default_device {
            Some(kind) => {
                tracing::debug!("Using default {:?} device for device {}", kind, id);
                compilers.insert(*id, device(&DeviceConfig::new(*id, kind), journal));
            }
            None => tracing::warn!("No device configured for device {}", id),
        }
    }

    compilers
}
