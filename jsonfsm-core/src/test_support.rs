//! Device compilers for tests.

use crate::device::{DeviceCommand, DeviceCommandCompiler};
use crate::error::DeviceError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared, ordered record of executed commands.
pub(crate) type ExecLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn exec_log() -> ExecLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Compiles every command into one that appends `<prefix><command>` to `log`.
pub(crate) fn recording(prefix: &str, log: &ExecLog) -> Box<dyn DeviceCommandCompiler> {
    let prefix = prefix.to_string();
    let log = log.clone();
    Box::new(
        move |cmd: &str| -> Result<Arc<dyn DeviceCommand>, DeviceError> {
            let entry = format!("{}{}", prefix, cmd);
            let log = log.clone();
            Ok(Arc::new(move || -> Result<(), DeviceError> {
                log.lock().push(entry.clone());
                Ok(())
            }))
        },
    )
}

/// Commands count their executions; those starting with `fail_prefix` fail afterwards.
pub(crate) fn counting(fail_prefix: Option<&str>, counter: &Arc<AtomicUsize>) -> Box<dyn DeviceCommandCompiler> {
    let fail_prefix = fail_prefix.map(str::to_string);
    let counter = counter.clone();
    Box::new(
        move |cmd: &str| -> Result<Arc<dyn DeviceCommand>, DeviceError> {
            let fails = fail_prefix.as_deref().is_some_and(|p| cmd.starts_with(p));
            let counter = counter.clone();
            Ok(Arc::new(move || -> Result<(), DeviceError> {
                counter.fetch_add(1, Ordering::SeqCst);
                if fails {
                    return Err("Booom!".into());
                }
                Ok(())
            }))
        },
    )
}

/// Rejects commands starting with `prefix` (all commands if `None`) at compile time.
/// Counts every compile call.
pub(crate) fn rejecting(prefix: Option<&str>, calls: &Arc<AtomicUsize>) -> Box<dyn DeviceCommandCompiler> {
    let prefix = prefix.map(str::to_string);
    let calls = calls.clone();
    Box::new(
        move |cmd: &str| -> Result<Arc<dyn DeviceCommand>, DeviceError> {
            calls.fetch_add(1, Ordering::SeqCst);
            if prefix.as_deref().map_or(true, |p| cmd.starts_with(p)) {
                return Err("Booom!".into());
            }
            Ok(Arc::new(|| -> Result<(), DeviceError> { Ok(()) }))
        },
    )
}
