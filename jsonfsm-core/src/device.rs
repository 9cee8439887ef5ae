//! Device command traits supplied by the host application.
//!
//! A [`DeviceCommandCompiler`] turns the `commandString` of a behavior into a
//! [`DeviceCommand`] bound to one device. What "executing" means is up to the
//! host: hardware I/O, a log line, a network call.

use crate::error::DeviceError;
use std::collections::HashMap;
use std::sync::Arc;

/// An executable command produced by a [`DeviceCommandCompiler`].
///
/// Commands run synchronously during event injection. Errors and panics are
/// caught and logged by the state machine; they never abort a transition.
pub trait DeviceCommand: Send + Sync {
    fn execute(&self) -> Result<(), DeviceError>;
}

impl<F> DeviceCommand for F
where
    F: Fn() -> Result<(), DeviceError> + Send + Sync,
{
    fn execute(&self) -> Result<(), DeviceError> {
        self()
    }
}

/// Compiles command strings for one device.
pub trait DeviceCommandCompiler {
    fn compile(&self, command_string: &str) -> Result<Arc<dyn DeviceCommand>, DeviceError>;
}

impl<F> DeviceCommandCompiler for F
where
    F: Fn(&str) -> Result<Arc<dyn DeviceCommand>, DeviceError>,
{
    fn compile(&self, command_string: &str) -> Result<Arc<dyn DeviceCommand>, DeviceError> {
        self(command_string)
    }
}

/// Device compilers keyed by device id.
pub type DeviceCompilers = HashMap<u32, Box<dyn DeviceCommandCompiler>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_compiler_and_command() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let compiler = move |cmd: &str| -> Result<Arc<dyn DeviceCommand>, DeviceError> {
            if cmd.is_empty() {
                return Err("empty command".into());
            }
            let c = c.clone();
            Ok(Arc::new(move || -> Result<(), DeviceError> {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
        };

        let mut compilers: DeviceCompilers = HashMap::new();
        compilers.insert(7, Box::new(compiler));

        let device = &compilers[&7];
        let command = device.compile("blink").unwrap();
        command.execute().unwrap();
        command.execute().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        assert!(device.compile("").is_err());
    }
}
