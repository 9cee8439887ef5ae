//! Event scripts.
//!
//! One event per line: `<eventSourceId> <payload...>`. The payload is the rest
//! of the line, trimmed. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! # open the door
//! 1 move ya
//! 2 stop
//! ```

use crate::error::RunnerError;
use std::path::Path;

/// A parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    /// 1-based line number in the script.
    pub line: usize,
    pub source: u32,
    pub payload: String,
}

/// Parses script text.
pub fn parse_script(text: &str) -> Result<Vec<ScriptEvent>, RunnerError> {
    let mut events = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (source, payload) = match trimmed.split_once(char::is_whitespace) {
            Some((source, payload)) => (source, payload.trim()),
            None => (trimmed, ""),
        };

        let source = source.parse::<u32>().map_err(|_| RunnerError::Script {
            line,
            reason: format!("invalid event source id '{}'", source),
        })?;
        if payload.is_empty() {
            return Err(RunnerError::Script {
                line,
                reason: "missing event payload".to_string(),
            });
        }

        events.push(ScriptEvent {
            line,
            source,
            payload: payload.to_string(),
        });
    }

    Ok(events)
}

/// Reads and parses a script file.
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptEvent>, RunnerError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    parse_script(&text)
}
