//! Runner configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via JSONFSM_CONFIG or --config)
//! 3. Environment variables

pub use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Runner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub log: LogConfig,
    /// Explicitly configured devices.
    pub devices: Vec<DeviceConfig>,
    /// Kind of device serving required ids without an explicit entry.
    pub default_device: Option<DeviceKind>,
    /// Script replay configuration.
    pub run: RunConfig,
}

impl Config {
    /// Loads configuration from the file named by JSONFSM_CONFIG, then applies
    /// environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("JSONFSM_CONFIG").ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Loads configuration from an optional file, then applies environment
    /// variable overrides and validates the result.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from a key lookup (environment variables in production).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("JSONFSM_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log.level = level.trim().to_string();
            }
        }

        if let Some(kind) = var("JSONFSM_DEFAULT_DEVICE") {
            match kind.parse() {
                Ok(kind) => self.default_device = Some(kind),
                Err(e) => tracing::warn!("Ignoring JSONFSM_DEFAULT_DEVICE: {}", e),
            }
        }

        if let Some(stop) = var("JSONFSM_STOP_ON_FINAL") {
            self.run.stop_on_final = stop == "1" || stop.to_lowercase() == "true";
        }
    }

    /// Validates device entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id == 0 {
                return Err(ConfigError::ValidationError(
                    "device id must be greater than 0".to_string(),
                ));
            }
            if !seen.insert(device.id) {
                return Err(ConfigError::ValidationError(format!(
                    "device {} configured more than once",
                    device.id
                )));
            }
        }
        Ok(())
    }

    /// Looks up the explicit entry for a device id.
    pub fn device(&self, id: u32) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Script replay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop replay at the first event that lands in a final state.
    pub stop_on_final: bool,
}

/// Built-in device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Commands are logged.
    Log,
    /// Commands are recorded in the session journal.
    Print,
    /// Commands matching `fail_on` are rejected at compile time.
    Fail,
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(DeviceKind::Log),
            "print" => Ok(DeviceKind::Print),
            "fail" => Ok(DeviceKind::Fail),
            other => Err(format!("unknown device kind '{}'", other)),
        }
    }
}

/// A configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: u32,
    pub kind: DeviceKind,
    /// Prepended to every command string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// For `fail` devices: substring that makes a command fail to compile.
    /// Without it every command fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<String>,
}

impl DeviceConfig {
    pub fn new(id: u32, kind: DeviceKind) -> Self {
        Self {
            id,
            kind,
            prefix: None,
            fail_on: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log.level, "info");
        assert!(config.devices.is_empty());
        assert!(config.default_device.is_none());
        assert!(!config.run.stop_on_final);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log:
  level: debug
devices:
  - id: 10
    kind: print
    prefix: "10:"
  - id: 11
    kind: fail
    fail_on: boom
default_device: log
run:
  stop_on_final: true
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.device(10).unwrap().prefix.as_deref(), Some("10:"));
        assert_eq!(config.device(11).unwrap().kind, DeviceKind::Fail);
        assert_eq!(config.default_device, Some(DeviceKind::Log));
        assert!(config.run.stop_on_final);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "devices: [{{id: 1, kind: laser}}]").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero() {
        let mut config = Config::default();
        config.devices.push(DeviceConfig::new(1, DeviceKind::Log));
        config.devices.push(DeviceConfig::new(1, DeviceKind::Print));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.devices = vec![DeviceConfig::new(0, DeviceKind::Log)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("JSONFSM_LOG_LEVEL", "trace"),
            ("JSONFSM_DEFAULT_DEVICE", "Print"),
            ("JSONFSM_STOP_ON_FINAL", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.default_device, Some(DeviceKind::Print));
        assert!(config.run.stop_on_final);
    }

    #[test]
    fn test_bad_device_kind_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "JSONFSM_DEFAULT_DEVICE").then(|| "laser".to_string()));
        assert!(config.default_device.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jsonfsm.yaml");

        let mut config = Config::default();
        config.devices.push(DeviceConfig::new(7, DeviceKind::Print));
        config.default_device = Some(DeviceKind::Fail);
        config.save(&path).unwrap();

        let parsed = Config::from_file(&path).unwrap();
        assert_eq!(parsed.devices, config.devices);
        assert_eq!(parsed.default_device, Some(DeviceKind::Fail));
    }
}
