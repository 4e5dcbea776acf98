//! YAML configuration parsing.
//!
//! Parses cycle schedule definitions from YAML files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::types::CycleCount;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Schedule configuration from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Schedule name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Number of cycles, or the keyword `unbounded`.
    #[serde(default = "default_cycles")]
    pub cycles: CyclesConfig,
    /// Delay between phases in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Forward phase definition.
    pub forward: PhaseConfig,
    /// Backward phase definition.
    pub backward: PhaseConfig,
}

fn default_cycles() -> CyclesConfig {
    CyclesConfig::Count(1)
}

impl ScheduleConfig {
    /// Get the inter-phase delay.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Cycle count configuration.
///
/// Accepts a plain non-negative number or the keyword `unbounded`. Negative
/// counts fail YAML deserialization outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CyclesConfig {
    /// Fixed number of cycles.
    Count(u32),
    /// Keyword form; only `unbounded` is accepted.
    Keyword(String),
}

impl CyclesConfig {
    /// Resolve the configured value to a cycle count.
    pub fn resolve(&self) -> Result<CycleCount, ConfigError> {
        match self {
            CyclesConfig::Count(n) => Ok(CycleCount::Finite(*n)),
            CyclesConfig::Keyword(word) if word == "unbounded" => Ok(CycleCount::Unbounded),
            CyclesConfig::Keyword(word) => Err(ConfigError::InvalidConfig(format!(
                "unknown cycles value '{}' (expected a number or 'unbounded')",
                word
            ))),
        }
    }
}

/// Phase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Phase name. Defaults to the direction when omitted.
    pub name: Option<String>,
    /// The command to run.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables for this phase.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load a schedule configuration from a file.
    pub fn load_schedule(path: impl AsRef<Path>) -> Result<ScheduleConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_schedule(&content)
    }

    /// Parse a schedule configuration from a YAML string.
    pub fn parse_schedule(yaml: &str) -> Result<ScheduleConfig, ConfigError> {
        let config: ScheduleConfig = serde_yaml::from_str(yaml)?;
        Self::validate_schedule(&config)?;
        Ok(config)
    }

    /// Validate a schedule configuration.
    fn validate_schedule(config: &ScheduleConfig) -> Result<(), ConfigError> {
        // Check for empty name
        if config.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()));
        }

        // Check that the cycles keyword, if used, is one we know
        config.cycles.resolve()?;

        // Check both phases
        Self::validate_phase(&config.forward, "forward")?;
        Self::validate_phase(&config.backward, "backward")?;

        Ok(())
    }

    /// Validate a single phase configuration.
    fn validate_phase(config: &PhaseConfig, label: &str) -> Result<(), ConfigError> {
        if config.command.is_empty() {
            return Err(ConfigError::MissingField(format!("{}.command", label)));
        }

        // Check that the timeout is not zero (would fail every run)
        if config.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(format!(
                "{}.timeout_secs cannot be zero",
                label
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_schedule_yaml() {
        let yaml = r#"
name: minimal
forward:
  command: echo
  args: ["up"]
backward:
  command: echo
  args: ["down"]
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        assert_eq!(config.name, "minimal");
        assert!(matches!(config.cycles, CyclesConfig::Count(1)));
        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.delay(), Duration::ZERO);
    }

    #[test]
    fn test_parse_schedule_with_all_fields() {
        let yaml = r#"
name: nightly_sync
description: Mirror the archive out and back
cycles: 10
delay_ms: 250
forward:
  name: push
  command: rsync
  args: ["-a", "src/", "dst/"]
  environment:
    RSYNC_RSH: ssh
  working_dir: /data
  timeout_secs: 300
backward:
  name: pull
  command: rsync
  args: ["-a", "dst/", "src/"]
  timeout_secs: 300
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        assert_eq!(config.name, "nightly_sync");
        assert_eq!(
            config.description,
            Some("Mirror the archive out and back".to_string())
        );
        assert!(matches!(config.cycles, CyclesConfig::Count(10)));
        assert_eq!(config.delay(), Duration::from_millis(250));

        assert_eq!(config.forward.name, Some("push".to_string()));
        assert_eq!(config.forward.command, "rsync");
        assert_eq!(config.forward.args, vec!["-a", "src/", "dst/"]);
        assert_eq!(
            config.forward.environment.get("RSYNC_RSH"),
            Some(&"ssh".to_string())
        );
        assert_eq!(config.forward.working_dir, Some("/data".to_string()));
        assert_eq!(config.forward.timeout_secs, Some(300));

        assert_eq!(config.backward.name, Some("pull".to_string()));
    }

    #[test]
    fn test_parse_unbounded_cycles() {
        let yaml = r#"
name: forever
cycles: unbounded
forward:
  command: echo
backward:
  command: echo
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        assert_eq!(config.cycles.resolve().unwrap(), CycleCount::Unbounded);
    }

    #[test]
    fn test_parse_zero_cycles() {
        let yaml = r#"
name: noop
cycles: 0
forward:
  command: echo
backward:
  command: echo
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        assert_eq!(config.cycles.resolve().unwrap(), CycleCount::Finite(0));
    }

    #[test]
    fn test_parse_zero_delay() {
        let yaml = r#"
name: rapid
delay_ms: 0
forward:
  command: echo
backward:
  command: echo
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        assert_eq!(config.delay(), Duration::ZERO);
    }

    #[test]
    fn test_unknown_cycles_keyword_rejected() {
        let yaml = r#"
name: forever
cycles: forever
forward:
  command: echo
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
        if let Err(ConfigError::InvalidConfig(msg)) = result {
            assert!(msg.contains("forever"));
        }
    }

    #[test]
    fn test_negative_cycles_rejected() {
        let yaml = r#"
name: backwards_in_time
cycles: -3
forward:
  command: echo
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let yaml = r#"
name: negative_delay
delay_ms: -10
forward:
  command: echo
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_missing_phase_rejected() {
        let yaml = r#"
name: one_sided
forward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_validation_error_missing_name() {
        let yaml = r#"
name: ""
forward:
  command: echo
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_validation_error_empty_command() {
        let yaml = r#"
name: no_command
forward:
  command: ""
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
        if let Err(ConfigError::MissingField(field)) = result {
            assert_eq!(field, "forward.command");
        }
    }

    #[test]
    fn test_validation_error_zero_timeout() {
        let yaml = r#"
name: zero_timeout
forward:
  command: echo
backward:
  command: echo
  timeout_secs: 0
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
        if let Err(ConfigError::InvalidConfig(msg)) = result {
            assert!(msg.contains("backward.timeout_secs cannot be zero"));
        }
    }

    #[test]
    fn test_quoted_cycles_string_rejected() {
        let yaml = r#"
name: quoted
cycles: "3"
forward:
  command: echo
backward:
  command: echo
"#;
        let result = YamlLoader::parse_schedule(yaml);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_phase_environment() {
        let yaml = r#"
name: env_schedule
forward:
  command: ./run.sh
  environment:
    DATABASE_URL: postgres://localhost/db
    API_KEY: secret123
    DEBUG: "true"
backward:
  command: echo
"#;
        let config = YamlLoader::parse_schedule(yaml).unwrap();
        let env = &config.forward.environment;
        assert_eq!(
            env.get("DATABASE_URL"),
            Some(&"postgres://localhost/db".to_string())
        );
        assert_eq!(env.get("API_KEY"), Some(&"secret123".to_string()));
        assert_eq!(env.get("DEBUG"), Some(&"true".to_string()));
    }
}
