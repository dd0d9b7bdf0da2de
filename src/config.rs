//! Configuration management module
//!
//! Loads the YAML configuration file, applies environment overrides and
//! maps the result onto the option structs of the library crates.

use action_flow::{RecoveryPolicy, RunOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepreplay_snapshot_store::SnapPolicyView;
use thiserror::Error;
use tracing::{info, warn};

pub const ENV_SNAPSHOT_DIR: &str = "STEPREPLAY_SNAPSHOT_DIR";
pub const ENV_MAX_ACTIONS: &str = "STEPREPLAY_MAX_ACTIONS";
pub const ENV_TROUBLESHOOT: &str = "STEPREPLAY_TROUBLESHOOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one snapshot file per test
    pub snapshot_dir: PathBuf,

    /// Actions a step may take before completion is forced
    pub max_actions_per_step: u32,

    #[serde(with = "human_duration")]
    pub action_timeout: Duration,

    #[serde(with = "human_duration")]
    pub selector_timeout: Duration,

    /// Bounded wait for a replayed target to appear
    #[serde(with = "human_duration")]
    pub wait_timeout: Duration,

    pub troubleshoot: bool,

    pub test_id_attribute: String,

    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    #[serde(with = "human_duration")]
    pub base_delay: Duration,

    #[serde(with = "human_duration")]
    pub max_delay: Duration,

    pub transient_attempts: u32,
    pub environment_attempts: u32,
    pub unknown_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let run = RunOptions::default();
        Self {
            snapshot_dir: PathBuf::from("./.stepreplay/snapshots"),
            max_actions_per_step: run.max_actions_per_step,
            action_timeout: run.action_timeout,
            selector_timeout: run.selector_timeout,
            wait_timeout: run.wait_timeout,
            troubleshoot: false,
            test_id_attribute: run.test_id_attribute,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        let policy = RecoveryPolicy::default();
        Self {
            base_delay: policy.base_delay,
            max_delay: policy.max_delay,
            transient_attempts: policy.transient_attempts,
            environment_attempts: policy.environment_attempts,
            unknown_attempts: policy.unknown_attempts,
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_actions_per_step == 0 {
            return Err(ConfigError::Invalid(
                "max_actions_per_step must be at least 1".to_string(),
            ));
        }
        if self.recovery.base_delay > self.recovery.max_delay {
            return Err(ConfigError::Invalid(
                "recovery.base_delay exceeds recovery.max_delay".to_string(),
            ));
        }
        if self.test_id_attribute.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "test_id_attribute must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `STEPREPLAY_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var(ENV_SNAPSHOT_DIR) {
            if !dir.trim().is_empty() {
                info!("Snapshot directory from {}: {}", ENV_SNAPSHOT_DIR, dir);
                self.snapshot_dir = PathBuf::from(dir);
            }
        }

        if let Ok(raw) = std::env::var(ENV_MAX_ACTIONS) {
            self.max_actions_per_step = match raw.trim().parse::<u32>() {
                Ok(max) if max > 0 => max,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_MAX_ACTIONS,
                        value: raw,
                    })
                }
            };
        }

        if let Ok(raw) = std::env::var(ENV_TROUBLESHOOT) {
            self.troubleshoot = parse_flag(&raw).ok_or(ConfigError::InvalidEnv {
                var: ENV_TROUBLESHOOT,
                value: raw,
            })?;
        }
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_actions_per_step: self.max_actions_per_step,
            action_timeout: self.action_timeout,
            selector_timeout: self.selector_timeout,
            wait_timeout: self.wait_timeout,
            troubleshoot: self.troubleshoot,
            test_id_attribute: self.test_id_attribute.clone(),
            ..RunOptions::default()
        }
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            base_delay: self.recovery.base_delay,
            max_delay: self.recovery.max_delay,
            transient_attempts: self.recovery.transient_attempts,
            environment_attempts: self.recovery.environment_attempts,
            unknown_attempts: self.recovery.unknown_attempts,
        }
    }

    pub fn snapshot_policy(&self) -> SnapPolicyView {
        SnapPolicyView::with_root(self.snapshot_dir.clone())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Default location: `<config dir>/stepreplay/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("stepreplay");
        path.push("config.yaml");
        path
    })
}

/// Load configuration from file (if any), then environment overrides
pub async fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = config_path.map(Path::to_path_buf).or_else(default_config_path);

    let mut config = match path {
        Some(path) if path.exists() => {
            let content =
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| ConfigError::Read {
                        path: path.clone(),
                        source,
                    })?;
            let config = Config::from_yaml(&content, &path)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Some(path) => {
            warn!("Config file not found, using defaults: {}", path.display());
            Config::default()
        }
        None => {
            warn!("No config directory available, using defaults");
            Config::default()
        }
    };

    config.apply_env_overrides()?;
    Ok(config)
}

mod human_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [ENV_SNAPSHOT_DIR, ENV_MAX_ACTIONS, ENV_TROUBLESHOOT] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_actions_per_step, 10);
        assert_eq!(config.action_timeout, Duration::from_secs(30));
        assert_eq!(config.selector_timeout, Duration::from_secs(5));
        assert_eq!(config.recovery.transient_attempts, 4);
        assert_eq!(config.recovery_policy(), RecoveryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_human_durations() {
        let yaml = r#"
snapshot_dir: /tmp/snaps
action_timeout: 45s
selector_timeout: 1500ms
recovery:
  base_delay: 200ms
  max_delay: 2s
  environment_attempts: 5
"#;
        let config = Config::from_yaml(yaml, Path::new("config.yaml")).unwrap();
        assert_eq!(config.snapshot_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(config.action_timeout, Duration::from_secs(45));
        assert_eq!(config.selector_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_actions_per_step, 10);

        let policy = config.recovery_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.environment_attempts, 5);
        assert_eq!(policy.transient_attempts, 4);

        let options = config.run_options();
        assert_eq!(options.action_timeout, Duration::from_secs(45));
        assert_eq!(config.snapshot_policy().io.root, PathBuf::from("/tmp/snaps"));
    }

    #[test]
    fn test_invalid_yaml_values() {
        let err = Config::from_yaml("action_timeout: soon", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = Config::from_yaml("max_actions_per_step: 0", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_SNAPSHOT_DIR, "/var/snaps");
        std::env::set_var(ENV_MAX_ACTIONS, "3");
        std::env::set_var(ENV_TROUBLESHOOT, "yes");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.snapshot_dir, PathBuf::from("/var/snaps"));
        assert_eq!(config.max_actions_per_step, 3);
        assert!(config.troubleshoot);
        assert!(config.run_options().troubleshoot);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        clear_env();
        std::env::set_var(ENV_MAX_ACTIONS, "lots");
        let err = Config::default().apply_env_overrides().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: ENV_MAX_ACTIONS,
                ..
            }
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config =
            tokio_test::block_on(load_config(Some(&dir.path().join("absent.yaml")))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    #[serial]
    async fn test_load_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "troubleshoot: true\nmax_actions_per_step: 4\n").unwrap();
        let config = load_config(Some(&path)).await.unwrap();
        assert!(config.troubleshoot);
        assert_eq!(config.max_actions_per_step, 4);
    }
}
