//! # opguard-config
//!
//! Configuration management for opguard.
//!
//! Loads configuration from:
//! 1. `~/.opguard/config.toml` (global)
//! 2. `.opguard/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Project-local config location, relative to the working directory
pub const PROJECT_CONFIG_PATH: &str = ".opguard/config.toml";

/// Longest operation label kept when the call text has no call syntax
pub const DEFAULT_LABEL_MAX: usize = 64;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub guard: GuardConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config =
            Self::load_from_paths(global.as_deref(), Some(Path::new(PROJECT_CONFIG_PATH)))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load the global file, then merge the project file over it.
    /// Missing files are skipped.
    pub fn load_from_paths(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        if let Some(project_path) = project {
            if project_path.exists() {
                debug!("Loading project config from {:?}", project_path);
                let contents = std::fs::read_to_string(project_path)?;
                let project_config: Config = toml::from_str(&contents)?;
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// Global config path: ~/.opguard/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".opguard/config.toml"))
    }

    /// Merge another config (project overrides).
    /// Only values that differ from the defaults replace ours.
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.log.level != defaults.log.level {
            self.log.level = other.log.level;
        }
        if other.log.ansi != defaults.log.ansi {
            self.log.ansi = other.log.ansi;
        }
        if other.log.with_target != defaults.log.with_target {
            self.log.with_target = other.log.with_target;
        }
        if other.guard.min_severity != defaults.guard.min_severity {
            self.guard.min_severity = other.guard.min_severity;
        }
        if other.guard.trace_calls != defaults.guard.trace_calls {
            self.guard.trace_calls = other.guard.trace_calls;
        }
        if other.guard.label_max != defaults.guard.label_max {
            self.guard.label_max = other.guard.label_max;
        }
    }

    /// Apply environment variable overrides through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("OPGUARD_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(severity) = lookup("OPGUARD_MIN_SEVERITY") {
            self.guard.min_severity = severity;
        }
        if let Some(flag) = lookup("OPGUARD_TRACE_CALLS") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.guard.trace_calls = true,
                "0" | "false" | "no" | "off" => self.guard.trace_calls = false,
                other => debug!("Ignoring OPGUARD_TRACE_CALLS={:?}", other),
            }
        }
    }

    /// Render this config as a TOML document
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }
}

/// Log output configuration, consumed by [`logging::init_from_config`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive used when neither OPGUARD_LOG nor RUST_LOG is set
    pub level: String,
    /// Colorize terminal output
    pub ansi: bool,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

/// Instrumentation behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Lowest severity the guard logger forwards to its sink.
    /// FATAL is always forwarded.
    pub min_severity: String,
    /// Emit the pre-call trace line for every instrumented call
    pub trace_calls: bool,
    /// Truncation length for labels derived from text without a call
    pub label_max: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_severity: "TRACE".to_string(),
            trace_calls: true,
            label_max: DEFAULT_LABEL_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.guard.min_severity, "TRACE");
        assert!(config.guard.trace_calls);
        assert_eq!(config.guard.label_max, DEFAULT_LABEL_MAX);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[log]"));
        assert!(toml_str.contains("[guard]"));
        assert!(toml_str.contains("min_severity"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_merge_keeps_global_when_project_is_default() {
        let mut config = Config::default();
        config.log.level = "debug".to_string();
        config.guard.label_max = 32;

        let mut project = Config::default();
        project.guard.trace_calls = false;
        config.merge(project);

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.guard.label_max, 32);
        assert!(!config.guard.trace_calls);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "OPGUARD_LOG_LEVEL" => Some("trace".to_string()),
            "OPGUARD_MIN_SEVERITY" => Some("warn".to_string()),
            "OPGUARD_TRACE_CALLS" => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.guard.min_severity, "warn");
        assert!(!config.guard.trace_calls);
    }

    #[test]
    fn test_env_override_ignores_garbage_flag() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| (key == "OPGUARD_TRACE_CALLS").then(|| "maybe".to_string()));
        assert!(config.guard.trace_calls);
    }
}
