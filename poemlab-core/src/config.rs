//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/poemlab/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/poemlab/` (~/.config/poemlab/)
//! - Data: `$XDG_DATA_HOME/poemlab/` (~/.local/share/poemlab/)
//! - State/Logs: `$XDG_STATE_HOME/poemlab/` (~/.local/state/poemlab/)

use crate::error::{Error, Result};
use crate::session::{duration_from_secs, StudySettings, DEFAULT_DURATION_SECS};
use crate::types::ErrorType;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Study parameters
    #[serde(default)]
    pub study: StudyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage overrides
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Study configuration
#[derive(Debug, Deserialize)]
pub struct StudyConfig {
    /// Defect injected into poems: six_lines, non_rhyme or foreign_token.
    /// Unknown values fall back to six_lines.
    #[serde(default = "default_error_type")]
    pub error_type: String,

    /// Time limit for the chat stage, in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: i64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            error_type: default_error_type(),
            duration_secs: default_duration_secs(),
        }
    }
}

impl StudyConfig {
    /// Settings applied to new sessions
    pub fn settings(&self) -> Result<StudySettings> {
        Ok(StudySettings {
            error_type: ErrorType::from_config(&self.error_type),
            duration: duration_from_secs(self.duration_secs)?,
        })
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        duration_from_secs(self.duration_secs)?;
        Ok(())
    }
}

fn default_error_type() -> String {
    ErrorType::SixLines.as_str().to_string()
}

fn default_duration_secs() -> i64 {
    DEFAULT_DURATION_SECS
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Storage configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Override path for the SQLite database
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.study.validate()?;

        Ok(config)
    }

    /// Database path, honoring `storage.database_path`
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::default_database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/poemlab/config.toml` (~/.config/poemlab/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("poemlab").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/poemlab/` (~/.local/share/poemlab/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("poemlab")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/poemlab/` (~/.local/state/poemlab/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("poemlab")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/poemlab/data.db` (~/.local/share/poemlab/data.db)
    pub fn default_database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.study.error_type, "six_lines");
        assert_eq!(config.study.duration_secs, 300);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[study]
error_type = "foreign_token"
duration_secs = 120

[logging]
level = "debug"

[storage]
database_path = "/tmp/poemlab-test.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let settings = config.study.settings().unwrap();
        assert_eq!(settings.error_type, ErrorType::ForeignToken);
        assert_eq!(settings.duration.num_seconds(), 120);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/poemlab-test.db")
        );
    }

    #[test]
    fn test_unknown_error_type_falls_back() {
        let config: Config = toml::from_str("[study]\nerror_type = \"mystery\"\n").unwrap();
        assert_eq!(
            config.study.settings().unwrap().error_type,
            ErrorType::SixLines
        );
    }

    #[test]
    fn test_load_from_rejects_bad_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[study]\nduration_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_rejects_huge_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[study]\nduration_secs = 9223372036854775807\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config: Config = toml::from_str("[study]\nduration_secs = 9223372036854775807\n").unwrap();
        assert!(config.study.settings().is_err());
    }
}
