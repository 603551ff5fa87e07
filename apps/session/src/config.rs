//! # Configuration
//!
//! Application settings loaded from TOML.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. File from `--config` (must exist) or else `SESSION_CONFIG` (a missing
//!    file means defaults)
//! 3. `SESSION_LOG_FORMAT` environment variable (`text` or `json`)

use serde::Deserialize;
use session_core::SessionError;
use session_core::primitives::DEFAULT_SESSION_NAME;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SESSION_CONFIG";

/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "SESSION_LOG_FORMAT";

/// Default maximum input file size (500 MB), matching the snapshot limit.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

// =============================================================================
// LOG FORMAT
// =============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse `text` / `json`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name given to sessions built by `demo`.
    pub session_name: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Indent JSON documents written to disk.
    pub pretty: bool,

    /// Largest input file accepted, in bytes.
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_string(),
            log_format: LogFormat::Text,
            pretty: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text)
            .map_err(|e| SessionError::SerializationError(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SessionError::IoError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents).map_err(|e| {
            SessionError::SerializationError(format!("{} ('{}')", e, path.display()))
        })
    }

    /// Load from `path`, or from `SESSION_CONFIG` when no path is given.
    ///
    /// An explicit path that cannot be read is an `IoError`. A
    /// `SESSION_CONFIG` file that does not exist means defaults.
    ///
    /// Runs before the subscriber is installed, so it does not log.
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        Self::load_from(path, std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    fn load_from(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Result<Self, SessionError> {
        match (explicit, from_env) {
            (Some(path), _) => Self::from_file(path),
            (None, Some(path)) if path.is_file() => Self::from_file(&path),
            (None, _) => Ok(Self::default()),
        }
    }

    /// Apply environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let log_format = std::env::var(LOG_FORMAT_ENV).ok();
        self.with_log_format_override(log_format.as_deref())
    }

    /// Override the log format if `value` names a known format.
    #[must_use]
    pub fn with_log_format_override(mut self, value: Option<&str>) -> Self {
        if let Some(format) = value.and_then(LogFormat::parse) {
            self.log_format = format;
        }
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.session_name, "my_session");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.pretty);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("log_format = \"json\"\npretty = false\n").expect("parse");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.pretty);
        assert_eq!(config.session_name, "my_session");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Config::from_toml_str("colour = \"blue\"\n").is_err());
        assert!(Config::from_toml_str("log_format = \"xml\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let absent = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load_from(Some(absent.as_path()), None),
            Err(SessionError::IoError(_))
        ));
    }

    #[test]
    fn missing_env_file_means_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let absent = dir.path().join("absent.toml");
        let config = Config::load_from(None, Some(absent)).expect("defaults");
        assert_eq!(config, Config::default());
        assert_eq!(Config::load_from(None, None).expect("defaults"), Config::default());
    }

    #[test]
    fn explicit_path_wins_over_env() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let explicit = dir.path().join("explicit.toml");
        let from_env = dir.path().join("env.toml");
        std::fs::write(&explicit, "session_name = \"explicit\"\n").expect("write");
        std::fs::write(&from_env, "session_name = \"env\"\n").expect("write");

        let config = Config::load_from(Some(explicit.as_path()), Some(from_env.clone())).expect("load");
        assert_eq!(config.session_name, "explicit");
        let config = Config::load_from(None, Some(from_env)).expect("load");
        assert_eq!(config.session_name, "env");
    }

    #[test]
    fn log_format_override() {
        let config = Config::default().with_log_format_override(Some("JSON"));
        assert_eq!(config.log_format, LogFormat::Json);

        let config = config.with_log_format_override(Some("yaml"));
        assert_eq!(config.log_format, LogFormat::Json);

        let config = config.with_log_format_override(None);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
