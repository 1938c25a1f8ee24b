//! Loader configuration
//!
//! A small JSON file naming where calibration records live:
//!
//! ```json
//! { "record_dir": "/etc/armcal/calibrations", "log_level": "WARN" }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "CAL_CONFIG_INVALID"
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loader configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Directory holding one record file per machine (required)
    pub record_dir: PathBuf,

    /// Extension of record files (optional, default "json")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Minimum log severity (optional, default "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_file_extension() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl LoaderConfig {
    /// Configuration with defaults for everything but the record directory
    pub fn new(record_dir: impl Into<PathBuf>) -> Self {
        Self {
            record_dir: record_dir.into(),
            file_extension: default_file_extension(),
            log_level: default_log_level(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: LoaderConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;

        let config_path = path.display().to_string();
        let record_dir = config.record_dir.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", config_path.as_str()),
                ("record_dir", record_dir.as_str()),
            ],
        );

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.record_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "record_dir",
                message: "must not be empty".into(),
            });
        }

        let extension = self.file_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "file_extension",
                message: format!("'{}' is not a file extension", self.file_extension),
            });
        }

        self.severity()?;
        Ok(())
    }

    /// Extension without a leading dot
    pub fn extension(&self) -> &str {
        self.file_extension.trim_start_matches('.')
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| ConfigError::Invalid {
            field: "log_level",
            message: format!(
                "'{}' must be one of TRACE, INFO, WARN, ERROR, FATAL",
                self.log_level
            ),
        })
    }

    /// Applies `log_level` to the process-wide logger.
    pub fn apply_log_level(&self) -> ConfigResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("armcal.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"record_dir": "/srv/calibrations"}"#);

        let config = LoaderConfig::load(&path).unwrap();
        assert_eq!(config.record_dir, PathBuf::from("/srv/calibrations"));
        assert_eq!(config.file_extension, "json");
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config, LoaderConfig::new("/srv/calibrations"));
    }

    #[test]
    fn test_record_dir_required() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"log_level": "WARN"}"#);
        assert!(matches!(
            LoaderConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"record_dir": "/srv", "recordDir": "/srv"}"#);
        assert!(matches!(
            LoaderConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = LoaderConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(err.code(), "CAL_CONFIG_INVALID");
    }

    #[test]
    fn test_invalid_log_level() {
        let config = LoaderConfig {
            log_level: "LOUD".into(),
            ..LoaderConfig::new("/srv")
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "log_level", .. }));
    }

    #[test]
    fn test_extension_normalized() {
        let config = LoaderConfig {
            file_extension: ".json".into(),
            ..LoaderConfig::new("/srv")
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.extension(), "json");

        let empty = LoaderConfig {
            file_extension: ".".into(),
            ..LoaderConfig::new("/srv")
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_severity_parsed() {
        let config = LoaderConfig {
            log_level: "warn".into(),
            ..LoaderConfig::new("/srv")
        };
        assert_eq!(config.severity().unwrap(), Severity::Warn);
    }
}
