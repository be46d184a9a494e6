//! Application configuration
//!
//! Settings come from built-in defaults, overlaid by an optional TOML file and
//! then by command-line flags (which also read `PITWALL_*` environment
//! variables).

use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{default_cache_dir, hours, ExpirationPolicy};
use crate::data::{ClientSettings, RetryPolicy, OPENF1_BASE_URL};

/// Cache directory used when the platform has no cache location
const FALLBACK_CACHE_DIR: &str = ".pitwall-cache";

/// Longest accepted TTL, ten years
const MAX_TTL_HOURS: f64 = 87_600.0;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Settings as read from the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// API base URL including the version segment
    pub base_url: String,
    /// Cache root; `None` selects the platform cache directory
    pub cache_dir: Option<PathBuf>,
    /// Connection deadline in seconds
    pub connect_timeout_secs: f64,
    /// Per-attempt deadline in seconds
    pub request_timeout_secs: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff base in seconds
    pub backoff_factor_secs: f64,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    /// Per-category TTL overrides in hours; `default` sets the fallback
    pub ttl_hours: BTreeMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: OPENF1_BASE_URL.to_string(),
            cache_dir: None,
            connect_timeout_secs: 3.0,
            request_timeout_secs: 10.0,
            max_retries: 3,
            backoff_factor_secs: 1.0,
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
            ttl_hours: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Explicit config file, which must exist. When `None`, the
    ///   platform config file is used if present.
    ///
    /// # Returns
    /// * `Ok(Config)` - Defaults overlaid with the file's values
    /// * `Err(ConfigError)` - If the file is unreadable, malformed or out of range
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (category, ttl) in &self.ttl_hours {
            let key = format!("ttl_hours.{}", category);
            check_non_negative(&key, *ttl)?;
            if *ttl > MAX_TTL_HOURS {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!("must be at most {} hours, got {}", MAX_TTL_HOURS, ttl),
                });
            }
        }
        check_non_negative("connect_timeout_secs", self.connect_timeout_secs)?;
        check_non_negative("request_timeout_secs", self.request_timeout_secs)?;
        check_non_negative("backoff_factor_secs", self.backoff_factor_secs)?;

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the expiration policy: the built-in table overlaid with `ttl_hours`
    pub fn expiration_policy(&self) -> ExpirationPolicy {
        let mut policy = ExpirationPolicy::default();
        for (category, ttl) in &self.ttl_hours {
            policy.set_ttl(category.clone(), hours(*ttl));
        }
        policy
    }

    /// Resolves the cache directory
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .or_else(default_cache_dir)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR))
    }

    /// Builds the HTTP client settings
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            connect_timeout: Duration::from_secs_f64(self.connect_timeout_secs),
            request_timeout: Duration::from_secs_f64(self.request_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_factor: Duration::from_secs_f64(self.backoff_factor_secs),
            },
        }
    }
}

/// Returns the platform config file path, e.g. `~/.config/pitwall/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "pitwall")?;
    Some(project_dirs.config_dir().join("config.toml"))
}

fn check_non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a non-negative number, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, "https://api.openf1.org/v1");
        assert_eq!(config.max_retries, 3);

        let settings = config.client_settings();
        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.retry.backoff_factor, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("max_retries = 5\n").unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout_secs, 10.0);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_ttl_overrides() {
        let config = Config::from_toml(
            r#"
            [ttl_hours]
            laps = 0.25
            team_radio = 48
            default = 3
            "#,
        )
        .unwrap();

        let policy = config.expiration_policy();
        assert_eq!(policy.ttl_for("laps"), ChronoDuration::minutes(15));
        assert_eq!(policy.ttl_for("team_radio"), ChronoDuration::hours(48));
        assert_eq!(policy.ttl_for("weather"), ChronoDuration::hours(3));
        // Untouched built-in entries survive
        assert_eq!(policy.ttl_for("sessions"), ChronoDuration::hours(24));
    }

    #[test]
    fn test_negative_ttl_rejected() {
        let config = Config::from_toml("[ttl_hours]\nlaps = -1\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "ttl_hours.laps"
        ));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let config = Config::from_toml("[ttl_hours]\nlaps = 1e10\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "ttl_hours.laps"
        ));

        let config = Config::from_toml("[ttl_hours]\nsessions = 87600\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_toml("cache_ttl = 4\n").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "base_url = \"http://localhost:8080/v1\"\ncache_dir = \"/tmp/f1\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.resolved_cache_dir(), PathBuf::from("/tmp/f1"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "max_retries = \"many\"").unwrap();

        assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }
}
