//! Command-line interface parsing for Pitwall CLI
//!
//! This module defines the subcommands and global flags using clap, and the
//! `key=value` parser used for API query parameters.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Config;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A query parameter was not in `key=value` form
    #[error("Invalid parameter: '{0}'. Expected key=value, e.g. session_key=9636")]
    InvalidParam(String),
}

/// Pitwall CLI - Browse Formula 1 data from the OpenF1 API
#[derive(Parser, Debug)]
#[command(name = "pitwall")]
#[command(about = "Formula 1 data from the OpenF1 API, with a local response cache")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PITWALL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for cached responses
    #[arg(long, global = true, env = "PITWALL_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// API base URL, including the version segment
    #[arg(long, global = true, env = "PITWALL_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Log filter, e.g. debug or pitwall=info
    #[arg(long, global = true, env = "PITWALL_LOG", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch an endpoint and print its JSON payload
    ///
    /// Examples:
    ///   pitwall fetch meetings year=2024
    ///   pitwall fetch laps session_key=9636 driver_number=44 --refresh
    Fetch {
        /// Endpoint name, e.g. laps, stints, sessions
        endpoint: String,

        /// Query parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Bypass the cache and always query the API
        #[arg(long)]
        refresh: bool,
    },

    /// Export one or more endpoints to JSON files
    ///
    /// Examples:
    ///   pitwall export laps stints -p session_key=9636 -p driver_number=44
    Export {
        /// Endpoint names
        #[arg(required = true)]
        endpoints: Vec<String>,

        /// Query parameter applied to every endpoint, as key=value
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Bypass the cache and always query the API
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache maintenance subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Show entry counts, sizes and ages
    Stats,
    /// Delete cached entries, optionally only one category
    Clear {
        /// Category (endpoint name) to clear, e.g. laps
        category: Option<String>,
    },
    /// Show the cache directory
    Info,
}

/// Parses a `key=value` query parameter
///
/// Only the first `=` splits, so values may contain `=`. A key ending in a
/// comparison operator such as `speed>=315` keeps the operator in the key.
///
/// # Returns
/// * `Ok((key, value))` if the argument contains `=` and a non-empty key
/// * `Err(CliError::InvalidParam)` otherwise
pub fn parse_param(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

impl Cli {
    /// Applies command-line overrides on top of file configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_simple() {
        assert_eq!(
            parse_param("session_key=9636").unwrap(),
            ("session_key".to_string(), "9636".to_string())
        );
    }

    #[test]
    fn test_parse_param_splits_on_first_equals() {
        assert_eq!(
            parse_param("date>=2023-09-16T13:03:35").unwrap(),
            ("date>".to_string(), "2023-09-16T13:03:35".to_string())
        );
        assert_eq!(parse_param("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }

    #[test]
    fn test_parse_param_allows_empty_value() {
        assert_eq!(parse_param("year=").unwrap(), ("year".to_string(), String::new()));
    }

    #[test]
    fn test_parse_param_invalid() {
        let err = parse_param("session_key").unwrap_err();
        assert!(err.to_string().contains("Invalid parameter"));
        assert!(err.to_string().contains("session_key"));
        assert!(parse_param("=9636").is_err());
    }

    #[test]
    fn test_cli_parse_fetch() {
        let cli = Cli::parse_from(["pitwall", "fetch", "laps", "session_key=9636", "driver_number=44"]);
        assert_eq!(
            cli.command,
            Command::Fetch {
                endpoint: "laps".to_string(),
                params: vec![
                    ("session_key".to_string(), "9636".to_string()),
                    ("driver_number".to_string(), "44".to_string()),
                ],
                refresh: false,
            }
        );
    }

    #[test]
    fn test_cli_parse_fetch_refresh() {
        let cli = Cli::parse_from(["pitwall", "fetch", "meetings", "year=2024", "--refresh"]);
        assert!(matches!(cli.command, Command::Fetch { refresh: true, .. }));
    }

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from([
            "pitwall", "export", "laps", "stints", "-p", "session_key=9636", "--dir", "/tmp/out",
        ]);
        match cli.command {
            Command::Export {
                endpoints,
                params,
                dir,
                refresh,
            } => {
                assert_eq!(endpoints, vec!["laps", "stints"]);
                assert_eq!(params, vec![("session_key".to_string(), "9636".to_string())]);
                assert_eq!(dir, PathBuf::from("/tmp/out"));
                assert!(!refresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_cache_clear_category() {
        let cli = Cli::parse_from(["pitwall", "cache", "clear", "laps"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::Clear {
                    category: Some("laps".to_string())
                }
            }
        );
    }

    #[test]
    fn test_cli_parse_cache_clear_all() {
        let cli = Cli::parse_from(["pitwall", "cache", "clear"]);
        assert_eq!(
            cli.command,
            Command::Cache {
                action: CacheAction::Clear { category: None }
            }
        );
    }

    #[test]
    fn test_cli_rejects_bad_param() {
        assert!(Cli::try_parse_from(["pitwall", "fetch", "laps", "session_key"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pitwall", "cache", "info", "--cache-dir", "/tmp/c"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "pitwall",
            "--base-url",
            "http://localhost:9000/v1",
            "--log-level",
            "debug",
            "cache",
            "stats",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cache_dir, None);
    }
}
