//! Configuration loading for promptsplit.
//!
//! Values merge over built-in defaults: an absent file or an absent key
//! always falls back to the default rather than failing. Discovery order is
//! an explicit `--config` path, then `promptsplit.toml` in the working
//! directory, then the user config directory, then defaults. The API key is
//! never written by this crate and the `PROMPTSPLIT_API_KEY` environment
//! variable overrides any file value.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "PROMPTSPLIT_API_KEY";

/// Config file name searched for in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "promptsplit.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chat-completions endpoint URL
    pub api_url: String,
    /// API key; prefer `PROMPTSPLIT_API_KEY` over putting this in a file
    pub api_key: Option<String>,
    pub default_model: String,
    /// Per-request HTTP timeout in seconds
    pub timeout_secs: u64,
    /// Minimum chunk length before extension to a line boundary
    pub chunk_size: usize,
    /// Concurrent in-flight LLM calls during batch work
    pub max_workers: usize,
    pub output_dir: Utf8PathBuf,
    pub retry: RetryConfig,
    pub codegen: CodegenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            default_model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            chunk_size: 500,
            max_workers: 5,
            output_dir: Utf8PathBuf::from("output"),
            retry: RetryConfig::default(),
            codegen: CodegenConfig::default(),
        }
    }
}

/// Retry table; mirrors the coordinator's policy fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Seconds
    pub base_delay: f64,
    /// Seconds
    pub max_delay: f64,
    pub backoff_base: f64,
    pub jitter_fraction: f64,
    /// Error kind names that stop the retry loop immediately
    pub non_retryable_kinds: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: 1.0,
            max_delay: 30.0,
            backoff_base: 2.0,
            jitter_fraction: 0.25,
            non_retryable_kinds: vec![
                "auth".to_string(),
                "invalid_request".to_string(),
                "quota_exceeded".to_string(),
            ],
        }
    }
}

/// Code-generation stage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    pub enabled: bool,
    /// Test cases requested per generated implementation
    pub test_case_count: u32,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            test_case_count: 5,
        }
    }
}

impl Config {
    /// Load configuration with the documented discovery order.
    ///
    /// # Errors
    ///
    /// An explicit path that cannot be read or parsed is an error; discovered
    /// files that fail to parse are errors too (silent fallback would mask
    /// typos). A missing discovered file is not an error.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::discover(explicit)? {
            Some((path, config)) => {
                debug!(path = %path, "loaded config file");
                config
            }
            None => {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.is_empty()
        {
            config.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    fn discover(explicit: Option<&Utf8Path>) -> Result<Option<(Utf8PathBuf, Self)>, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path).map(|c| Some((path.to_owned(), c)));
        }

        let cwd_candidate = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if cwd_candidate.exists() {
            return Self::from_file(&cwd_candidate).map(|c| Some((cwd_candidate, c)));
        }

        if let Some(dir) = dirs::config_dir()
            && let Ok(dir) = Utf8PathBuf::from_path_buf(dir)
        {
            let user_candidate = dir.join("promptsplit").join(CONFIG_FILE_NAME);
            if user_candidate.exists() {
                return Self::from_file(&user_candidate).map(|c| Some((user_candidate, c)));
            }
        }

        Ok(None)
    }

    /// Parse one file; absent keys keep their defaults via serde.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Parse`.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero",
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                reason: "must be greater than zero",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be greater than zero",
            });
        }
        if self.retry.backoff_base <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_base",
                reason: "must be greater than zero",
            });
        }
        if self.retry.base_delay < 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry.base_delay",
                reason: "must not be negative",
            });
        }
        if self.retry.max_delay < 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_delay",
                reason: "must not be negative",
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
