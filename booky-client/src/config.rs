//! Configuration loading for the Booky client.
//!
//! Every field has a default, so running without a file talks to the public
//! library API. A file, when given, may override any subset of fields but
//! must not contain unknown ones.

use booky_query::{QueryConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://belibraryformentee-production.up.railway.app";
pub const CONFIG_ENV: &str = "BOOKY_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub state_path: PathBuf,
    pub log_format: LogFormat,
    pub query: QuerySettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QuerySettings {
    pub stale_time_ms: u64,
    pub gc_time_ms: u64,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: 15_000,
            state_path: default_state_path(),
            log_format: LogFormat::Text,
            query: QuerySettings::default(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        let defaults = QueryConfig::default();
        Self {
            stale_time_ms: defaults.stale_time.as_millis() as u64,
            gc_time_ms: defaults.gc_time.as_millis() as u64,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_ms: defaults.initial_ms,
            max_ms: defaults.max_ms,
            multiplier: defaults.multiplier,
            jitter_ms: defaults.jitter_ms,
        }
    }
}

impl ClientConfig {
    /// Load from `path`, else from `BOOKY_CONFIG`, else use the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let config = match path {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.state_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "state_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.query.gc_time_ms < self.query.stale_time_ms {
            return Err(ConfigError::InvalidValue {
                field: "query.gc_time_ms",
                reason: "must be >= stale_time_ms".to_string(),
            });
        }
        let retry = &self.query.retry;
        if retry.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.retry.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if retry.max_ms < retry.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "query.retry.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "query.retry.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn query_config(&self) -> QueryConfig {
        let retry = &self.query.retry;
        QueryConfig::new()
            .with_stale_time(Duration::from_millis(self.query.stale_time_ms))
            .with_gc_time(Duration::from_millis(self.query.gc_time_ms))
            .with_retry(RetryConfig {
                max_retries: retry.max_retries,
                initial_ms: retry.initial_ms,
                max_ms: retry.max_ms,
                multiplier: retry.multiplier,
                jitter_ms: retry.jitter_ms,
            })
    }
}

fn default_state_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".booky").join("state.json"),
        None => PathBuf::from("booky-state.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query_config().stale_time, Duration::from_secs(30));
        assert_eq!(config.query_config().gc_time, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_base_url = "http://localhost:8080"
            log_format = "json"

            [query]
            stale_time_ms = 1000

            [query.retry]
            max_retries = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.request_timeout_ms, 15_000);
        let query = config.query_config();
        assert_eq!(query.stale_time, Duration::from_secs(1));
        assert_eq!(query.retry.max_retries, 0);
        assert_eq!(query.retry.initial_ms, 1000);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ClientConfig::from_toml_str("theme = \"dark\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig {
            api_base_url: "ftp://library".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api_base_url", .. })
        ));

        config.api_base_url = DEFAULT_API_BASE_URL.to_string();
        config.query.retry.multiplier = 0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "query.retry.multiplier", .. })
        ));

        config.query.retry.multiplier = 2.0;
        config.query.gc_time_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "query.gc_time_ms", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booky.toml");
        std::fs::write(&path, "request_timeout_ms = 500\n").unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(500));

        let missing = ClientConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
