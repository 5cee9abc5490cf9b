//! Environment configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use writer_api::url::DEFAULT_API_BASE_URL;
use writer_api::WriterApiConfig;

use crate::channel::DEFAULT_RECONNECT_DELAY;

pub const CONFIG_PATH_ENV_VAR: &str = "DRAFT_SESSION_CONFIG_PATH";
pub const API_URL_ENV_VAR: &str = "DRAFT_SESSION_API_URL";

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SAVED_INDICATOR_RESET: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub request_timeout: Option<Duration>,
    pub reconnect_delay: Duration,
    pub autosave_interval: Duration,
    pub saved_indicator_reset: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            saved_indicator_reset: DEFAULT_SAVED_INDICATOR_RESET,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    timeout_sec: Option<u64>,
    reconnect_delay_ms: Option<u64>,
    autosave_interval_sec: Option<u64>,
    saved_indicator_reset_ms: Option<u64>,
}

impl SessionConfig {
    /// Defaults, then the file named by `DRAFT_SESSION_CONFIG_PATH`, then `DRAFT_SESSION_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env_string_opt(CONFIG_PATH_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(api_base_url) = env_string_opt(API_URL_ENV_VAR) {
            config.api_base_url = api_base_url;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::default().merge(file)
    }

    fn merge(mut self, file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(api_base_url) = file.api_base_url {
            if api_base_url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "api_base_url",
                    reason: "must not be empty".to_string(),
                });
            }
            self.api_base_url = api_base_url;
        }
        if let Some(secs) = file.timeout_sec {
            self.request_timeout = Some(Duration::from_secs(positive("timeout_sec", secs)?));
        }
        if let Some(ms) = file.reconnect_delay_ms {
            self.reconnect_delay = Duration::from_millis(positive("reconnect_delay_ms", ms)?);
        }
        if let Some(secs) = file.autosave_interval_sec {
            self.autosave_interval =
                Duration::from_secs(positive("autosave_interval_sec", secs)?);
        }
        if let Some(ms) = file.saved_indicator_reset_ms {
            self.saved_indicator_reset =
                Duration::from_millis(positive("saved_indicator_reset_ms", ms)?);
        }
        Ok(self)
    }

    pub fn writer_api_config(&self) -> WriterApiConfig {
        let config = WriterApiConfig::new(self.api_base_url.clone());
        match self.request_timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }
}

fn positive(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
