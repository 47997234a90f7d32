use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default chat API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Top-level settings loaded from `imebot.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub emitter: EmitterSettings,
    #[serde(default)]
    pub ime: ImeSettings,
    /// Where the polling cursor and bot identity are persisted
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total tries per call, including the first one
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingSettings {
    /// Server-side long-poll timeout passed to getUpdates
    pub long_poll_timeout_secs: u64,
    /// Fixed pause after every fetch cycle
    pub interval_ms: u64,
    /// First backoff step after a failed fetch; 0 retries immediately
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            long_poll_timeout_secs: 10,
            interval_ms: 200,
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterSettings {
    /// Concurrent outbound calls
    pub workers: usize,
    /// Longest message text sent, in characters, truncation marker included
    pub max_message_len: usize,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            max_message_len: 2000,
        }
    }
}

/// Which conversion strategy answers user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// External line-oriented IME process
    #[default]
    Rime,
    /// In-process dictionary converter
    Simple,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImeSettings {
    pub engine: EngineKind,
    pub program: Option<String>,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Unset means reads block until the engine answers
    pub read_timeout_ms: Option<u64>,
    pub dictionary: Option<PathBuf>,
}

impl Default for ImeSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            program: None,
            args: Vec::new(),
            workdir: PathBuf::from("data"),
            read_timeout_ms: None,
            dictionary: None,
        }
    }
}

impl ImeSettings {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.token.trim().is_empty() {
            return Err(ConfigError::invalid("api.token must not be empty"));
        }
        if self.api.retry_attempts == 0 {
            return Err(ConfigError::invalid("api.retry_attempts must be at least 1"));
        }
        if self.polling.long_poll_timeout_secs >= self.api.request_timeout_secs {
            return Err(ConfigError::invalid(format!(
                "polling.long_poll_timeout_secs ({}) must be below api.request_timeout_secs ({})",
                self.polling.long_poll_timeout_secs, self.api.request_timeout_secs
            )));
        }
        if self.emitter.workers == 0 {
            return Err(ConfigError::invalid("emitter.workers must be at least 1"));
        }
        if self.emitter.max_message_len < 2 {
            return Err(ConfigError::invalid(
                "emitter.max_message_len must be at least 2",
            ));
        }
        match self.ime.engine {
            EngineKind::Rime if self.ime.program.as_deref().is_none_or(str::is_empty) => Err(
                ConfigError::invalid("ime.program is required for the rime engine"),
            ),
            EngineKind::Simple if self.ime.dictionary.is_none() => Err(ConfigError::invalid(
                "ime.dictionary is required for the simple engine",
            )),
            _ => Ok(()),
        }
    }
}
