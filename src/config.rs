pub mod settings;
pub mod state;

pub use settings::{
    ApiSettings, EmitterSettings, EngineKind, ImeSettings, PollingSettings, Settings,
};
pub use state::{BotState, JsonFileStore, StateStore};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the settings file location
pub const CONFIG_ENV_VAR: &str = "IMEBOT_CONFIG";

/// Settings file used when `IMEBOT_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "imebot.toml";

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid settings: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`StateStore`]
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse state {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(serde_json::Error),

    #[error("Failed to write state {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Returns the settings path: `$IMEBOT_CONFIG` if set, else `imebot.toml`.
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn config_path_from(env_value: Option<PathBuf>) -> PathBuf {
    env_value
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_falls_back_to_default_file() {
        assert_eq!(config_path_from(None), PathBuf::from("imebot.toml"));
        assert_eq!(
            config_path_from(Some(PathBuf::new())),
            PathBuf::from("imebot.toml")
        );
    }

    #[test]
    fn config_path_prefers_environment() {
        assert_eq!(
            config_path_from(Some(PathBuf::from("/etc/imebot.toml"))),
            PathBuf::from("/etc/imebot.toml")
        );
    }
}
