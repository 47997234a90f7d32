//! Persisted polling cursor and bot identity.
//!
//! The state file is a single JSON object, read once at startup and written
//! once at shutdown:
//!
//! ```json
//! {
//!  "offset": 42,
//!  "username": "some_ime_bot"
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::StateError;

const LOG_TARGET: &str = "imebot::state";

/// Cursor and identity carried across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BotState {
    /// One past the highest update id already handed to the dispatcher
    #[serde(default)]
    pub offset: i64,
    /// Username resolved through getMe
    #[serde(default)]
    pub username: Option<String>,
}

/// Load/save seam for [`BotState`].
pub trait StateStore {
    fn load(&self) -> Result<BotState, StateError>;
    fn save(&self, state: &BotState) -> Result<(), StateError>;
}

/// Stores state as pretty JSON in a file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    /// A missing file is a fresh start at offset 0.
    fn load(&self) -> Result<BotState, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    target: LOG_TARGET,
                    "No state file at {}, starting from offset 0",
                    self.path.display()
                );
                return Ok(BotState::default());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &BotState) -> Result<(), StateError> {
        let write_err = |source: std::io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;

        let mut body = serde_json::to_vec_pretty(state).map_err(StateError::Encode)?;
        body.push(b'\n');
        file.write_all(&body).map_err(write_err)?;
        file.persist(&self.path)
            .map_err(|e| write_err(e.error))?;

        log::debug!(
            target: LOG_TARGET,
            "Saved state to {} (offset {})",
            self.path.display(),
            state.offset
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_default_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        assert_eq!(store.load().unwrap(), BotState::default());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let state = BotState {
            offset: 6,
            username: Some("ime_bot".to_string()),
        };

        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"offset\": 6"), "unexpected layout: {raw}");
    }

    #[test]
    fn legacy_config_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"apitoken": "x", "offset": 17}"#).unwrap();

        let state = JsonFileStore::new(path).load().unwrap();

        assert_eq!(state.offset, 17);
        assert_eq!(state.username, None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::new(path).load().unwrap_err();
        assert!(matches!(err, StateError::Parse { .. }));
    }
}
