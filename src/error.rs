//! Error handling types for imebot
//!
//! Each subsystem owns its error enum; `BotError` gathers them for the
//! startup and shutdown paths where any failure ends the process.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::{ConfigError, StateError};
use crate::ime::ImeError;

/// Errors that abort the bot before or after the pipeline runs
#[derive(Debug, Error)]
pub enum BotError {
    /// Settings file missing, unreadable or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cursor state could not be loaded or saved
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Chat API failed during startup (identity lookup, client build)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// IME engine could not be started
    #[error("IME error: {0}")]
    Ime(#[from] ImeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for startup and shutdown operations
pub type BotResult<T> = Result<T, BotError>;
