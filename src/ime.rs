//! Conversion of phonetic input into candidate text.
//!
//! Two strategies sit behind [`Converter`]:
//! - [`RimeConverter`]: the external engine, reached through [`ImeBridge`]
//! - [`SimpleIme`]: the in-process dictionary fallback
//!
//! [`Engine`] picks one of them from settings.

pub mod bridge;
pub mod simple;

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use zhconv::{Variant, zhconv};

pub use bridge::{CommandLauncher, EngineSession, ImeBridge, Launcher};
pub use simple::SimpleIme;

use crate::config::{EngineKind, ImeSettings};

/// Errors from IME engines
#[derive(Debug, Error)]
pub enum ImeError {
    /// The engine process could not be started
    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// The engine went away and the single retry did not bring it back
    #[error("IME engine exited: {0}")]
    Exited(String),

    /// The engine did not answer within the configured read timeout
    #[error("IME engine did not answer in time")]
    Timeout,

    /// The engine's answer was not UTF-8
    #[error("IME engine sent invalid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Fallback dictionary missing or malformed
    #[error("Failed to load dictionary {path}: {message}")]
    Dictionary { path: PathBuf, message: String },

    #[error("Invalid IME settings: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One conversion result offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    /// Short label naming where the candidate came from
    pub description: String,
}

impl Candidate {
    pub fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: description.into(),
        }
    }
}

/// Turns phonetic input into candidates, best first. Empty input yields no
/// candidates.
pub trait Converter: Send + Sync + 'static {
    fn candidates(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<Candidate>, ImeError>> + Send;
}

/// Label attached to candidates from the external engine
pub const RIME_LABEL: &str = "Rime";
/// Label attached to the simplified-script fallback candidate
pub const SIMPLE_HANS_LABEL: &str = "Simple IME (zh-hans)";
/// Label attached to the traditional-script fallback candidate
pub const SIMPLE_HANT_LABEL: &str = "Simple IME (zh-hant)";

/// Candidates from the external engine: its single answer line.
#[derive(Debug)]
pub struct RimeConverter<L = CommandLauncher> {
    bridge: ImeBridge<L>,
}

impl<L: Launcher> RimeConverter<L> {
    pub fn new(bridge: ImeBridge<L>) -> Self {
        Self { bridge }
    }
}

impl<L: Launcher + 'static> Converter for RimeConverter<L> {
    async fn candidates(&self, text: &str) -> Result<Vec<Candidate>, ImeError> {
        let answer = self.bridge.convert(text).await?;
        if answer.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Candidate::new(answer, RIME_LABEL)])
    }
}

/// Fallback candidates: the dictionary output in simplified script first,
/// then in traditional script. Both are returned even when equal.
impl Converter for SimpleIme {
    async fn candidates(&self, text: &str) -> Result<Vec<Candidate>, ImeError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let converted = self.convert(text);
        if converted.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![
            Candidate::new(zhconv(&converted, Variant::ZhHans), SIMPLE_HANS_LABEL),
            Candidate::new(zhconv(&converted, Variant::ZhHant), SIMPLE_HANT_LABEL),
        ])
    }
}

/// The conversion strategy chosen in settings.
#[derive(Debug)]
pub enum Engine {
    Rime(RimeConverter),
    Simple(SimpleIme),
}

impl Engine {
    /// Build the configured engine. For `rime` this spawns the process, so an
    /// unlaunchable engine fails here, at startup.
    pub fn from_settings(settings: &ImeSettings) -> Result<Self, ImeError> {
        match settings.engine {
            EngineKind::Rime => {
                let program = settings
                    .program
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| ImeError::Settings("ime.program is not set".to_string()))?;
                let launcher = CommandLauncher::new(program)
                    .args(settings.args.iter().cloned())
                    .workdir(&settings.workdir);
                let bridge =
                    ImeBridge::start(launcher)?.with_read_timeout(settings.read_timeout());
                Ok(Engine::Rime(RimeConverter::new(bridge)))
            }
            EngineKind::Simple => {
                let path = settings.dictionary.as_deref().ok_or_else(|| {
                    ImeError::Settings("ime.dictionary is not set".to_string())
                })?;
                Ok(Engine::Simple(SimpleIme::load(path)?))
            }
        }
    }
}

impl Converter for Engine {
    async fn candidates(&self, text: &str) -> Result<Vec<Candidate>, ImeError> {
        match self {
            Engine::Rime(rime) => rime.candidates(text).await,
            Engine::Simple(simple) => simple.candidates(text).await,
        }
    }
}
