//! Request/response bridge to a line-oriented IME process.
//!
//! # Protocol
//!
//! One request is one UTF-8 line written to the engine's stdin; the engine
//! answers with exactly one line on stdout. The bridge never pipelines: the
//! session mutex is held from the write until the answer is read, so at most
//! one request is in flight.
//!
//! # Recovery
//!
//! ```text
//! convert(text)
//!       │
//!       ├─► write + flush + read_line
//!       │         │
//!       │         ├─► ok ─────────────────────────────► answer
//!       │         │
//!       │         └─► broken pipe / EOF
//!       │                   │
//!       │                   └─► drop session, launch a new one,
//!       │                       write + flush + read_line once more
//!       │                             │
//!       │                             ├─► ok ───────────► answer
//!       │                             └─► error ────────► ImeError
//!       │
//!       └─► read timeout (if configured) ─► relaunch ───► ImeError::Timeout
//! ```
//!
//! Everything above runs under the session lock, so no caller can observe a
//! half-replaced process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::ImeError;

const LOG_TARGET: &str = "imebot::ime";

/// Write half of an engine session
pub type EngineInput = Box<dyn AsyncWrite + Send + Unpin>;
/// Read half of an engine session
pub type EngineOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A live engine: its two streams plus the process, if there is one.
pub struct EngineSession {
    input: EngineInput,
    output: BufReader<EngineOutput>,
    /// Kept so the process is killed when the session is dropped
    _child: Option<Child>,
}

impl EngineSession {
    pub fn new(input: EngineInput, output: EngineOutput, child: Option<Child>) -> Self {
        Self {
            input,
            output: BufReader::new(output),
            _child: child,
        }
    }

    async fn write_request(&mut self, request: &[u8]) -> std::io::Result<()> {
        self.input.write_all(request).await?;
        // The engine only answers once it sees the full line
        self.input.flush().await
    }

    /// Read one line; `None` on end of stream.
    async fn read_reply(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.output.read_until(b'\n', &mut line).await?;
        if n == 0 { Ok(None) } else { Ok(Some(line)) }
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("pid", &self._child.as_ref().and_then(Child::id))
            .finish()
    }
}

/// Starts engine sessions. Called once at startup and again after each
/// severed session.
pub trait Launcher: Send + Sync {
    fn launch(&self) -> Result<EngineSession, ImeError>;
}

/// Spawns the engine as a child process with piped stdin/stdout.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self) -> Result<EngineSession, ImeError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let spawn_err = |message: String| ImeError::Spawn {
            program: self.program.clone(),
            message,
        };

        let mut child = command.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("stdout not captured".to_string()))?;

        log::info!(
            target: LOG_TARGET,
            "Started IME engine {} (pid {:?})",
            self.program,
            child.id()
        );
        Ok(EngineSession::new(
            Box::new(stdin),
            Box::new(stdout),
            Some(child),
        ))
    }
}

/// Outcome of one write/read exchange that did not produce an answer.
enum ExchangeError {
    /// The session is unusable: broken pipe on write, or EOF on read
    Severed(std::io::Error),
    TimedOut,
    Io(std::io::Error),
    Decode(std::string::FromUtf8Error),
}

impl ExchangeError {
    fn from_write(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            ExchangeError::Severed(e)
        } else {
            ExchangeError::Io(e)
        }
    }

    fn into_ime_error(self) -> ImeError {
        match self {
            ExchangeError::Severed(e) => ImeError::Exited(e.to_string()),
            ExchangeError::TimedOut => ImeError::Timeout,
            ExchangeError::Io(e) => ImeError::Io(e),
            ExchangeError::Decode(e) => ImeError::Decode(e),
        }
    }
}

/// Serialized access to one long-lived engine process.
pub struct ImeBridge<L = CommandLauncher> {
    launcher: L,
    /// `None` only after a relaunch failed; the next call tries again
    session: Mutex<Option<EngineSession>>,
    read_timeout: Option<Duration>,
}

impl<L: Launcher> ImeBridge<L> {
    /// Launch the first session. Failing here is a startup error.
    pub fn start(launcher: L) -> Result<Self, ImeError> {
        let session = launcher.launch()?;
        Ok(Self {
            launcher,
            session: Mutex::new(Some(session)),
            read_timeout: None,
        })
    }

    /// Bound the wait for each answer. Expiry discards the session.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Convert one line of phonetic input. Empty input returns an empty
    /// string without touching the engine.
    pub async fn convert(&self, text: &str) -> Result<String, ImeError> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let request = encode_request(text);

        let mut guard = self.session.lock().await;
        log::debug!(target: LOG_TARGET, "-> {}", text);

        let first = match guard.as_mut() {
            Some(session) => self.exchange(session, &request).await,
            None => Err(ExchangeError::Severed(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no engine session",
            ))),
        };

        let result = match first {
            Ok(reply) => Ok(reply),
            Err(ExchangeError::Severed(e)) => {
                log::warn!(target: LOG_TARGET, "IME engine pipe severed ({}), restarting", e);
                *guard = None;
                let session = guard.insert(self.launcher.launch()?);
                match self.exchange(session, &request).await {
                    Ok(reply) => Ok(reply),
                    Err(e) => {
                        if matches!(e, ExchangeError::TimedOut) {
                            self.relaunch(&mut guard);
                        }
                        Err(e.into_ime_error())
                    }
                }
            }
            Err(ExchangeError::TimedOut) => {
                log::warn!(
                    target: LOG_TARGET,
                    "IME engine did not answer within {:?}, restarting",
                    self.read_timeout
                );
                self.relaunch(&mut guard);
                Err(ImeError::Timeout)
            }
            Err(e) => Err(e.into_ime_error()),
        };

        if let Ok(reply) = &result {
            log::debug!(target: LOG_TARGET, "<- {}", reply);
        }
        result
    }

    /// Replace the session after a timeout; a late answer from the old
    /// process would otherwise pair with the next request.
    fn relaunch(&self, slot: &mut Option<EngineSession>) {
        *slot = None;
        match self.launcher.launch() {
            Ok(session) => *slot = Some(session),
            Err(e) => log::error!(target: LOG_TARGET, "Failed to restart IME engine: {}", e),
        }
    }

    async fn exchange(
        &self,
        session: &mut EngineSession,
        request: &[u8],
    ) -> Result<String, ExchangeError> {
        session
            .write_request(request)
            .await
            .map_err(ExchangeError::from_write)?;

        let read = session.read_reply();
        let line = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ExchangeError::TimedOut)?,
            None => read.await,
        }
        .map_err(ExchangeError::Io)?
        .ok_or_else(|| {
            ExchangeError::Severed(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "engine closed its output",
            ))
        })?;

        let reply = String::from_utf8(line).map_err(ExchangeError::Decode)?;
        Ok(reply.trim_end().to_string())
    }
}

impl<L> std::fmt::Debug for ImeBridge<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImeBridge")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

/// Frame `text` as exactly one protocol line.
fn encode_request(text: &str) -> Vec<u8> {
    let mut line: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    line.push('\n');
    line.into_bytes()
}
