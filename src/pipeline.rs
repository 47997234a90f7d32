//! Update ingestion and handling.
//!
//! ```text
//! Poller ──► unbounded queue ──► Dispatcher ──► Converter
//!                                     │
//!                                     └──► Emitter ──► chat API
//! ```
//!
//! The poller runs as a background task and owns the cursor; the dispatcher
//! is the queue's only consumer and the only caller into the converter.

pub mod command;
pub mod dispatcher;
pub mod emitter;
pub mod poller;

pub use command::{Command, parse_command};
pub use dispatcher::{DispatchError, Dispatcher, Outcome, inline_results};
pub use emitter::{Emitter, TRUNCATION_MARKER, prepare_text};
pub use poller::{Backoff, PollError, Poller};
