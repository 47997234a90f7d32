//! Chat platform API: wire types, retrying HTTP client and the two seams the
//! pipeline talks through.
//!
//! - [`UpdateSource`]: what the poller needs (getUpdates)
//! - [`ChatOutbound`]: what the emitter needs (sendMessage, answerInlineQuery)
//!
//! [`TelegramClient`] implements both against the real HTTP API; tests plug in
//! in-memory fakes.

pub mod client;
pub mod retry;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

pub use client::TelegramClient;
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    AnswerInlineQuery, InlineQuery, InlineQueryResultArticle, Message, SendMessage, Update,
    UpdateKind, User, article_id,
};

/// Failure of a single API call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connect, timeout, body read)
    #[error("{method}: transport failure: {message}")]
    Transport { method: String, message: String },

    /// The response body was not the expected JSON envelope
    #[error("{method}: undecodable response: {message}")]
    Decode { method: String, message: String },

    /// The API answered `ok: false`
    #[error("{method}: rejected by API: {description}")]
    Rejected { method: String, description: String },
}

impl ApiError {
    /// Transport error without a method, for tests and fakes.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            method: String::new(),
            message: message.into(),
        }
    }

    /// Only failures to complete a call are worth another try; a rejection
    /// would be rejected again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport { .. } | ApiError::Decode { .. })
    }
}

/// Long-poll source of updates.
pub trait UpdateSource: Send + Sync + 'static {
    fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> impl Future<Output = Result<Vec<Update>, ApiError>> + Send;
}

/// Outbound calls whose results the bot does not need.
pub trait ChatOutbound: Send + Sync + 'static {
    fn send_message(
        &self,
        request: SendMessage,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn answer_inline_query(
        &self,
        request: AnswerInlineQuery,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: UpdateSource> UpdateSource for Arc<T> {
    fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> impl Future<Output = Result<Vec<Update>, ApiError>> + Send {
        (**self).get_updates(offset, timeout_secs)
    }
}
