//! Fire-and-forget outbound calls.
//!
//! Every emission is spawned as its own task and waits for one of a fixed
//! number of permits, so at most `workers` outbound calls run at once and the
//! dispatcher never waits on the network. Failures are logged, never
//! returned. [`Emitter::shutdown`] waits for every call submitted so far.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::api::{AnswerInlineQuery, ApiError, ChatOutbound, InlineQueryResultArticle, SendMessage};
use crate::config::EmitterSettings;

const LOG_TARGET: &str = "imebot::emitter";

/// Appended to text cut at the length limit
pub const TRUNCATION_MARKER: char = '…';

pub struct Emitter<O> {
    outbound: Arc<O>,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    max_message_len: usize,
}

impl<O> Clone for Emitter<O> {
    fn clone(&self) -> Self {
        Self {
            outbound: self.outbound.clone(),
            permits: self.permits.clone(),
            tasks: self.tasks.clone(),
            max_message_len: self.max_message_len,
        }
    }
}

impl<O: ChatOutbound> Emitter<O> {
    pub fn new(outbound: Arc<O>, settings: &EmitterSettings) -> Self {
        Self {
            outbound,
            permits: Arc::new(Semaphore::new(settings.workers.max(1))),
            tasks: TaskTracker::new(),
            max_message_len: settings.max_message_len,
        }
    }

    /// Queue a reply. Blank text is dropped without calling out, and `None`
    /// is returned.
    pub fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Option<JoinHandle<()>> {
        let Some(text) = prepare_text(text, self.max_message_len) else {
            log::warn!(
                target: LOG_TARGET,
                "Empty message ignored: {}, {:?}",
                chat_id,
                reply_to_message_id
            );
            return None;
        };
        log::info!(
            target: LOG_TARGET,
            "sendMessage({}): {}",
            text.chars().count(),
            text.chars().take(20).collect::<String>()
        );

        let outbound = self.outbound.clone();
        let request = SendMessage {
            chat_id,
            text,
            reply_to_message_id,
        };
        Some(self.submit("sendMessage", async move {
            outbound.send_message(request).await
        }))
    }

    /// Queue an inline answer.
    pub fn answer_inline_query(
        &self,
        inline_query_id: String,
        results: Vec<InlineQueryResultArticle>,
    ) -> JoinHandle<()> {
        let outbound = self.outbound.clone();
        let request = AnswerInlineQuery {
            inline_query_id,
            results,
        };
        self.submit("answerInlineQuery", async move {
            outbound.answer_inline_query(request).await
        })
    }

    /// Spawn `call` behind a permit; its error is logged.
    fn submit<F>(&self, what: &'static str, call: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            // The semaphore is never closed
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = call.await {
                log::error!(target: LOG_TARGET, "{} failed: {}", what, e);
            }
        })
    }

    /// Wait until every submitted call has finished.
    ///
    /// Calls submitted while waiting are waited for as well.
    pub async fn shutdown(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            log::info!(
                target: LOG_TARGET,
                "Waiting for {} outbound call(s)",
                self.tasks.len()
            );
        }
        self.tasks.wait().await;
    }
}

/// Trim `text`; `None` if nothing is left. Text over `max_len` characters is
/// cut to `max_len - 1` characters plus [`TRUNCATION_MARKER`].
pub fn prepare_text(text: &str, max_len: usize) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= max_len {
        return Some(text.to_string());
    }
    let mut cut: String = text.chars().take(max_len.saturating_sub(1)).collect();
    cut.push(TRUNCATION_MARKER);
    Some(cut)
}
