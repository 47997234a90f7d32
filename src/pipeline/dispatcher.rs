//! Single consumer of the update queue.
//!
//! Updates are handled one at a time, in queue order. Each is routed by its
//! payload tag:
//!
//! - `inline_query`: convert the query and answer with one article per
//!   candidate
//! - `message` in a private chat: `/start` gets the greeting, any other
//!   command has its argument converted, plain text is converted whole; the
//!   best candidate is sent back as a reply
//!
//! Whatever goes wrong with one update is logged and the loop moves on.

use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::mpsc;

use super::command::parse_command;
use super::emitter::Emitter;
use crate::api::{ChatOutbound, InlineQuery, InlineQueryResultArticle, Message, Update, UpdateKind};
use crate::ime::{Candidate, Converter, ImeError};

const LOG_TARGET: &str = "imebot::dispatch";

/// Why one update could not be processed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed update {update_id}: {source}")]
    Malformed {
        update_id: i64,
        source: serde_json::Error,
    },

    #[error("conversion failed: {0}")]
    Conversion(#[from] ImeError),
}

/// What handling an update led to; mostly useful to tests and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AnsweredInline { results: usize },
    Replied,
    /// Nothing to send (empty text, no candidates, group chat, other payload)
    Ignored,
}

pub struct Dispatcher<C, O> {
    converter: C,
    emitter: Emitter<O>,
    username: Option<String>,
}

impl<C: Converter, O: ChatOutbound> Dispatcher<C, O> {
    pub fn new(converter: C, emitter: Emitter<O>, username: Option<String>) -> Self {
        Self {
            converter,
            emitter,
            username,
        }
    }

    /// Consume the queue until it is closed and empty.
    pub async fn run(&self, queue: &mut mpsc::UnboundedReceiver<Update>) {
        while let Some(update) = queue.recv().await {
            self.dispatch(update).await;
        }
        log::info!(target: LOG_TARGET, "Update queue drained and closed");
    }

    /// Wait for every reply and answer queued so far to be sent.
    pub async fn shutdown(&self) {
        self.emitter.shutdown().await;
    }

    /// Handle one update, logging instead of returning its failure.
    pub async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        match self.handle(update).await {
            Ok(outcome) => log::debug!(target: LOG_TARGET, "Update {}: {:?}", update_id, outcome),
            Err(e) => log::error!(
                target: LOG_TARGET,
                "Failed to process update {}: {}",
                update_id,
                e
            ),
        }
    }

    /// Route one update. Errors stay with this update.
    pub async fn handle(&self, update: Update) -> Result<Outcome, DispatchError> {
        log::debug!(target: LOG_TARGET, "Update: {:?}", update);
        let kind = update.kind().map_err(|source| DispatchError::Malformed {
            update_id: update.update_id,
            source,
        })?;

        match kind {
            UpdateKind::InlineQuery(query) => self.handle_inline_query(query).await,
            UpdateKind::Message(message) => self.handle_message(message).await,
            UpdateKind::Unsupported(tag) => {
                log::debug!(target: LOG_TARGET, "Ignoring {} update", tag);
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn handle_inline_query(&self, query: InlineQuery) -> Result<Outcome, DispatchError> {
        let text = query.query.trim();
        let candidates = self.converter.candidates(text).await?;
        if candidates.is_empty() {
            return Ok(Outcome::Ignored);
        }

        let results = inline_results(&candidates);
        log::info!(
            target: LOG_TARGET,
            "{} -> {:?}",
            text,
            candidates.iter().map(|c| c.text.as_str()).collect::<Vec<_>>()
        );
        let count = results.len();
        self.emitter.answer_inline_query(query.id, results);
        Ok(Outcome::AnsweredInline { results: count })
    }

    async fn handle_message(&self, message: Message) -> Result<Outcome, DispatchError> {
        if !message.chat.is_private() {
            return Ok(Outcome::Ignored);
        }
        let text = message.text.as_deref().unwrap_or("").trim();

        let response = match parse_command(text, self.username.as_deref()) {
            Some(cmd) if cmd.name == "start" => Some(self.greeting()),
            Some(cmd) => self.best_candidate(cmd.argument).await?,
            None => self.best_candidate(text).await?,
        };

        let Some(response) = response else {
            return Ok(Outcome::Ignored);
        };
        match self
            .emitter
            .send_message(message.chat.id, &response, Some(message.message_id))
        {
            Some(_) => Ok(Outcome::Replied),
            None => Ok(Outcome::Ignored),
        }
    }

    async fn best_candidate(&self, text: &str) -> Result<Option<String>, ImeError> {
        let candidates = self.converter.candidates(text).await?;
        Ok(candidates.into_iter().next().map(|c| c.text))
    }

    fn greeting(&self) -> String {
        match &self.username {
            Some(name) => format!(
                "This is an inline bot. Send me text directly or use @{}",
                name
            ),
            None => "This is an inline bot. Send me text directly or mention me inline".to_string(),
        }
    }
}

/// One article per distinct candidate text, in candidate order.
pub fn inline_results(candidates: &[Candidate]) -> Vec<InlineQueryResultArticle> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(c.text.as_str()))
        .map(|c| InlineQueryResultArticle::new(&c.text, &c.description))
        .collect()
}
