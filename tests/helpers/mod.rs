//! In-memory stand-ins for the chat API and the IME engine process.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use imebot::api::{AnswerInlineQuery, ApiError, ChatOutbound, SendMessage, Update, UpdateSource};
use imebot::ime::{EngineSession, ImeError, Launcher};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};
use tokio::sync::Notify;

/// Chat API fake: serves scripted getUpdates batches, then idles like an
/// empty long poll; records every outbound call.
#[derive(Default)]
pub struct FakeChat {
    batches: Mutex<VecDeque<Result<Vec<Update>, ApiError>>>,
    pub offsets: Mutex<Vec<i64>>,
    pub messages: Mutex<Vec<SendMessage>>,
    pub answers: Mutex<Vec<AnswerInlineQuery>>,
    /// Signalled after every recorded outbound call
    pub sent: Notify,
    /// How long each outbound call takes
    pub latency: Duration,
}

impl FakeChat {
    pub fn new(batches: Vec<Result<Vec<Update>, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches.into()),
            ..Self::default()
        })
    }

    /// Like [`FakeChat::new`], with every outbound call taking `latency`.
    pub fn with_latency(
        batches: Vec<Result<Vec<Update>, ApiError>>,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches.into()),
            latency,
            ..Self::default()
        })
    }

    pub fn outbound_count(&self) -> usize {
        self.messages.lock().unwrap().len() + self.answers.lock().unwrap().len()
    }

    /// Wait until at least `n` outbound calls were recorded.
    pub async fn wait_for_outbound(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.sent.notified();
                if self.outbound_count() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for outbound calls");
    }
}

impl UpdateSource for FakeChat {
    async fn get_updates(&self, offset: i64, _timeout: u64) -> Result<Vec<Update>, ApiError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Vec::new())
            }
        }
    }
}

impl ChatOutbound for FakeChat {
    async fn send_message(&self, request: SendMessage) -> Result<(), ApiError> {
        tokio::time::sleep(self.latency).await;
        self.messages.lock().unwrap().push(request);
        self.sent.notify_waiters();
        Ok(())
    }

    async fn answer_inline_query(&self, request: AnswerInlineQuery) -> Result<(), ApiError> {
        tokio::time::sleep(self.latency).await;
        self.answers.lock().unwrap().push(request);
        self.sent.notify_waiters();
        Ok(())
    }
}

/// Engine fake that answers each line with a fixed mapping (or the input
/// reversed) and records what it was asked.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub launches: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<String>>>,
    pub table: Arc<Vec<(&'static str, &'static str)>>,
}

impl FakeEngine {
    pub fn with_table(table: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            table: Arc::new(table),
            ..Self::default()
        }
    }

    pub fn answer(&self, line: &str) -> String {
        self.table
            .iter()
            .find(|(k, _)| *k == line)
            .map(|(_, v)| v.to_string())
            .unwrap_or_else(|| line.chars().rev().collect())
    }
}

impl Launcher for FakeEngine {
    fn launch(&self) -> Result<EngineSession, ImeError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let (bridge_in, engine_in) = duplex(1024);
        let (mut engine_out, bridge_out) = duplex(1024);
        let engine = self.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(engine_in).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                engine.requests.lock().unwrap().push(line.clone());
                let reply = format!("{}\n", engine.answer(&line));
                if engine_out.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
            }
        });
        Ok(EngineSession::new(
            Box::new(bridge_in),
            Box::new(bridge_out),
            None,
        ))
    }
}

pub fn update(value: Value) -> Update {
    serde_json::from_value(value).expect("valid update JSON")
}

pub fn inline_update(id: i64, query_id: &str, query: &str) -> Update {
    update(json!({
        "update_id": id,
        "inline_query": {"id": query_id, "query": query, "offset": ""}
    }))
}

pub fn private_update(id: i64, text: &str) -> Update {
    update(json!({
        "update_id": id,
        "message": {
            "message_id": id * 100,
            "chat": {"id": 42, "type": "private"},
            "text": text
        }
    }))
}
