//! Long-poll loop feeding the update queue.
//!
//! The poller is the only writer of the cursor. Each cycle it fetches from
//! the current cursor, enqueues the batch in order, and only then moves the
//! cursor past the highest id it saw. A crash between the two steps means the
//! next fetch delivers the same items again, never that items are skipped.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::api::{ApiError, Update, UpdateSource};
use crate::config::PollingSettings;

const LOG_TARGET: &str = "imebot::poller";

/// Why a poll cycle produced nothing
#[derive(Debug, Error)]
pub enum PollError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ApiError),

    /// The dispatcher dropped its end of the queue
    #[error("update queue closed")]
    QueueClosed,
}

/// Capped exponential delay between failed fetches.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay for this failure; doubles the next one up to the cap.
    pub fn fail(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

pub struct Poller<S> {
    source: S,
    queue: mpsc::UnboundedSender<Update>,
    cursor: watch::Sender<i64>,
    long_poll_timeout_secs: u64,
    interval: Duration,
    backoff: Backoff,
}

impl<S: UpdateSource> Poller<S> {
    /// `cursor` carries the starting offset; readers of its receivers see
    /// every advance.
    pub fn new(
        source: S,
        queue: mpsc::UnboundedSender<Update>,
        cursor: watch::Sender<i64>,
        settings: &PollingSettings,
    ) -> Self {
        Self {
            source,
            queue,
            cursor,
            long_poll_timeout_secs: settings.long_poll_timeout_secs,
            interval: settings.interval(),
            backoff: Backoff::new(
                Duration::from_millis(settings.backoff_initial_ms),
                Duration::from_millis(settings.backoff_max_ms),
            ),
        }
    }

    pub fn cursor(&self) -> i64 {
        *self.cursor.borrow()
    }

    /// One fetch-enqueue-advance cycle. Returns how many updates were queued.
    pub async fn poll_once(&mut self) -> Result<usize, PollError> {
        let offset = self.cursor();
        let updates = self
            .source
            .get_updates(offset, self.long_poll_timeout_secs)
            .await?;

        let Some(highest) = updates.iter().map(|u| u.update_id).max() else {
            return Ok(0);
        };
        let count = updates.len();
        for update in updates {
            self.queue.send(update).map_err(|_| PollError::QueueClosed)?;
        }

        let next = (highest + 1).max(offset);
        self.cursor.send_replace(next);
        log::debug!(
            target: LOG_TARGET,
            "Queued {} update(s), cursor {} -> {}",
            count,
            offset,
            next
        );
        Ok(count)
    }

    /// Poll until the queue closes. Fetch failures are logged and retried
    /// after a backoff; nothing else stops the loop.
    pub async fn run(mut self) {
        loop {
            let mut pause = self.interval;
            match self.poll_once().await {
                Ok(_) => self.backoff.reset(),
                Err(PollError::QueueClosed) => {
                    log::info!(target: LOG_TARGET, "Update queue closed, poller stopping");
                    return;
                }
                Err(PollError::Fetch(e)) => {
                    let delay = self.backoff.fail();
                    log::error!(
                        target: LOG_TARGET,
                        "Get updates failed: {}; retrying in {:?}",
                        e,
                        delay + pause
                    );
                    pause += delay;
                }
            }
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted fetch results and records the offsets asked for.
    #[derive(Default)]
    struct Script {
        batches: Mutex<VecDeque<Result<Vec<Update>, ApiError>>>,
        offsets: Mutex<Vec<i64>>,
    }

    impl Script {
        fn new(batches: Vec<Result<Vec<Update>, ApiError>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                offsets: Mutex::default(),
            }
        }
    }

    impl UpdateSource for Script {
        async fn get_updates(&self, offset: i64, _timeout: u64) -> Result<Vec<Update>, ApiError> {
            self.offsets.lock().unwrap().push(offset);
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn upd(id: i64) -> Update {
        serde_json::from_value(json!({
            "update_id": id,
            "message": {"message_id": id, "chat": {"id": 1, "type": "private"}, "text": "x"}
        }))
        .unwrap()
    }

    fn poller(
        script: Script,
        start: i64,
    ) -> (Poller<Script>, mpsc::UnboundedReceiver<Update>, watch::Receiver<i64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cursor_tx, cursor_rx) = watch::channel(start);
        let settings = PollingSettings {
            interval_ms: 0,
            backoff_initial_ms: 0,
            ..PollingSettings::default()
        };
        (Poller::new(script, tx, cursor_tx, &settings), rx, cursor_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Update>) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Ok(u) = rx.try_recv() {
            ids.push(u.update_id);
        }
        ids
    }

    #[tokio::test]
    async fn cursor_tracks_one_past_highest_id_across_batches() {
        let script = Script::new(vec![
            Ok(vec![upd(5)]),
            Ok(vec![upd(6), upd(7), upd(9)]),
            Ok(vec![]),
            Ok(vec![upd(10)]),
        ]);
        let (mut poller, mut rx, cursor) = poller(script, 0);

        for _ in 0..4 {
            poller.poll_once().await.unwrap();
        }

        assert_eq!(*cursor.borrow(), 11);
        assert_eq!(drain(&mut rx), vec![5, 6, 7, 9, 10]);
        assert_eq!(*poller.source.offsets.lock().unwrap(), vec![0, 6, 10, 10]);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cursor_alone() {
        let script = Script::new(vec![
            Ok(vec![upd(3)]),
            Err(ApiError::transport("reset")),
            Ok(vec![upd(4)]),
        ]);
        let (mut poller, mut rx, cursor) = poller(script, 0);

        poller.poll_once().await.unwrap();
        assert!(matches!(poller.poll_once().await, Err(PollError::Fetch(_))));
        assert_eq!(*cursor.borrow(), 4);
        poller.poll_once().await.unwrap();

        assert_eq!(*cursor.borrow(), 5);
        assert_eq!(drain(&mut rx), vec![3, 4]);
    }

    #[tokio::test]
    async fn stale_batch_never_moves_cursor_backwards() {
        let script = Script::new(vec![Ok(vec![upd(2)])]);
        let (mut poller, mut rx, cursor) = poller(script, 50);

        assert_eq!(poller.poll_once().await.unwrap(), 1);

        assert_eq!(*cursor.borrow(), 50);
        assert_eq!(drain(&mut rx), vec![2]);
    }

    #[tokio::test]
    async fn closed_queue_stops_the_loop() {
        let script = Script::new(vec![Err(ApiError::transport("down")), Ok(vec![upd(1)])]);
        let (poller, rx, cursor) = poller(script, 0);
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), poller.run())
            .await
            .expect("poller should stop once the queue is closed");

        // The batch could not be queued, so the cursor stays put
        assert_eq!(*cursor.borrow(), 0);
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));

        assert_eq!(backoff.fail(), Duration::from_millis(100));
        assert_eq!(backoff.fail(), Duration::from_millis(200));
        assert_eq!(backoff.fail(), Duration::from_millis(350));
        assert_eq!(backoff.fail(), Duration::from_millis(350));

        backoff.reset();
        assert_eq!(backoff.fail(), Duration::from_millis(100));
    }
}
