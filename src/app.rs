//! Process lifecycle: load state, start the pipeline, save state on the way
//! out.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::api::{ChatOutbound, TelegramClient, UpdateSource};
use crate::config::{BotState, JsonFileStore, Settings, StateStore};
use crate::error::BotResult;
use crate::ime::{Converter, Engine};
use crate::pipeline::{Dispatcher, Emitter, Poller};

const LOG_TARGET: &str = "imebot::app";

/// Run the bot until Ctrl-C.
///
/// Startup failures (state unreadable, identity lookup failed, engine not
/// launchable) are returned before anything is polled. The state is saved
/// once, after the pipeline has stopped.
pub async fn run(settings: Settings) -> BotResult<()> {
    let store = JsonFileStore::new(&settings.state_file);
    let mut state = store.load()?;

    let client = Arc::new(TelegramClient::new(&settings.api)?);
    let me = client.get_me().await?;
    log::info!(
        target: LOG_TARGET,
        "Running as @{} (id {})",
        me.username.as_deref().unwrap_or("<unknown>"),
        me.id
    );
    state.username = me.username;

    let engine = Engine::from_settings(&settings.ime)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!(target: LOG_TARGET, "Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!(target: LOG_TARGET, "Shutting down");
    };
    run_pipeline(client.clone(), client, engine, &mut state, &settings, shutdown).await;

    store.save(&state)?;
    Ok(())
}

/// Wire poller, queue, dispatcher and emitter together and run them until
/// `shutdown` completes or the poller stops.
///
/// On the way out the poller is stopped first and whatever it already queued
/// is still dispatched. Once every outbound call has finished, the final
/// cursor is written to `state.offset`.
pub async fn run_pipeline<S, O, C, F>(
    source: S,
    outbound: Arc<O>,
    converter: C,
    state: &mut BotState,
    settings: &Settings,
    shutdown: F,
) where
    S: UpdateSource,
    O: ChatOutbound,
    C: Converter,
    F: Future<Output = ()>,
{
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel();
    let (cursor_tx, cursor_rx) = watch::channel(state.offset);

    let poller = Poller::new(source, queue_tx, cursor_tx, &settings.polling);
    let poller_task = tokio::spawn(poller.run());

    let emitter = Emitter::new(outbound, &settings.emitter);
    let dispatcher = Dispatcher::new(converter, emitter, state.username.clone());

    // Shutdown is only observed between updates, never in the middle of a
    // conversion, so no engine reply is left unread.
    tokio::pin!(shutdown);
    loop {
        let update = tokio::select! {
            update = queue_rx.recv() => update,
            _ = &mut shutdown => break,
        };
        match update {
            Some(update) => dispatcher.dispatch(update).await,
            None => break,
        }
    }

    poller_task.abort();
    let _ = poller_task.await;
    queue_rx.close();
    dispatcher.run(&mut queue_rx).await;
    dispatcher.shutdown().await;

    state.offset = *cursor_rx.borrow();
    log::info!(target: LOG_TARGET, "Stopped at offset {}", state.offset);
}
