//! Dispatcher task and the handle collaborators use to talk to it.

use std::sync::Arc;

use selah_shared::time::{Clock, SystemClock};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use super::{Action, DeferredNotification, Store};
use crate::{
    channel::{Channel, ConnectionStatus},
    config::ClientConfig,
    db::{Database, DurableWriter, Persistence},
    error::ClientError,
    protocol::Incoming,
    state::AppState,
};

enum Command {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    RevealNotification(String),
}

/// Cloneable handle to a running store
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Arc<AppState>>,
}

impl StoreHandle {
    /// Run an action and wait for it to complete
    pub async fn dispatch(&self, action: Action) -> Result<(), ClientError> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Dispatch { action, reply })
            .map_err(|_| ClientError::StoreClosed)?;
        result.await.map_err(|_| ClientError::StoreClosed)?
    }

    /// Receiver of a fresh snapshot after every processed action or message
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.clone()
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Arc<AppState> {
        self.state.borrow().clone()
    }
}

/// Start the dispatcher task for `store`, fed by channel `events`
pub fn spawn_store(
    store: Store,
    events: mpsc::UnboundedReceiver<Incoming>,
) -> (StoreHandle, JoinHandle<Result<(), ClientError>>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(Arc::new(store.state().clone()));
    let deferred_tx = commands_tx.downgrade();

    let task = tokio::spawn(run(store, commands_rx, deferred_tx, events, state_tx));
    let handle = StoreHandle {
        commands: commands_tx,
        state: state_rx,
    };
    (handle, task)
}

async fn run(
    mut store: Store,
    mut commands: mpsc::UnboundedReceiver<Command>,
    deferred_tx: mpsc::WeakUnboundedSender<Command>,
    mut events: mpsc::UnboundedReceiver<Incoming>,
    state_tx: watch::Sender<Arc<AppState>>,
) -> Result<(), ClientError> {
    let mut events_open = true;

    loop {
        let mut pending_reply = None;

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Dispatch { action, reply }) => {
                    let result = store.dispatch(action);
                    if let Err(e) = &result {
                        tracing::warn!("Action failed: {}", e);
                    }
                    pending_reply = Some((reply, result));
                }
                Some(Command::RevealNotification(text)) => store.reveal_notification(text),
                None => {
                    tracing::debug!("All store handles dropped, stopping dispatcher");
                    return Ok(());
                }
            },
            incoming = events.recv(), if events_open => match incoming {
                Some(incoming) => {
                    if let Err(e) = store.handle(incoming) {
                        if e.is_fatal() {
                            tracing::error!("Stopping dispatcher: {}", e);
                            state_tx.send_replace(Arc::new(store.state().clone()));
                            return Err(e);
                        }
                        tracing::warn!("Failed to handle message: {}", e);
                    }
                }
                None => {
                    tracing::debug!("Channel stopped delivering events");
                    events_open = false;
                }
            },
        }

        for notification in store.take_deferred() {
            schedule(notification, deferred_tx.clone());
        }
        state_tx.send_replace(Arc::new(store.state().clone()));

        // Replied after publishing, so the caller sees its own effects
        if let Some((reply, result)) = pending_reply {
            reply.send(result).ok();
        }
    }
}

/// Reveal a notification later without blocking the dispatcher
fn schedule(notification: DeferredNotification, commands: mpsc::WeakUnboundedSender<Command>) {
    tokio::spawn(async move {
        tokio::time::sleep(notification.delay).await;
        if let Some(commands) = commands.upgrade() {
            commands
                .send(Command::RevealNotification(notification.text))
                .ok();
        }
    });
}

/// A running client: database, durable writer, channel and dispatcher
pub struct Client {
    handle: StoreHandle,
    channel: Channel,
    writer: Arc<DurableWriter>,
    channel_task: JoinHandle<()>,
    store_task: JoinHandle<Result<(), ClientError>>,
}

impl Client {
    /// Handle for dispatching actions and watching state
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// Status of the underlying connection
    pub fn connection_status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    /// Whether the dispatcher has stopped (after a fatal error)
    pub fn is_stopped(&self) -> bool {
        self.store_task.is_finished()
    }

    /// Stop the channel and dispatcher, then flush pending durable writes.
    ///
    /// Returns the fatal error that stopped the dispatcher, if any.
    pub async fn shutdown(self) -> Result<(), ClientError> {
        self.channel_task.abort();
        self.channel_task.await.ok();
        self.channel.close();

        self.store_task.abort();
        let outcome = match self.store_task.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        };

        drop(self.handle);
        match Arc::try_unwrap(self.writer) {
            Ok(writer) => writer.shutdown().await?,
            Err(writer) => writer.flush().await?,
        }

        tracing::info!("Client shut down");
        outcome
    }
}

/// Open the database, restore durable state and connect to the server
pub fn connect(config: ClientConfig) -> Result<Client, ClientError> {
    connect_with_clock(config, Arc::new(SystemClock))
}

/// [`connect`] with an explicit clock
pub fn connect_with_clock(
    config: ClientConfig,
    clock: Arc<dyn Clock>,
) -> Result<Client, ClientError> {
    let db = match &config.db_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    let dict = db.get_all_dict()?;
    let known_rooms = db.get_all_known_rooms()?;
    let writer = Arc::new(DurableWriter::spawn(db, config.write_queue_capacity));

    let channel = Channel::new(clock.clone());
    let persistence: Arc<dyn Persistence> = writer.clone();
    let store = Store::hydrate(
        config.clone(),
        channel.clone(),
        persistence,
        clock,
        dict,
        known_rooms,
    )?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (handle, store_task) = spawn_store(store, events_rx);
    let channel_task = channel.start(config, events_tx);

    Ok(Client {
        handle,
        channel,
        writer,
        channel_task,
        store_task,
    })
}
