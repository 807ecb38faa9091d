//! Fire-and-forget durable writes.
//!
//! Mutations of the state tree are synchronous, but the SQLite write they
//! imply is not something a mutation should wait for. [`DurableWriter`] puts
//! each write on a bounded queue drained by a blocking worker that owns the
//! [`Database`]. Jobs are applied strictly in the order they were enqueued.

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{Database, DbValue};
use crate::{error::StorageError, state::KnownRoom};

/// One unit of work for the durable writer
#[derive(Debug)]
pub enum WriteJob {
    PutDict { key: String, value: DbValue },
    PutKnownRoom { id: String, room: KnownRoom },
    DeleteKnownRoom { id: String },
    /// Resolves once every job enqueued before it has been applied
    Flush(oneshot::Sender<()>),
}

impl WriteJob {
    fn describe(&self) -> String {
        match self {
            Self::PutDict { key, .. } => format!("put dict '{}'", key),
            Self::PutKnownRoom { id, .. } => format!("put known room '{}'", id),
            Self::DeleteKnownRoom { id } => format!("delete known room '{}'", id),
            Self::Flush(_) => "flush".to_string(),
        }
    }
}

/// Durable write-through seam used by the store.
///
/// Writes return immediately; callers only wait in [`Persistence::flush`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Persist a preference value under an already-joined key
    fn put_dict(&self, key: String, value: DbValue);

    /// Persist a known room
    fn put_known_room(&self, id: String, room: KnownRoom);

    /// Forget a known room
    fn delete_known_room(&self, id: String);

    /// Wait until all previously issued writes are durable
    async fn flush(&self) -> Result<(), StorageError>;
}

/// Background writer owning the database
pub struct DurableWriter {
    tx: mpsc::Sender<WriteJob>,
    worker: JoinHandle<()>,
}

impl DurableWriter {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(db: Database, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WriteJob>(capacity.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            while let Some(job) = rx.blocking_recv() {
                apply(&db, job);
            }
            tracing::debug!("Durable writer stopped");
        });

        Self { tx, worker }
    }

    fn enqueue(&self, job: WriteJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!("Durable write queue full, dropping {}", job.describe());
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!("Durable writer closed, dropping {}", job.describe());
            }
        }
    }

    /// Flush pending writes and stop the worker
    pub async fn shutdown(self) -> Result<(), StorageError> {
        self.flush().await?;
        let Self { tx, worker } = self;
        // The worker exits once its queue is closed and drained
        drop(tx);
        worker.await.map_err(|_| StorageError::WriterClosed)
    }
}

#[async_trait]
impl Persistence for DurableWriter {
    fn put_dict(&self, key: String, value: DbValue) {
        self.enqueue(WriteJob::PutDict { key, value });
    }

    fn put_known_room(&self, id: String, room: KnownRoom) {
        self.enqueue(WriteJob::PutKnownRoom { id, room });
    }

    fn delete_known_room(&self, id: String) {
        self.enqueue(WriteJob::DeleteKnownRoom { id });
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let (done_tx, done_rx) = oneshot::channel();
        // Waits for queue space so the marker is never dropped
        self.tx
            .send(WriteJob::Flush(done_tx))
            .await
            .map_err(|_| StorageError::WriterClosed)?;
        done_rx.await.map_err(|_| StorageError::WriterClosed)
    }
}

fn apply(db: &Database, job: WriteJob) {
    let description = job.describe();
    let result = match job {
        WriteJob::PutDict { key, value } => db.put_dict(&key, &value),
        WriteJob::PutKnownRoom { id, room } => db.put_known_room(&id, &room),
        WriteJob::DeleteKnownRoom { id } => db.delete_known_room(&id),
        WriteJob::Flush(done) => {
            let _ = done.send(());
            return;
        }
    };

    match result {
        Ok(()) => tracing::debug!("Durable write applied: {}", description),
        Err(e) => tracing::error!("Durable write failed ({}): {}", description, e),
    }
}
