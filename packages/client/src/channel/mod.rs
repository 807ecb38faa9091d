//! Resilient messaging channel to the sync server.
//!
//! A [`Channel`] is a cheap, cloneable handle. Sending never fails: messages
//! submitted while disconnected wait in the outbox and are flushed in order
//! when the connection (re)opens. Incoming frames, clock-sync replies and
//! socket lifecycle events are forwarded as [`Incoming`] values on the events
//! channel handed to [`Channel::start`].

mod backoff;
mod connection;
mod outbox;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use selah_shared::time::Clock;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::ClientConfig,
    protocol::{Incoming, Outgoing, frame},
};

pub use backoff::reconnect_delay;
pub use outbox::ConnectionStatus;

use outbox::{FrameSender, Outbox};

/// Handle to the messaging channel
#[derive(Clone)]
pub struct Channel {
    outbox: Arc<Mutex<Outbox>>,
    clock: Arc<dyn Clock>,
}

impl Channel {
    /// Create a detached channel; messages queue until [`Channel::start`] connects it
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            outbox: Arc::new(Mutex::new(Outbox::new())),
            clock,
        }
    }

    /// Start the connection loop.
    ///
    /// The loop reconnects forever and stops once the `events` receiver is
    /// dropped, or when the returned task is aborted.
    pub fn start(
        &self,
        config: ClientConfig,
        events: mpsc::UnboundedSender<Incoming>,
    ) -> JoinHandle<()> {
        tokio::spawn(connection::run(self.clone(), config, events))
    }

    /// Send a message, or queue it until the connection is open
    pub fn send(&self, msg: Outgoing) {
        self.lock().submit(msg);
    }

    /// Send a clock-sync probe stamped with the current time.
    ///
    /// Probes are never queued: a stale timestamp would poison the offset
    /// estimate. Returns whether the probe was sent.
    pub fn probe(&self) -> bool {
        let body = frame::probe(self.clock.now_millis());
        self.lock().probe(body)
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.lock().status()
    }

    /// Number of messages waiting for an open connection
    pub fn queued(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.lock().set_status(status);
    }

    /// Mark the connection open and flush the queue in order.
    ///
    /// The lock is released between messages; anything sent meanwhile is
    /// appended to the queue and flushed by the same pass.
    pub(crate) fn open(&self, writer: FrameSender) {
        self.lock().attach(writer);
        let mut flushed = 0;
        while self.lock().drain_one() {
            flushed += 1;
        }
        if flushed > 0 {
            tracing::info!("Flushed {} queued message(s)", flushed);
        }
    }

    pub(crate) fn close(&self) {
        self.lock().detach();
    }

    fn lock(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
