//! Outbound queue and connection status.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::protocol::{Outgoing, frame};

/// Sender half feeding the socket writer task
pub(crate) type FrameSender = mpsc::UnboundedSender<String>;

/// Lifecycle of the underlying connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never connected
    Idle,
    Connecting,
    Open,
    /// Lost; a reconnect is pending
    Closed,
}

/// Messages waiting for an open connection.
///
/// While a connection is open and the queue has been fully drained, messages
/// bypass the queue. Everything else is appended, so messages always leave in
/// submission order.
#[derive(Debug)]
pub(crate) struct Outbox {
    status: ConnectionStatus,
    queue: VecDeque<Outgoing>,
    writer: Option<FrameSender>,
    draining: bool,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self {
            status: ConnectionStatus::Idle,
            queue: VecDeque::new(),
            writer: None,
            draining: false,
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Transmit now if the path is clear, otherwise queue
    pub(crate) fn submit(&mut self, msg: Outgoing) {
        if self.is_clear() {
            if let Err(msg) = self.transmit(msg) {
                self.queue.push_back(msg);
            }
        } else {
            tracing::debug!("Queued {} ({} waiting)", msg.message_type(), self.queue.len() + 1);
            self.queue.push_back(msg);
        }
    }

    /// Mark the connection open and start draining
    pub(crate) fn attach(&mut self, writer: FrameSender) {
        self.writer = Some(writer);
        self.status = ConnectionStatus::Open;
        self.draining = true;
    }

    /// Transmit the head of the queue.
    ///
    /// Returns `false` once the queue is empty (the drain is complete) or the
    /// writer is gone (the drain resumes on the next attach).
    pub(crate) fn drain_one(&mut self) -> bool {
        if !self.draining {
            return false;
        }
        let Some(msg) = self.queue.pop_front() else {
            self.draining = false;
            return false;
        };
        match self.transmit(msg) {
            Ok(()) => true,
            Err(msg) => {
                self.queue.push_front(msg);
                self.draining = false;
                false
            }
        }
    }

    /// Forget the writer of a lost connection
    pub(crate) fn detach(&mut self) {
        self.writer = None;
        self.draining = false;
        self.status = ConnectionStatus::Closed;
    }

    /// Send a raw probe frame, bypassing the queue. No-op unless open.
    pub(crate) fn probe(&self, body: String) -> bool {
        match (&self.writer, self.status) {
            (Some(writer), ConnectionStatus::Open) => writer.send(body).is_ok(),
            _ => false,
        }
    }

    fn is_clear(&self) -> bool {
        self.status == ConnectionStatus::Open && !self.draining && self.writer.is_some()
    }

    fn transmit(&self, msg: Outgoing) -> Result<(), Outgoing> {
        let Some(writer) = &self.writer else {
            return Err(msg);
        };
        let text = match frame::encode(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", msg.message_type(), e);
                return Ok(());
            }
        };
        match writer.send(text) {
            Ok(()) => {
                tracing::debug!("SENT {}", msg.message_type());
                Ok(())
            }
            Err(_) => Err(msg),
        }
    }
}
