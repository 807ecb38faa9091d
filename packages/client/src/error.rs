//! Error types for the Selah sync client.

use thiserror::Error;

/// Errors raised while reading or writing the in-memory state tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A path segment does not exist in the target tree
    #[error("key '{0}' does not exist in the state tree")]
    MissingKey(String),

    /// A container would be replaced by a value of a different shape
    #[error("structure of '{0}' cannot be changed")]
    StructureChanged(String),

    /// The value has the wrong type for the field it targets
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },
}

/// Errors from the durable layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The background writer has stopped
    #[error("durable writer is closed")]
    WriterClosed,
}

/// Transport-level failures of the messaging channel.
///
/// These are never returned from channel calls; they travel to the store as
/// `socket_error` messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connecting took longer than the configured timeout
    #[error("TIMEOUT")]
    Timeout,

    /// Connection error
    #[error("connection error: {0}")]
    Connect(String),

    /// Reading from the socket failed
    #[error("read error: {0}")]
    Read(String),

    /// Writing to the socket failed
    #[error("write error: {0}")]
    Write(String),
}

impl TransportError {
    /// Timeouts are always followed by a close event, which already notifies the user.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// State tree invariant violated
    #[error(transparent)]
    State(#[from] StateError),

    /// Durable layer failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The server reported that this client sent something malformed
    #[error("Client Error: {message} (received: {received})")]
    ServerProtocol {
        message: String,
        received: serde_json::Value,
    },

    /// The action requires a joined room
    #[error("not currently in a room")]
    NotInRoom,

    /// The action refers to a room that is not in the known rooms roster
    #[error("room '{0}' is not a known room")]
    UnknownRoom(String),

    /// The dispatcher task has stopped
    #[error("store dispatcher has stopped")]
    StoreClosed,
}

impl ClientError {
    /// Returns true if this error should stop the dispatcher.
    ///
    /// A server-reported protocol error means the client logic is broken, and a
    /// storage failure means durable state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ServerProtocol { .. } | Self::Storage(_) => true,
            Self::State(_) | Self::NotInRoom | Self::UnknownRoom(_) | Self::StoreClosed => false,
        }
    }
}
