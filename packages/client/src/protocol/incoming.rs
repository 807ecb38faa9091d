//! Messages delivered to the store: server frames plus synthetic socket events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::TransportError,
    state::{RoomClients, RoomMessage, RoomSnapshot},
};

/// Payload of `client_error` / `client_confused`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    /// The frame the server rejected, if it echoed one
    #[serde(default)]
    pub received: Value,
}

/// Structured messages pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "info", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        room: RoomSnapshot,
        secret: String,
        clients: RoomClients,
        you: String,
    },
    RoomJoined {
        room: RoomSnapshot,
        clients: RoomClients,
        admin: bool,
        you: String,
    },
    RoomInvalid {
        room_id: String,
    },
    RoomState(RoomSnapshot),
    RoomClients {
        room_id: String,
        clients: RoomClients,
    },
    RoomMessage(RoomMessage),
    ClientError(ErrorInfo),
    ClientConfused(ErrorInfo),
    /// Checkout session id
    PaymentSession(String),
}

/// One clock-sync round trip, all values in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    /// Local time the probe was sent (echoed back by the server)
    pub client_start: i64,
    /// Local time the reply was received
    pub client_end: i64,
    /// Server time the probe was handled
    pub server: i64,
}

impl TimeSample {
    /// One-way latency estimate
    pub fn latency(&self) -> f64 {
        (self.client_end - self.client_start) as f64 / 2.0
    }

    /// Local clock minus server clock, assuming a symmetric path
    pub fn offset(&self) -> f64 {
        self.client_start as f64 + self.latency() - self.server as f64
    }
}

/// Everything the channel forwards to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Server(ServerMessage),
    ClientTime(TimeSample),
    SocketOpen,
    SocketClose,
    SocketError(TransportError),
    /// A frame without a recognizable type
    Unknown(Value),
}

impl Incoming {
    /// Message type name, for logging
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Server(msg) => match msg {
                ServerMessage::RoomCreated { .. } => "room_created",
                ServerMessage::RoomJoined { .. } => "room_joined",
                ServerMessage::RoomInvalid { .. } => "room_invalid",
                ServerMessage::RoomState(_) => "room_state",
                ServerMessage::RoomClients { .. } => "room_clients",
                ServerMessage::RoomMessage(_) => "room_message",
                ServerMessage::ClientError(_) => "client_error",
                ServerMessage::ClientConfused(_) => "client_confused",
                ServerMessage::PaymentSession(_) => "payment_session",
            },
            Self::ClientTime(_) => "client_time",
            Self::SocketOpen => "socket_open",
            Self::SocketClose => "socket_close",
            Self::SocketError(_) => "socket_error",
            Self::Unknown(_) => "unknown",
        }
    }
}
