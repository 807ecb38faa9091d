//! Wire protocol between the client and the sync server.
//!
//! Structured frames are JSON objects `{"type": ..., "info": ...}` in both
//! directions. Clock-sync probes use bare decimal timestamps instead, so the
//! measurement is not skewed by envelope encoding.

pub mod frame;
mod incoming;
mod outgoing;

pub use incoming::{ErrorInfo, Incoming, ServerMessage, TimeSample};
pub use outgoing::{Outgoing, Permission};
