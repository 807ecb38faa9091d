//! Client-side synchronization core for Selah rooms.
//!
//! The crate is made of two tightly coupled halves:
//!
//! - [`channel`]: one resilient WebSocket connection with an outbound queue,
//!   automatic reconnection and a clock-offset probe protocol.
//! - [`store`]: the application state tree, driven by messages from the
//!   channel, with durable fields written through to [`db`].
//!
//! External collaborators (the terminal UI in [`cli`], or any other front end)
//! only ever see a [`store::StoreHandle`]: they dispatch [`store::Action`]s
//! and watch read-only [`state::AppState`] snapshots.

pub mod channel;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod protocol;
pub mod state;
pub mod store;

pub use config::{AppFlavor, ClientConfig};
pub use error::{ClientError, StateError, StorageError, TransportError};
pub use store::{Action, Client, StoreHandle, connect};
