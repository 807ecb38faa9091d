//! The state store and dispatcher.
//!
//! [`Store`] owns the [`AppState`] tree and is the only thing that mutates
//! it. It is driven from two sides: [`Action`]s issued by collaborators, and
//! [`Incoming`](crate::protocol::Incoming) messages forwarded by the channel.
//! Both are processed one at a time by the dispatcher task in [`runtime`].

mod actions;
mod handlers;
mod messages;
mod runtime;
mod views;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use selah_shared::time::Clock;
use serde_json::Value;

use crate::{
    channel::Channel,
    config::ClientConfig,
    db::{DbValue, KEY_SEPARATOR, Persistence, dict_key},
    error::{ClientError, StateError},
    protocol::Outgoing,
    state::{self, AppState, KnownRoom},
};

pub use actions::Action;
pub use runtime::{Client, StoreHandle, connect, connect_with_clock, spawn_store};

/// A notification waiting for the previous one to clear
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeferredNotification {
    pub delay: Duration,
    pub text: String,
}

/// Central state container
pub struct Store {
    state: AppState,
    channel: Channel,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    config: ClientConfig,
    deferred: Vec<DeferredNotification>,
}

impl Store {
    /// Build the initial state from defaults plus whatever the durable layer holds.
    ///
    /// Stored preferences whose path no longer exists are obsolete: they are
    /// logged and skipped. Any other invalid stored value is an error.
    pub fn hydrate(
        config: ClientConfig,
        channel: Channel,
        persistence: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
        dict: Vec<(String, DbValue)>,
        known_rooms: BTreeMap<String, KnownRoom>,
    ) -> Result<Self, ClientError> {
        let mut state = AppState {
            known_rooms,
            ..AppState::default()
        };

        for (key, value) in dict {
            let path: Vec<&str> = key.split(KEY_SEPARATOR).collect();
            match state::set_field(&mut state.prefs, &path, value.to_json()) {
                Ok(()) => {}
                Err(StateError::MissingKey(segment)) => {
                    tracing::warn!("Discarding obsolete stored key '{}' ({})", key, segment);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(
            "Hydrated state with {} known room(s)",
            state.known_rooms.len()
        );

        Ok(Self {
            state,
            channel,
            persistence,
            clock,
            config,
            deferred: Vec::new(),
        })
    }

    /// Read-only view of the state tree
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Estimated server time in seconds
    pub fn server_time(&self) -> f64 {
        self.state.server_time(self.clock.now_millis())
    }

    /// Set a durable preference and write it through to the `dict` table
    pub fn set(&mut self, path: &[&str], value: DbValue) -> Result<(), StateError> {
        state::set_field(&mut self.state.prefs, path, value.to_json())?;
        self.persistence.put_dict(dict_key(path), value);
        Ok(())
    }

    /// Set a volatile field, deep-merging when both old and new values are records
    pub fn tmp_set(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        state::merge_or_replace_field(&mut self.state.tmp, key, value)
    }

    /// Insert or replace a known room, writing through
    pub fn known_rooms_set(&mut self, room_id: String, room: KnownRoom) {
        self.state.known_rooms.insert(room_id.clone(), room.clone());
        self.persistence.put_known_room(room_id, room);
    }

    /// Forget a known room, writing through
    pub fn known_rooms_remove(&mut self, room_id: &str) {
        if self.state.known_rooms.remove(room_id).is_some() {
            self.persistence.delete_known_room(room_id.to_string());
        }
    }

    /// Show a transient notification.
    ///
    /// Only one is visible at a time: if another is showing it is hidden, and
    /// the new one is revealed after `notification_delay`.
    pub fn show_notification(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.state.tmp.snackbar {
            self.state.tmp.snackbar = false;
            self.deferred.push(DeferredNotification {
                delay: self.config.notification_delay,
                text,
            });
        } else {
            self.reveal_notification(text);
        }
    }

    pub(crate) fn reveal_notification(&mut self, text: String) {
        self.state.tmp.snackbar_text = Some(text);
        self.state.tmp.snackbar = true;
    }

    pub(crate) fn take_deferred(&mut self) -> Vec<DeferredNotification> {
        std::mem::take(&mut self.deferred)
    }

    fn send(&self, msg: Outgoing) {
        self.channel.send(msg);
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    fn room_id(&self) -> Result<String, ClientError> {
        self.state
            .current_room_id()
            .map(str::to_string)
            .ok_or(ClientError::NotInRoom)
    }
}
