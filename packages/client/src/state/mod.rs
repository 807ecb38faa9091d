//! The application state tree.
//!
//! The shape of the tree is fixed at compile time. Durable fields live in
//! [`Preferences`] and [`AppState::known_rooms`]; everything under
//! [`TmpState`] is session-only.
//!
//! The generic, path-addressed entry points (`set`, `tmp_set`) go through a
//! JSON view of the typed structs, so an unknown path fails with
//! [`StateError::MissingKey`] and an ill-typed value with
//! [`StateError::InvalidValue`] instead of silently growing the tree.

mod known_rooms;
mod room;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::StateError,
    merge::{nested_set, nested_update},
};

pub use known_rooms::{KnownRoom, KnownRoomChange, KnownRoomEntry};
pub use room::{
    MessageButton, Playback, RoomClient, RoomClients, RoomMedia, RoomMessage, RoomSnapshot,
};

/// Durable preferences, one `dict` row per field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub dark: bool,
    pub name: Option<String>,
    /// Voices usually play in the background, so default to max volume
    pub volume: u32,
    pub debug: bool,
    pub show_splash_welcome: bool,
    pub show_install_banner: bool,
    pub offline_opens: u32,
    /// `None` = one free add, `false` = must pay, `true` = paid
    pub singit_paid: Option<bool>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark: true,
            name: None,
            volume: 100,
            debug: false,
            show_splash_welcome: true,
            show_install_banner: true,
            offline_opens: 0,
            singit_paid: None,
        }
    }
}

/// Volatile state, never persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmpState {
    // Viewport dimensions (excluding scrollbars)
    pub viewport_width: u32,
    pub viewport_height: u32,

    // Notifications and dialogs
    pub snackbar: bool,
    pub snackbar_text: Option<String>,
    pub dialog: Option<String>,

    // Clock sync (milliseconds)
    pub time_diff: f64,
    pub time_diff_latency: Option<f64>,
    pub time_diff_checks: u32,

    // Current room
    pub room: Option<RoomSnapshot>,
    pub room_clients: Option<RoomClients>,
    pub room_admin: Option<bool>,
    pub room_synced: Option<i64>,
    pub room_messages: Vec<RoomMessage>,
    pub room_messages_unread: u32,

    // Kept across rooms
    pub invalid_rooms: Vec<String>,
    /// Only filled after entering a room
    pub own_sockets: Vec<String>,
    /// Checkout session requested by `payment_session`, for the UI to open
    pub payment_session: Option<String>,
}

/// Root of the state tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub prefs: Preferences,
    pub known_rooms: BTreeMap<String, KnownRoom>,
    pub tmp: TmpState,
}

impl AppState {
    /// Id of the room currently joined
    pub fn current_room_id(&self) -> Option<&str> {
        self.tmp.room.as_ref().map(|room| room.id.as_str())
    }

    /// Whether `room_id` is the room currently joined
    pub fn is_current_room(&self, room_id: &str) -> bool {
        self.current_room_id() == Some(room_id)
    }

    /// Reset all room-scoped volatile state
    pub fn clear_room(&mut self) {
        self.tmp.room = None;
        self.tmp.room_clients = None;
        self.tmp.room_admin = None;
        self.tmp.room_synced = None;
        self.tmp.room_messages.clear();
        self.tmp.room_messages_unread = 0;
    }
}

/// Set a value at `keys` inside a typed record.
pub(crate) fn set_field<T>(target: &mut T, keys: &[&str], value: Value) -> Result<(), StateError>
where
    T: Serialize + DeserializeOwned,
{
    let path = keys.join(".");
    let mut tree = to_tree(target, &path)?;
    nested_set(&mut tree, keys, value)?;
    *target = from_tree(tree, &path)?;
    Ok(())
}

/// Set a top-level field of a typed record, deep-merging when both the old and
/// the new value are records.
pub(crate) fn merge_or_replace_field<T>(
    target: &mut T,
    key: &str,
    value: Value,
) -> Result<(), StateError>
where
    T: Serialize + DeserializeOwned,
{
    let mut tree = to_tree(target, key)?;
    let slot = tree
        .get_mut(key)
        .ok_or_else(|| StateError::MissingKey(key.to_string()))?;

    // A null on either side still allows replacement
    if slot.is_object() && value.is_object() {
        nested_update(slot, &value)?;
    } else {
        *slot = value;
    }

    *target = from_tree(tree, key)?;
    Ok(())
}

fn to_tree<T: Serialize>(target: &T, path: &str) -> Result<Value, StateError> {
    serde_json::to_value(target).map_err(|e| StateError::InvalidValue {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn from_tree<T: DeserializeOwned>(tree: Value, path: &str) -> Result<T, StateError> {
    serde_json::from_value(tree).map_err(|e| StateError::InvalidValue {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
