//! Rooms remembered across sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default display name of a room the server has not named yet
pub const DEFAULT_ROOM_NAME: &str = "Room";

/// A room previously created or joined, keyed by room id in the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownRoom {
    pub name: String,
    /// Admin secret; present only for rooms this client administers
    pub secret: Option<String>,
    pub starred: Option<bool>,
    pub last_entered: DateTime<Utc>,
}

impl KnownRoom {
    /// Defaults for a room never seen before
    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        Self {
            name: DEFAULT_ROOM_NAME.to_string(),
            secret: None,
            starred: None,
            last_entered: now,
        }
    }

    /// Whether this client is an admin of the room
    pub fn is_admin(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether the room is starred
    pub fn is_starred(&self) -> bool {
        self.starred.unwrap_or(false)
    }

    /// Overlay the fields a change specifies, keeping the rest
    pub fn apply(mut self, change: &KnownRoomChange) -> Self {
        if let Some(name) = &change.name {
            self.name = name.clone();
        }
        if let Some(secret) = &change.secret {
            self.secret = secret.clone();
        }
        if let Some(starred) = change.starred {
            self.starred = starred;
        }
        if let Some(last_entered) = change.last_entered {
            self.last_entered = last_entered;
        }
        self
    }
}

/// Partial update of a [`KnownRoom`]; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownRoomChange {
    pub name: Option<String>,
    pub secret: Option<Option<String>>,
    pub starred: Option<Option<bool>>,
    pub last_entered: Option<DateTime<Utc>>,
}

/// A known room together with its id, as listed by the roster views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnownRoomEntry {
    pub id: String,
    #[serde(flatten)]
    pub room: KnownRoom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unspecified_fields() {
        // テスト項目: 変更に含まれないフィールドは既存の値が保持される
        // given (前提条件):
        let entered = DateTime::from_timestamp_millis(1_000).unwrap();
        let room = KnownRoom {
            name: "X".to_string(),
            secret: Some("s".to_string()),
            starred: None,
            last_entered: entered,
        };
        let change = KnownRoomChange {
            starred: Some(Some(true)),
            ..KnownRoomChange::default()
        };

        // when (操作):
        let updated = room.apply(&change);

        // then (期待する結果):
        assert_eq!(updated.name, "X");
        assert_eq!(updated.secret.as_deref(), Some("s"));
        assert!(updated.is_starred());
        assert_eq!(updated.last_entered, entered);
    }

    #[test]
    fn test_apply_can_clear_secret() {
        // テスト項目: secret は Some(None) を指定することで消去できる
        // given (前提条件):
        let now = DateTime::from_timestamp_millis(5_000).unwrap();
        let mut room = KnownRoom::with_defaults(now);
        room.secret = Some("s".to_string());
        let change = KnownRoomChange {
            secret: Some(None),
            ..KnownRoomChange::default()
        };

        // when (操作):
        let updated = room.apply(&change);

        // then (期待する結果):
        assert!(!updated.is_admin());
    }
}
