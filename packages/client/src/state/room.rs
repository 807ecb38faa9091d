//! Volatile room state pushed by the server.

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

/// Snapshot of a room as broadcast by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: String,
    pub name: String,
    pub media: Vec<RoomMedia>,
    /// Index into `media` of the loaded item
    #[serde(default, deserialize_with = "optional_whole_number")]
    pub loaded: Option<usize>,
    /// Server time (seconds) at which playback of the loaded item started
    pub start: Option<f64>,
    /// Position (seconds) at which playback was paused
    pub paused: Option<f64>,
    pub admins_only_dj: bool,
    pub admins_only_see_clients: bool,
    pub admins_only_chat: bool,
}

/// Playback status derived from `start` / `paused`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Playback {
    /// Nothing loaded, or loaded but never started
    Idle,
    Playing { start: f64 },
    Paused { at: f64 },
}

impl RoomSnapshot {
    /// Current playback status.
    ///
    /// The server keeps `start` and `paused` mutually exclusive; `start` wins
    /// if both are ever present.
    pub fn playback(&self) -> Playback {
        match (self.start, self.paused) {
            (Some(start), _) => Playback::Playing { start },
            (None, Some(at)) => Playback::Paused { at },
            (None, None) => Playback::Idle,
        }
    }

    /// The item after the loaded one, if any
    pub fn next_media(&self) -> Option<&RoomMedia> {
        let next = self.loaded.map_or(0, |loaded| loaded + 1);
        self.media.get(next)
    }
}

/// One playlist item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMedia {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload (e.g. `{"id": "<youtube id>"}`)
    pub content: Value,
}

/// Participants of the current room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomClients {
    pub admins: Vec<RoomClient>,
    pub guests: Vec<RoomClient>,
    /// Participants are hidden from guests by an admins-only permission
    pub hidden: bool,
    /// The lists were truncated by the server
    pub limited: bool,
    #[serde(deserialize_with = "whole_number")]
    pub total: u32,
}

impl RoomClients {
    /// Admins followed by guests
    pub fn all(&self) -> impl Iterator<Item = &RoomClient> {
        self.admins.iter().chain(self.guests.iter())
    }
}

/// One connected participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomClient {
    pub socket: String,
    pub name: Option<String>,
    pub admin: bool,
    /// Playback drift in milliseconds
    #[serde(default, deserialize_with = "optional_whole_number")]
    pub synced: Option<i64>,
}

/// A chat message, either relayed by the server or synthesized locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: String,
    pub room_id: String,
    /// Sender socket, `None` for system messages
    pub sender: Option<String>,
    pub name: Option<String>,
    pub html: String,
    /// Server time in seconds
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MessageButton>,
}

/// Call-to-action attached to a system message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageButton {
    /// Name of the action to dispatch when pressed
    pub action: String,
    pub text: String,
}

/// Integral field that the server may send as a float (`0` or `0.0`).
///
/// The server's storage hands every number back as a float, so indexes and
/// counters arrive with a `.0` suffix. A fractional part is still an error.
fn whole_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(D::Error::custom(format!(
            "expected a whole number, got {}",
            value
        )));
    }
    T::try_from(value as i64)
        .map_err(|_| D::Error::custom(format!("{} is out of range", value)))
}

fn optional_whole_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    #[derive(Deserialize)]
    struct Whole(#[serde(deserialize_with = "whole_number")] i64);

    match Option::<Whole>::deserialize(deserializer)? {
        Some(Whole(value)) => T::try_from(value)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("{} is out of range", value))),
        None => Ok(None),
    }
}
