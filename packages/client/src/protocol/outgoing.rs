//! Messages sent by the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Room permissions that can be restricted to admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Dj,
    SeeClients,
    Chat,
}

/// Payload of the `room_admins_only_<permission>` messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminsOnly {
    pub room_id: String,
    pub room_admins_only: bool,
}

/// Every message type the client sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "info", rename_all = "snake_case")]
pub enum Outgoing {
    ClientJoin {
        room_id: String,
        room_secret: Option<String>,
        client_name: Option<String>,
    },
    ClientLeave {
        room_id: String,
    },
    ClientName {
        client_name: String,
    },
    ClientSynced {
        client_synced: Option<i64>,
    },
    ClientFeedback {
        client_feedback: String,
        client_email: Option<String>,
        client_user_agent: String,
    },
    RoomCreate {
        client_name: Option<String>,
        room_id_copy: Option<String>,
        room_name: Option<String>,
    },
    RoomName {
        room_id: String,
        room_name: String,
    },
    RoomAdminsOnlyDj(AdminsOnly),
    RoomAdminsOnlySeeClients(AdminsOnly),
    RoomAdminsOnlyChat(AdminsOnly),
    RoomMessage {
        room_id: String,
        room_message: String,
    },
    RoomMediaAdd {
        room_id: String,
        media_name: String,
        media_type: String,
        media_content: Value,
    },
    RoomMediaRearrange {
        room_id: String,
        media_id: String,
        media_id_after: Option<String>,
    },
    RoomMediaLoad {
        room_id: String,
        media_id: String,
    },
    RoomMediaPlay {
        room_id: String,
        room_start: f64,
    },
    RoomMediaPause {
        room_id: String,
        room_paused: f64,
    },
    RoomMediaRemove {
        room_id: String,
        media_id: String,
    },
    RoomDelete {
        room_id: String,
        room_secret: Option<String>,
    },
    PaymentSession {
        payment_amount: f64,
        payment_return_url: String,
    },
}

impl Outgoing {
    /// Build the `room_admins_only_<permission>` message for a permission
    pub fn admins_only(permission: Permission, room_id: String, value: bool) -> Self {
        let info = AdminsOnly {
            room_id,
            room_admins_only: value,
        };
        match permission {
            Permission::Dj => Self::RoomAdminsOnlyDj(info),
            Permission::SeeClients => Self::RoomAdminsOnlySeeClients(info),
            Permission::Chat => Self::RoomAdminsOnlyChat(info),
        }
    }

    /// Wire name of the message type
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::ClientJoin { .. } => "client_join",
            Self::ClientLeave { .. } => "client_leave",
            Self::ClientName { .. } => "client_name",
            Self::ClientSynced { .. } => "client_synced",
            Self::ClientFeedback { .. } => "client_feedback",
            Self::RoomCreate { .. } => "room_create",
            Self::RoomName { .. } => "room_name",
            Self::RoomAdminsOnlyDj(_) => "room_admins_only_dj",
            Self::RoomAdminsOnlySeeClients(_) => "room_admins_only_see_clients",
            Self::RoomAdminsOnlyChat(_) => "room_admins_only_chat",
            Self::RoomMessage { .. } => "room_message",
            Self::RoomMediaAdd { .. } => "room_media_add",
            Self::RoomMediaRearrange { .. } => "room_media_rearrange",
            Self::RoomMediaLoad { .. } => "room_media_load",
            Self::RoomMediaPlay { .. } => "room_media_play",
            Self::RoomMediaPause { .. } => "room_media_pause",
            Self::RoomMediaRemove { .. } => "room_media_remove",
            Self::RoomDelete { .. } => "room_delete",
            Self::PaymentSession { .. } => "payment_session",
        }
    }
}
