//! Message formatting utilities for terminal display.

use std::collections::BTreeMap;

use selah_shared::time::millis_to_rfc3339;

use crate::state::{KnownRoomEntry, RoomClients, RoomMessage};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";

/// Message formatter for terminal display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the banner shown on entering a room
    ///
    /// # Arguments
    ///
    /// * `room_id` - Id of the room (what others use to join)
    /// * `room_name` - Display name of the room
    /// * `admin` - Whether this client administers the room
    pub fn format_room_entered(room_id: &str, room_name: &str, admin: bool) -> String {
        let role = if admin { "admin" } else { "guest" };
        format!(
            "\n\n{}\nEntered '{}' as {} (id: {})\n{}\n",
            RULE, room_name, role, room_id, RULE
        )
    }

    /// Format the banner shown on leaving a room
    pub fn format_room_left(room_name: &str) -> String {
        format!("\n- Left '{}'\n", room_name)
    }

    /// Format the participant list
    ///
    /// # Arguments
    ///
    /// * `clients` - Participants of the current room
    /// * `names` - Disambiguated display names keyed by socket
    /// * `own_sockets` - Sockets belonging to this client (marked as "me")
    pub fn format_participants(
        clients: &RoomClients,
        names: &BTreeMap<String, String>,
        own_sockets: &[String],
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\nParticipants ({}):\n", clients.total));

        if clients.hidden {
            output.push_str("(Hidden by the room admins)\n");
            return output;
        }

        for client in clients.all() {
            let name = names
                .get(&client.socket)
                .map(String::as_str)
                .unwrap_or(client.socket.as_str());
            let me = if own_sockets.contains(&client.socket) {
                " (me)"
            } else {
                ""
            };
            let admin = if client.admin { " [admin]" } else { "" };
            output.push_str(&format!("  {}{}{}\n", name, me, admin));
        }
        if clients.limited {
            output.push_str("  ...\n");
        }
        output
    }

    /// Format a chat message relayed by the server
    ///
    /// # Arguments
    ///
    /// * `from` - Display name of the sender
    /// * `message` - The message (HTML body, timestamp in server seconds)
    pub fn format_chat_message(from: &str, message: &RoomMessage) -> String {
        format!(
            "\n{}\n@{}: {}\nsent at {}\n{}\n",
            THIN_RULE,
            from,
            html_to_text(&message.html),
            seconds_to_rfc3339(message.timestamp),
            THIN_RULE
        )
    }

    /// Format a locally generated system message
    pub fn format_system_message(message: &RoomMessage) -> String {
        let mut output = format!("\n* {}\n", html_to_text(&message.html));
        if let Some(button) = &message.button {
            output.push_str(&format!("  [{}]\n", button.text));
        }
        output
    }

    /// Format a transient notification
    pub fn format_notification(text: &str) -> String {
        format!("\n! {}\n", text)
    }

    /// Format the known rooms roster, most recent first
    pub fn format_known_rooms(rooms: &[KnownRoomEntry]) -> String {
        if rooms.is_empty() {
            return "\n(No known rooms)\n".to_string();
        }
        let mut output = String::from("\nKnown rooms:\n");
        for entry in rooms {
            let star = if entry.room.is_starred() { "*" } else { " " };
            let role = if entry.room.is_admin() { "admin" } else { "guest" };
            output.push_str(&format!(
                " {} {} ({}, {}) - last entered {}\n",
                star,
                entry.room.name,
                entry.id,
                role,
                entry.room.last_entered.to_rfc3339()
            ));
        }
        output
    }
}

fn seconds_to_rfc3339(seconds: f64) -> String {
    millis_to_rfc3339((seconds * 1000.0).round() as i64)
}

/// Render message HTML as plain text: list items on their own lines, other tags dropped
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            text.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim().to_ascii_lowercase();
        match tag.split_whitespace().next().unwrap_or_default() {
            "li" => text.push_str("\n - "),
            "br" | "br/" | "/ol" | "/ul" => text.push('\n'),
            _ => {}
        }
        rest = &rest[open + close + 1..];
    }
    text.push_str(rest);

    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
