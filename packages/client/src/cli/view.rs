//! Turns successive state snapshots into lines of terminal output.

use crate::state::{AppState, RoomClients};

use super::formatter::MessageFormatter;

/// What has already been printed
#[derive(Debug, Default)]
pub struct ScreenTracker {
    room: Option<(String, String)>,
    clients: Option<RoomClients>,
    messages_shown: usize,
    notification: Option<String>,
}

impl ScreenTracker {
    /// Output for everything that changed since the previous snapshot
    pub fn update(&mut self, state: &AppState) -> Vec<String> {
        let mut output = Vec::new();

        let room = state
            .tmp
            .room
            .as_ref()
            .map(|room| (room.id.clone(), room.name.clone()));
        if room.as_ref().map(|(id, _)| id) != self.room.as_ref().map(|(id, _)| id) {
            if let Some((_, name)) = &self.room {
                output.push(MessageFormatter::format_room_left(name));
            }
            if let Some((id, name)) = &room {
                let admin = state.tmp.room_admin.unwrap_or(false);
                output.push(MessageFormatter::format_room_entered(id, name, admin));
            }
            self.clients = None;
            self.messages_shown = 0;
        }
        self.room = room;

        if state.tmp.room_clients != self.clients {
            if let Some(clients) = &state.tmp.room_clients {
                output.push(MessageFormatter::format_participants(
                    clients,
                    &state.client_names(),
                    &state.tmp.own_sockets,
                ));
            }
            self.clients = state.tmp.room_clients.clone();
        }

        // The log is cleared when entering a room
        if state.tmp.room_messages.len() < self.messages_shown {
            self.messages_shown = 0;
        }
        let names = state.client_names();
        for message in &state.tmp.room_messages[self.messages_shown..] {
            let line = match &message.sender {
                None => MessageFormatter::format_system_message(message),
                Some(sender) => {
                    let name = names
                        .get(sender)
                        .or(message.name.as_ref())
                        .map(String::as_str)
                        .unwrap_or(sender.as_str());
                    MessageFormatter::format_chat_message(name, message)
                }
            };
            output.push(line);
        }
        self.messages_shown = state.tmp.room_messages.len();

        let notification = state
            .tmp
            .snackbar
            .then(|| state.tmp.snackbar_text.clone())
            .flatten();
        if let Some(text) = &notification
            && notification != self.notification
        {
            output.push(MessageFormatter::format_notification(text));
        }
        self.notification = notification;

        output
    }
}
