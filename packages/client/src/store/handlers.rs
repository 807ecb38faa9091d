//! Handlers for messages arriving from the channel.

use super::{Store, messages};
use crate::{
    error::{ClientError, TransportError},
    protocol::{ErrorInfo, Incoming, ServerMessage, TimeSample},
    state::{KnownRoomChange, RoomClients, RoomMessage, RoomSnapshot},
};

impl Store {
    /// Reconcile state with one incoming message.
    ///
    /// Room-scoped messages for any room other than the current one are
    /// discarded. Only `client_error` yields an error.
    pub fn handle(&mut self, incoming: Incoming) -> Result<(), ClientError> {
        match incoming {
            Incoming::Server(msg) => self.handle_server(msg),
            Incoming::ClientTime(sample) => {
                self.handle_client_time(sample);
                Ok(())
            }
            Incoming::SocketOpen => {
                // Rejoin after a reconnect
                if let Some(room_id) = self.state.current_room_id().map(str::to_string) {
                    self.client_join(room_id);
                }
                Ok(())
            }
            Incoming::SocketClose => {
                self.show_notification("Reconnecting...");
                Ok(())
            }
            Incoming::SocketError(error) => {
                self.handle_socket_error(&error);
                Ok(())
            }
            Incoming::Unknown(info) => {
                // Likely an upstream failure that may resolve itself
                tracing::warn!("Received a message without a recognizable type: {}", info);
                self.show_notification("Something went wrong :/");
                Ok(())
            }
        }
    }

    fn handle_server(&mut self, msg: ServerMessage) -> Result<(), ClientError> {
        match msg {
            ServerMessage::RoomCreated {
                room,
                secret,
                clients,
                you,
            } => {
                let change = KnownRoomChange {
                    name: Some(room.name.clone()),
                    secret: Some(Some(secret)),
                    last_entered: Some(self.now()),
                    ..KnownRoomChange::default()
                };
                self.enter_room(room, clients, true, you, change)?;
            }
            ServerMessage::RoomJoined {
                room,
                clients,
                admin,
                you,
            } => {
                let change = KnownRoomChange {
                    name: Some(room.name.clone()),
                    last_entered: Some(self.now()),
                    ..KnownRoomChange::default()
                };
                self.enter_room(room, clients, admin, you, change)?;
            }
            ServerMessage::RoomInvalid { room_id } => {
                if !self.state.tmp.invalid_rooms.contains(&room_id) {
                    self.state.tmp.invalid_rooms.push(room_id.clone());
                }
                self.known_rooms_remove(&room_id);
            }
            ServerMessage::RoomState(room) => self.handle_room_state(room),
            ServerMessage::RoomClients { room_id, clients } => {
                self.handle_room_clients(&room_id, clients);
            }
            ServerMessage::RoomMessage(message) => self.handle_room_message(message),
            ServerMessage::ClientError(ErrorInfo { message, received }) => {
                tracing::error!("Server rejected a client message: {}", message);
                return Err(ClientError::ServerProtocol { message, received });
            }
            ServerMessage::ClientConfused(info) => self.show_notification(info.message),
            ServerMessage::PaymentSession(session_id) => {
                self.state.tmp.payment_session = Some(session_id);
            }
        }
        Ok(())
    }

    /// Keep the offset of the lowest-latency sample seen so far
    fn handle_client_time(&mut self, sample: TimeSample) {
        let tmp = &mut self.state.tmp;
        tmp.time_diff_checks += 1;

        let latency = sample.latency();
        let improved = tmp.time_diff_latency.is_none_or(|best| latency < best);
        if improved {
            tmp.time_diff = sample.offset();
            tmp.time_diff_latency = Some(latency);
            tracing::debug!(
                "Clock offset {}ms (latency {}ms, check {})",
                tmp.time_diff,
                latency,
                tmp.time_diff_checks
            );
        }
    }

    fn handle_socket_error(&mut self, error: &TransportError) {
        // The close event that follows a timeout already notifies
        if error.is_timeout() {
            return;
        }
        tracing::error!("Socket error: {}", error);
        self.show_notification("Could not connect to server");
    }

    fn enter_room(
        &mut self,
        room: RoomSnapshot,
        clients: RoomClients,
        admin: bool,
        you: String,
        change: KnownRoomChange,
    ) -> Result<(), ClientError> {
        self.known_rooms_update(room.id.clone(), &change);

        let tmp = &mut self.state.tmp;
        tmp.room = Some(room);
        tmp.room_clients = Some(clients);
        tmp.room_admin = Some(admin);
        tmp.room_synced = None;
        tmp.room_messages.clear();
        tmp.room_messages_unread = 0;
        if !tmp.own_sockets.contains(&you) {
            tmp.own_sockets.push(you);
        }

        for message in messages::on_enter(self.config.flavor, admin) {
            self.room_message_system(message.html.to_string(), message.button())?;
        }
        Ok(())
    }

    fn handle_room_state(&mut self, room: RoomSnapshot) {
        if !self.state.is_current_room(&room.id) {
            tracing::debug!("Discarding state of stale room '{}'", room.id);
            return;
        }

        let renamed = self
            .state
            .known_rooms
            .get(&room.id)
            .is_some_and(|known| known.name != room.name);
        if renamed {
            let change = KnownRoomChange {
                name: Some(room.name.clone()),
                ..KnownRoomChange::default()
            };
            self.known_rooms_update(room.id.clone(), &change);
        }

        self.state.tmp.room = Some(room);
    }

    fn handle_room_clients(&mut self, room_id: &str, clients: RoomClients) {
        if !self.state.is_current_room(room_id) {
            tracing::debug!("Discarding clients of stale room '{}'", room_id);
            return;
        }
        self.state.tmp.room_clients = Some(clients);
    }

    fn handle_room_message(&mut self, message: RoomMessage) {
        if !self.state.is_current_room(&message.room_id) {
            tracing::debug!("Discarding message for stale room '{}'", message.room_id);
            return;
        }
        self.room_message_receive(message);
    }
}
