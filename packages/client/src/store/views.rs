//! Derived, read-only views of the state tree.
//!
//! These live on [`AppState`] so collaborators can compute them from the
//! snapshots they receive, without going through the dispatcher.

use std::collections::{BTreeMap, HashMap};

use crate::state::{AppState, KnownRoomEntry, Playback};

/// Display name of participants that have not set one
pub const DEFAULT_PARTICIPANT_NAME: &str = "Participant";

impl AppState {
    /// Known rooms, most recently entered first
    pub fn known_rooms_sorted(&self) -> Vec<KnownRoomEntry> {
        let mut rooms: Vec<KnownRoomEntry> = self
            .known_rooms
            .iter()
            .map(|(id, room)| KnownRoomEntry {
                id: id.clone(),
                room: room.clone(),
            })
            .collect();
        rooms.sort_by(|a, b| b.room.last_entered.cmp(&a.room.last_entered));
        rooms
    }

    pub fn known_rooms_starred(&self) -> Vec<KnownRoomEntry> {
        self.known_rooms_filtered(|entry| entry.room.is_starred())
    }

    /// Rooms this client administers
    pub fn known_rooms_admin(&self) -> Vec<KnownRoomEntry> {
        self.known_rooms_filtered(|entry| entry.room.is_admin())
    }

    /// Rooms this client only visited as a guest
    pub fn known_rooms_guest(&self) -> Vec<KnownRoomEntry> {
        self.known_rooms_filtered(|entry| !entry.room.is_admin())
    }

    fn known_rooms_filtered(&self, keep: impl Fn(&KnownRoomEntry) -> bool) -> Vec<KnownRoomEntry> {
        self.known_rooms_sorted().into_iter().filter(keep).collect()
    }

    /// Admin secret of the current room, if this client has one
    pub fn secret(&self) -> Option<&str> {
        let room_id = self.current_room_id()?;
        self.known_rooms.get(room_id)?.secret.as_deref()
    }

    pub fn deny_dj(&self) -> bool {
        self.deny(|room| room.admins_only_dj)
    }

    pub fn deny_see_clients(&self) -> bool {
        self.deny(|room| room.admins_only_see_clients)
    }

    pub fn deny_chat(&self) -> bool {
        self.deny(|room| room.admins_only_chat)
    }

    fn deny(&self, admins_only: impl Fn(&crate::state::RoomSnapshot) -> bool) -> bool {
        let is_admin = self.tmp.room_admin.unwrap_or(false);
        match &self.tmp.room {
            Some(room) => !is_admin && admins_only(room),
            None => false,
        }
    }

    /// Estimated server time in seconds, given the local time in milliseconds
    pub fn server_time(&self, now_millis: i64) -> f64 {
        (now_millis as f64 - self.tmp.time_diff) / 1000.0
    }

    /// Whether playback is not actively running (also true with nothing loaded)
    pub fn paused(&self) -> bool {
        match &self.tmp.room {
            Some(room) => !matches!(room.playback(), Playback::Playing { .. }),
            None => true,
        }
    }

    /// Display name per participant socket, with collisions disambiguated.
    ///
    /// Colliding names get a slice of the socket id appended; if that still
    /// collides the whole socket id is used.
    pub fn client_names(&self) -> BTreeMap<String, String> {
        let Some(clients) = &self.tmp.room_clients else {
            return BTreeMap::new();
        };

        let base: Vec<(&str, &str)> = clients
            .all()
            .map(|client| {
                let name = client
                    .name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(DEFAULT_PARTICIPANT_NAME);
                (client.socket.as_str(), name)
            })
            .collect();

        let mut names: BTreeMap<String, String> = base
            .iter()
            .map(|(socket, name)| {
                let name = if count(&base, name) > 1 {
                    format!("{} ({})", name, socket_tag(socket))
                } else {
                    name.to_string()
                };
                (socket.to_string(), name)
            })
            .collect();

        // Tags can collide too
        let mut counts: HashMap<String, usize> = HashMap::new();
        for name in names.values() {
            *counts.entry(name.clone()).or_default() += 1;
        }
        for (socket, name) in names.iter_mut() {
            if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
                let base_name = base
                    .iter()
                    .find(|(s, _)| *s == socket.as_str())
                    .map_or(DEFAULT_PARTICIPANT_NAME, |(_, n)| *n);
                *name = format!("{} ({})", base_name, socket);
            }
        }
        names
    }
}

fn count(names: &[(&str, &str)], name: &str) -> usize {
    names.iter().filter(|(_, n)| *n == name).count()
}

/// Four characters of the socket id, skipping a common prefix
fn socket_tag(socket: &str) -> String {
    let tag: String = socket.chars().skip(3).take(4).collect();
    if tag.is_empty() {
        socket.to_string()
    } else {
        tag
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::state::{KnownRoom, RoomClient, RoomClients, RoomSnapshot};

    fn client(socket: &str, name: Option<&str>) -> RoomClient {
        RoomClient {
            socket: socket.to_string(),
            name: name.map(str::to_string),
            admin: false,
            synced: None,
        }
    }

    fn with_clients(guests: Vec<RoomClient>) -> AppState {
        let mut state = AppState::default();
        state.tmp.room_clients = Some(RoomClients {
            total: guests.len() as u32,
            admins: vec![],
            guests,
            hidden: false,
            limited: false,
        });
        state
    }

    fn known(name: &str, secret: Option<&str>, starred: Option<bool>, day: u32) -> KnownRoom {
        KnownRoom {
            name: name.to_string(),
            secret: secret.map(str::to_string),
            starred,
            last_entered: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    fn room(id: &str) -> RoomSnapshot {
        RoomSnapshot {
            id: id.to_string(),
            name: "Room".to_string(),
            media: vec![],
            loaded: None,
            start: None,
            paused: None,
            admins_only_dj: true,
            admins_only_see_clients: false,
            admins_only_chat: true,
        }
    }

    #[test]
    fn test_client_names_disambiguates_collisions() {
        // テスト項目: 同名の参加者にはソケット ID の一部が付加され、一意になる
        // given (前提条件):
        let state = with_clients(vec![
            client("aaa1", Some("Sam")),
            client("bbb2", Some("Sam")),
            client("ccc3", Some("Jo")),
        ]);

        // when (操作):
        let names = state.client_names();

        // then (期待する結果):
        assert_eq!(names["aaa1"], "Sam (1)");
        assert_eq!(names["bbb2"], "Sam (2)");
        assert_eq!(names["ccc3"], "Jo");
    }

    #[test]
    fn test_client_names_defaults_empty_names() {
        // テスト項目: 名前が未設定・空の参加者は "Participant" になり、重複すれば区別される
        // given (前提条件):
        let state = with_clients(vec![client("xyz12345", None), client("xyz67890", Some(""))]);

        // when (操作):
        let names = state.client_names();

        // then (期待する結果):
        assert_eq!(names["xyz12345"], "Participant (1234)");
        assert_eq!(names["xyz67890"], "Participant (6789)");
    }

    #[test]
    fn test_client_names_falls_back_to_full_socket() {
        // テスト項目: 付加した部分 ID でも衝突する場合はソケット ID 全体を使う
        // given (前提条件):
        let state = with_clients(vec![client("abcd1234", Some("Sam")), client("xyzd1234", Some("Sam"))]);

        // when (操作):
        let names = state.client_names();

        // then (期待する結果):
        assert_eq!(names["abcd1234"], "Sam (abcd1234)");
        assert_eq!(names["xyzd1234"], "Sam (xyzd1234)");
    }

    #[test]
    fn test_known_rooms_views() {
        // テスト項目: 既知ルームは最終入室の新しい順に並び、スター・管理者・ゲストで絞り込める
        // given (前提条件):
        let mut state = AppState::default();
        state.known_rooms.insert("old".to_string(), known("Old", Some("s"), None, 1));
        state.known_rooms.insert("new".to_string(), known("New", None, Some(true), 3));
        state.known_rooms.insert("mid".to_string(), known("Mid", None, Some(false), 2));

        // when (操作):
        let ids = |entries: Vec<KnownRoomEntry>| -> Vec<String> {
            entries.into_iter().map(|entry| entry.id).collect()
        };

        // then (期待する結果):
        assert_eq!(ids(state.known_rooms_sorted()), vec!["new", "mid", "old"]);
        assert_eq!(ids(state.known_rooms_starred()), vec!["new"]);
        assert_eq!(ids(state.known_rooms_admin()), vec!["old"]);
        assert_eq!(ids(state.known_rooms_guest()), vec!["new", "mid"]);
    }

    #[test]
    fn test_secret_and_deny_views() {
        // テスト項目: 現在のルームの secret と、ゲストに対する管理者限定権限を判定する
        // given (前提条件):
        let mut state = AppState::default();
        state.known_rooms.insert("A".to_string(), known("A", Some("s3cret"), None, 1));
        state.tmp.room = Some(room("A"));
        state.tmp.room_admin = Some(false);

        // when (操作):
        let guest = (state.deny_dj(), state.deny_see_clients(), state.deny_chat());
        state.tmp.room_admin = Some(true);
        let admin = (state.deny_dj(), state.deny_see_clients(), state.deny_chat());

        // then (期待する結果):
        assert_eq!(state.secret(), Some("s3cret"));
        assert_eq!(guest, (true, false, true));
        assert_eq!(admin, (false, false, false));
    }

    #[test]
    fn test_server_time_subtracts_offset() {
        // テスト項目: サーバ時刻はローカル時刻からオフセットを引いた秒数になる
        // given (前提条件):
        let mut state = AppState::default();
        state.tmp.time_diff = 1_500.0;

        // when (操作):
        let server_time = state.server_time(10_000);

        // then (期待する結果):
        assert_eq!(server_time, 8.5);
    }

    #[test]
    fn test_paused_without_start() {
        // テスト項目: start が無ければ（未ロード含む）一時停止中とみなす
        // given (前提条件):
        let mut state = AppState::default();
        let no_room = state.paused();
        state.tmp.room = Some(room("A"));
        let idle = state.paused();

        // when (操作):
        if let Some(room) = state.tmp.room.as_mut() {
            room.start = Some(100.0);
        }

        // then (期待する結果):
        assert!(no_room);
        assert!(idle);
        assert!(!state.paused());
    }
}
