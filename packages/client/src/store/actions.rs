//! Actions: caller intents that send one message and/or mutate state.

use serde_json::json;

use super::Store;
use crate::{
    db::DbValue,
    error::ClientError,
    protocol::{Outgoing, Permission},
    state::{KnownRoom, KnownRoomChange, MessageButton, Playback, RoomMessage},
};

/// User agent reported with feedback
const USER_AGENT: &str = concat!("selah-client/", env!("CARGO_PKG_VERSION"));

/// Seconds to rewind when resuming, covering network delay and buffering
const RESUME_REWIND_SECS: f64 = 3.0;

/// Reports of a changed sync status smaller than this (ms) are not sent
const SYNC_REPORT_THRESHOLD_MS: i64 = 10;

/// Everything a collaborator can ask the store to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Set a durable preference by path
    Set { path: Vec<String>, value: DbValue },
    /// Set a volatile field by key
    TmpSet { key: String, value: serde_json::Value },
    SetDark(bool),
    SetViewport { width: u32, height: u32 },
    ShowNotification(String),
    /// Open a dialog by name, or close it with `None`
    ShowDialog(Option<String>),
    FundSelah,
    FundSingitSession { amount: f64, return_url: String },

    ClientJoin(String),
    ClientLeave,
    ClientName(String),
    /// Playback drift in seconds, `None` when not playing
    ClientSynced(Option<f64>),
    ClientFeedback { feedback: String, email: Option<String> },

    RoomCreate,
    /// Create a new room with a copy of another room's playlist
    RoomCopy(String),
    RoomName(String),
    RoomAdminsOnly { permission: Permission, value: bool },
    RoomMessageSend(String),
    RoomMessageSystem { html: String, button: Option<MessageButton> },

    MediaAddYoutube { name: String, youtube_id: String },
    /// Move `media_id` so it comes right before `media_id_after` (`None` = end)
    MediaRearrange { media_id: String, media_id_after: Option<String> },
    MediaLoad(String),
    /// Play the loaded item from the given position (seconds)
    MediaPlay(f64),
    /// Pause the loaded item at the given position (seconds)
    MediaPause(f64),
    MediaPauseNow,
    MediaPlayResume,
    MediaRemove(String),
    MediaNext,

    KnownRoomsUpdate { room_id: String, change: KnownRoomChange },
    KnownRoomsStarToggle(String),
    KnownRoomsForget(String),
    /// Ask the server to delete a room this client administers
    KnownRoomsDelete(String),
}

impl Store {
    /// Run one action to completion
    pub fn dispatch(&mut self, action: Action) -> Result<(), ClientError> {
        match action {
            Action::Set { path, value } => {
                let path: Vec<&str> = path.iter().map(String::as_str).collect();
                self.set(&path, value)?;
            }
            Action::TmpSet { key, value } => self.tmp_set(&key, value)?,
            Action::SetDark(dark) => self.set(&["dark"], dark.into())?,
            Action::SetViewport { width, height } => {
                self.state.tmp.viewport_width = width;
                self.state.tmp.viewport_height = height;
            }
            Action::ShowNotification(text) => self.show_notification(text),
            Action::ShowDialog(dialog) => {
                self.state.tmp.dialog = dialog.map(|name| format!("dialog-{}", name));
            }
            Action::FundSelah => self.state.tmp.dialog = Some("dialog-fund-selah".to_string()),
            Action::FundSingitSession { amount, return_url } => {
                self.send(Outgoing::PaymentSession {
                    payment_amount: amount,
                    payment_return_url: return_url,
                });
            }

            Action::ClientJoin(room_id) => self.client_join(room_id),
            Action::ClientLeave => self.client_leave(),
            Action::ClientName(name) => {
                self.set(&["name"], name.as_str().into())?;
                self.send(Outgoing::ClientName { client_name: name });
            }
            Action::ClientSynced(seconds) => self.client_synced(seconds),
            Action::ClientFeedback { feedback, email } => {
                self.send(Outgoing::ClientFeedback {
                    client_feedback: feedback,
                    client_email: email,
                    client_user_agent: USER_AGENT.to_string(),
                });
            }

            Action::RoomCreate => self.send(Outgoing::RoomCreate {
                client_name: self.state.prefs.name.clone(),
                room_id_copy: None,
                room_name: self.config.flavor.new_room_name().map(str::to_string),
            }),
            Action::RoomCopy(room_id) => self.send(Outgoing::RoomCreate {
                client_name: self.state.prefs.name.clone(),
                room_id_copy: Some(room_id),
                room_name: None,
            }),
            Action::RoomName(name) => {
                let room_id = self.room_id()?;
                self.send(Outgoing::RoomName {
                    room_id,
                    room_name: name,
                });
            }
            Action::RoomAdminsOnly { permission, value } => {
                let room_id = self.room_id()?;
                self.send(Outgoing::admins_only(permission, room_id, value));
            }
            Action::RoomMessageSend(message) => {
                let room_id = self.room_id()?;
                self.send(Outgoing::RoomMessage {
                    room_id,
                    room_message: message,
                });
            }
            Action::RoomMessageSystem { html, button } => self.room_message_system(html, button)?,

            Action::MediaAddYoutube { name, youtube_id } => {
                let room_id = self.room_id()?;
                self.send(Outgoing::RoomMediaAdd {
                    room_id,
                    media_name: name,
                    media_type: "youtube".to_string(),
                    media_content: json!({ "id": youtube_id }),
                });
            }
            Action::MediaRearrange {
                media_id,
                media_id_after,
            } => {
                let room_id = self.room_id()?;
                self.send(Outgoing::RoomMediaRearrange {
                    room_id,
                    media_id,
                    media_id_after,
                });
            }
            Action::MediaLoad(media_id) => self.media_load(media_id)?,
            Action::MediaPlay(position) => self.media_play(position)?,
            Action::MediaPause(position) => self.media_pause(position)?,
            Action::MediaPauseNow => self.media_pause_now()?,
            Action::MediaPlayResume => {
                let paused = self.current_room()?.paused.unwrap_or(0.0);
                self.media_play(paused - RESUME_REWIND_SECS)?;
            }
            Action::MediaRemove(media_id) => {
                let room_id = self.room_id()?;
                self.send(Outgoing::RoomMediaRemove { room_id, media_id });
            }
            Action::MediaNext => {
                let next = self.current_room()?.next_media().map(|media| media.id.clone());
                if let Some(media_id) = next {
                    self.media_load(media_id)?;
                }
            }

            Action::KnownRoomsUpdate { room_id, change } => {
                self.known_rooms_update(room_id, &change);
            }
            Action::KnownRoomsStarToggle(room_id) => {
                let starred = self.known_room(&room_id)?.is_starred();
                let change = KnownRoomChange {
                    starred: Some(Some(!starred)),
                    ..KnownRoomChange::default()
                };
                self.known_rooms_update(room_id, &change);
            }
            Action::KnownRoomsForget(room_id) => self.known_rooms_remove(&room_id),
            Action::KnownRoomsDelete(room_id) => {
                // The roster entry goes once the server reports the room invalid
                let room_secret = self.known_room(&room_id)?.secret.clone();
                self.send(Outgoing::RoomDelete {
                    room_id,
                    room_secret,
                });
            }
        }
        Ok(())
    }

    /// Upsert a known room: defaults, then the existing record, then `change`.
    ///
    /// The in-memory roster is the existing durable record: it is loaded from
    /// the `known_rooms` table at hydration and every change goes through
    /// [`Store::known_rooms_set`], so it never lags behind the table.
    pub(crate) fn known_rooms_update(&mut self, room_id: String, change: &KnownRoomChange) {
        let existing = self
            .state
            .known_rooms
            .get(&room_id)
            .cloned()
            .unwrap_or_else(|| KnownRoom::with_defaults(self.now()));
        let room = existing.apply(change);
        self.known_rooms_set(room_id, room);
    }

    pub(crate) fn client_join(&mut self, room_id: String) {
        let room_secret = self
            .state
            .known_rooms
            .get(&room_id)
            .and_then(|room| room.secret.clone());
        self.send(Outgoing::ClientJoin {
            room_id,
            room_secret,
            client_name: self.state.prefs.name.clone(),
        });
    }

    /// Leave without waiting for the server; room state is cleared at once
    fn client_leave(&mut self) {
        let Some(room_id) = self.state.current_room_id().map(str::to_string) else {
            return;
        };
        self.send(Outgoing::ClientLeave { room_id });
        self.state.clear_room();
    }

    fn client_synced(&mut self, seconds: Option<f64>) {
        let ms = seconds.map(|seconds| (seconds * 1000.0).floor() as i64);
        let prev = self.state.tmp.room_synced;
        if ms == prev {
            return;
        }
        if let (Some(ms), Some(prev)) = (ms, prev)
            && (ms - prev).abs() < SYNC_REPORT_THRESHOLD_MS
        {
            return;
        }
        self.state.tmp.room_synced = ms;
        self.send(Outgoing::ClientSynced { client_synced: ms });
    }

    /// Add a locally generated message to the current room's log
    pub(crate) fn room_message_system(
        &mut self,
        html: String,
        button: Option<MessageButton>,
    ) -> Result<(), ClientError> {
        let message = RoomMessage {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: self.room_id()?,
            sender: None,
            name: None,
            html,
            timestamp: self.server_time(),
            button,
        };
        self.room_message_receive(message);
        Ok(())
    }

    pub(crate) fn room_message_receive(&mut self, message: RoomMessage) {
        self.state.tmp.room_messages.push(message);
        self.state.tmp.room_messages_unread += 1;
    }

    fn media_load(&mut self, media_id: String) -> Result<(), ClientError> {
        let room_id = self.room_id()?;
        self.send(Outgoing::RoomMediaLoad { room_id, media_id });
        Ok(())
    }

    fn media_play(&mut self, position: f64) -> Result<(), ClientError> {
        let room_id = self.room_id()?;
        self.send(Outgoing::RoomMediaPlay {
            room_id,
            room_start: self.server_time() - position,
        });
        Ok(())
    }

    fn media_pause(&mut self, position: f64) -> Result<(), ClientError> {
        let room_id = self.room_id()?;
        self.send(Outgoing::RoomMediaPause {
            room_id,
            room_paused: position,
        });
        Ok(())
    }

    /// Pause at the current position (possibly past the end, never below 0)
    fn media_pause_now(&mut self) -> Result<(), ClientError> {
        let Playback::Playing { start } = self.current_room()?.playback() else {
            return Ok(());
        };
        let position = (self.server_time() - start).max(0.0);
        self.media_pause(position)
    }

    fn current_room(&self) -> Result<&crate::state::RoomSnapshot, ClientError> {
        self.state.tmp.room.as_ref().ok_or(ClientError::NotInRoom)
    }

    fn known_room(&self, room_id: &str) -> Result<&KnownRoom, ClientError> {
        self.state
            .known_rooms
            .get(room_id)
            .ok_or_else(|| ClientError::UnknownRoom(room_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        db::MockPersistence,
        store::test_support::{NOW_MILLIS, enter, sent, store, store_with},
    };

    const NOW_SECS: f64 = NOW_MILLIS as f64 / 1000.0;

    fn known(name: &str, secret: Option<&str>) -> KnownRoom {
        KnownRoom {
            name: name.to_string(),
            secret: secret.map(str::to_string),
            starred: None,
            last_entered: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_known_rooms_update_keeps_unspecified_fields() {
        // テスト項目: 既存ルームへの部分更新で指定されていないフィールドが保持され、結果が永続化される
        // given (前提条件):
        let updated_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut persistence = MockPersistence::new();
        persistence
            .expect_put_known_room()
            .withf(move |id, room| {
                id == "A"
                    && room.name == "X"
                    && room.secret.as_deref() == Some("s")
                    && room.starred == Some(true)
                    && room.last_entered == updated_at
            })
            .times(1)
            .returning(|_, _| ());
        let mut store = store_with(persistence);
        store
            .state
            .known_rooms
            .insert("A".to_string(), known("X", Some("s")));
        let change = KnownRoomChange {
            starred: Some(Some(true)),
            last_entered: Some(updated_at),
            ..KnownRoomChange::default()
        };

        // when (操作):
        store
            .dispatch(Action::KnownRoomsUpdate {
                room_id: "A".to_string(),
                change,
            })
            .unwrap();

        // then (期待する結果):
        let room = &store.state().known_rooms["A"];
        assert_eq!(room.name, "X");
        assert_eq!(room.secret.as_deref(), Some("s"));
        assert_eq!(room.starred, Some(true));
        assert_eq!(room.last_entered, updated_at);
    }

    #[tokio::test]
    async fn test_known_rooms_update_overlays_stored_record() {
        // テスト項目: known_rooms テーブルから復元したルームへの部分更新は保存済みの値を保ったまま書き戻される
        // given (前提条件):
        use std::sync::Arc;

        use selah_shared::time::{Clock, FixedClock};

        use crate::{
            channel::Channel,
            config::ClientConfig,
            db::{Database, DurableWriter, Persistence},
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let db = Database::open(&path).unwrap();
        db.put_known_room("A", &known("X", Some("s"))).unwrap();
        let known_rooms = db.get_all_known_rooms().unwrap();
        let writer = Arc::new(DurableWriter::spawn(db, 16));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(NOW_MILLIS));
        let mut store = Store::hydrate(
            ClientConfig::default(),
            Channel::new(clock.clone()),
            writer.clone(),
            clock,
            vec![],
            known_rooms,
        )
        .unwrap();

        // when (操作):
        store
            .dispatch(Action::KnownRoomsStarToggle("A".to_string()))
            .unwrap();
        writer.flush().await.unwrap();

        // then (期待する結果):
        let stored = Database::open(&path)
            .unwrap()
            .get_known_room("A")
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "X");
        assert_eq!(stored.secret.as_deref(), Some("s"));
        assert_eq!(stored.starred, Some(true));
        assert_eq!(&stored, &store.state().known_rooms["A"]);
    }

    #[test]
    fn test_known_rooms_update_new_room_gets_defaults() {
        // テスト項目: 未知のルームはデフォルト値（名前 "Room"、現在時刻）で登録される
        // given (前提条件):
        let mut store = store();

        // when (操作):
        store
            .dispatch(Action::KnownRoomsUpdate {
                room_id: "B".to_string(),
                change: KnownRoomChange::default(),
            })
            .unwrap();

        // then (期待する結果):
        let room = &store.state().known_rooms["B"];
        assert_eq!(room.name, "Room");
        assert_eq!(room.secret, None);
        assert_eq!(room.last_entered.timestamp_millis(), NOW_MILLIS);
    }

    #[test]
    fn test_client_leave_clears_room_immediately() {
        // テスト項目: 退室はサーバの応答を待たずにルーム状態をクリアし client_leave を送る
        // given (前提条件):
        let mut store = store();
        enter(&mut store, "A");

        // when (操作):
        store.dispatch(Action::ClientLeave).unwrap();

        // then (期待する結果):
        assert!(store.state().tmp.room.is_none());
        assert!(store.state().tmp.room_clients.is_none());
        assert_eq!(
            sent(&store),
            vec![Outgoing::ClientLeave {
                room_id: "A".to_string()
            }]
        );
    }

    #[test]
    fn test_client_leave_outside_room_is_noop() {
        // テスト項目: ルームにいない状態での退室は何も送信しない
        // given (前提条件):
        let mut store = store();

        // when (操作):
        let result = store.dispatch(Action::ClientLeave);

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(sent(&store).is_empty());
    }

    #[test]
    fn test_client_join_sends_stored_secret() {
        // テスト項目: 入室時は既知ルームの secret と自分の名前を送る
        // given (前提条件):
        let mut store = store();
        store.known_rooms_set("A".to_string(), known("X", Some("s")));
        store.dispatch(Action::ClientName("Sam".to_string())).unwrap();

        // when (操作):
        store.dispatch(Action::ClientJoin("A".to_string())).unwrap();

        // then (期待する結果):
        let messages = sent(&store);
        assert_eq!(
            messages.last(),
            Some(&Outgoing::ClientJoin {
                room_id: "A".to_string(),
                room_secret: Some("s".to_string()),
                client_name: Some("Sam".to_string()),
            })
        );
    }

    #[test]
    fn test_client_name_persists_preference() {
        // テスト項目: 名前の変更は永続化され、サーバへも通知される
        // given (前提条件):
        let mut persistence = MockPersistence::new();
        persistence
            .expect_put_dict()
            .with(eq("name".to_string()), eq(DbValue::from("Sam")))
            .times(1)
            .returning(|_, _| ());
        let mut store = store_with(persistence);

        // when (操作):
        store.dispatch(Action::ClientName("Sam".to_string())).unwrap();

        // then (期待する結果):
        assert_eq!(store.state().prefs.name.as_deref(), Some("Sam"));
        assert_eq!(
            sent(&store),
            vec![Outgoing::ClientName {
                client_name: "Sam".to_string()
            }]
        );
    }

    #[test]
    fn test_client_synced_reports_only_significant_changes() {
        // テスト項目: 同期状態は 10ms 以上の変化があった場合のみ報告される
        // given (前提条件):
        let mut store = store();

        // when (操作):
        store.dispatch(Action::ClientSynced(None)).unwrap();
        store.dispatch(Action::ClientSynced(Some(0.100))).unwrap();
        store.dispatch(Action::ClientSynced(Some(0.105))).unwrap();
        store.dispatch(Action::ClientSynced(Some(0.200))).unwrap();
        store.dispatch(Action::ClientSynced(None)).unwrap();

        // then (期待する結果):
        assert_eq!(
            sent(&store),
            vec![
                Outgoing::ClientSynced {
                    client_synced: Some(100)
                },
                Outgoing::ClientSynced {
                    client_synced: Some(200)
                },
                Outgoing::ClientSynced {
                    client_synced: None
                },
            ]
        );
        assert_eq!(store.state().tmp.room_synced, None);
    }

    #[test]
    fn test_room_actions_require_room() {
        // テスト項目: ルームに属するアクションはルーム外では NotInRoom になる
        // given (前提条件):
        let mut store = store();

        // when (操作):
        let result = store.dispatch(Action::RoomMessageSend("hi".to_string()));

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotInRoom)));
        assert!(sent(&store).is_empty());
    }

    #[test]
    fn test_room_create_and_copy() {
        // テスト項目: ルーム作成とコピーは room_create を送り、コピー時は名前を指定しない
        // given (前提条件):
        let mut store = store();

        // when (操作):
        store.dispatch(Action::RoomCreate).unwrap();
        store.dispatch(Action::RoomCopy("A".to_string())).unwrap();

        // then (期待する結果):
        assert_eq!(
            sent(&store),
            vec![
                Outgoing::RoomCreate {
                    client_name: None,
                    room_id_copy: None,
                    room_name: None,
                },
                Outgoing::RoomCreate {
                    client_name: None,
                    room_id_copy: Some("A".to_string()),
                    room_name: None,
                },
            ]
        );
    }

    #[test]
    fn test_media_play_uses_server_time() {
        // テスト項目: 再生開始時刻はサーバ時刻から再生位置を引いた値になる
        // given (前提条件):
        let mut store = store();
        enter(&mut store, "A");
        store.state.tmp.time_diff = 2_000.0;

        // when (操作):
        store.dispatch(Action::MediaPlay(30.0)).unwrap();

        // then (期待する結果):
        assert_eq!(
            sent(&store),
            vec![Outgoing::RoomMediaPlay {
                room_id: "A".to_string(),
                room_start: NOW_SECS - 2.0 - 30.0,
            }]
        );
    }

    #[test]
    fn test_media_play_resume_rewinds() {
        // テスト項目: 再開時は一時停止位置の 3 秒前から再生する
        // given (前提条件):
        let mut store = store();
        enter(&mut store, "A");
        if let Some(room) = store.state.tmp.room.as_mut() {
            room.paused = Some(40.0);
        }

        // when (操作):
        store.dispatch(Action::MediaPlayResume).unwrap();

        // then (期待する結果):
        assert_eq!(
            sent(&store),
            vec![Outgoing::RoomMediaPlay {
                room_id: "A".to_string(),
                room_start: NOW_SECS - 37.0,
            }]
        );
    }

    #[test]
    fn test_media_pause_now_never_negative() {
        // テスト項目: 開始時刻が未来の場合でも一時停止位置は 0 未満にならない
        // given (前提条件):
        let mut store = store();
        enter(&mut store, "A");
        if let Some(room) = store.state.tmp.room.as_mut() {
            room.start = Some(NOW_SECS + 5.0);
        }

        // when (操作):
        store.dispatch(Action::MediaPauseNow).unwrap();

        // then (期待する結果):
        assert_eq!(
            sent(&store),
            vec![Outgoing::RoomMediaPause {
                room_id: "A".to_string(),
                room_paused: 0.0,
            }]
        );
    }

    #[test]
    fn test_media_next_at_end_is_noop() {
        // テスト項目: プレイリスト末尾で次へ進んでも何も送信しない
        // given (前提条件):
        let mut store = store();
        enter(&mut store, "A");
        if let Some(room) = store.state.tmp.room.as_mut() {
            room.media = vec![crate::state::RoomMedia {
                id: "m1".to_string(),
                name: "Song".to_string(),
                kind: "youtube".to_string(),
                content: json!({"id": "xyz"}),
            }];
            room.loaded = Some(0);
        }

        // when (操作):
        store.dispatch(Action::MediaNext).unwrap();

        // then (期待する結果):
        assert!(sent(&store).is_empty());
    }

    #[test]
    fn test_known_rooms_delete_waits_for_server() {
        // テスト項目: ルーム削除は secret 付きで要求を送り、ローカルの登録は残す
        // given (前提条件):
        let mut store = store();
        store.known_rooms_set("A".to_string(), known("X", Some("s")));

        // when (操作):
        store.dispatch(Action::KnownRoomsDelete("A".to_string())).unwrap();

        // then (期待する結果):
        assert!(store.state().known_rooms.contains_key("A"));
        assert_eq!(
            sent(&store),
            vec![Outgoing::RoomDelete {
                room_id: "A".to_string(),
                room_secret: Some("s".to_string()),
            }]
        );
    }

    #[test]
    fn test_star_toggle_unknown_room_fails() {
        // テスト項目: 未知のルームのスター切り替えは UnknownRoom になる
        // given (前提条件):
        let mut store = store();

        // when (操作):
        let result = store.dispatch(Action::KnownRoomsStarToggle("nope".to_string()));

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::UnknownRoom(id)) if id == "nope"));
    }

    #[test]
    fn test_show_dialog_prefixes_name() {
        // テスト項目: ダイアログ名には "dialog-" が付加され、None で閉じる
        // given (前提条件):
        let mut store = store();

        // when (操作):
        store.dispatch(Action::FundSelah).unwrap();
        let opened = store.state().tmp.dialog.clone();
        store.dispatch(Action::ShowDialog(None)).unwrap();

        // then (期待する結果):
        assert_eq!(opened.as_deref(), Some("dialog-fund-selah"));
        assert_eq!(store.state().tmp.dialog, None);
    }
}
