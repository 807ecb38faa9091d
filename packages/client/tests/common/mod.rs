//! In-process sync server used by the integration tests.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use selah_client::{ClientConfig, StoreHandle, state::AppState};
use selah_shared::time::now_millis;
use serde_json::{Value, json};
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
};

struct ServerState {
    frames: mpsc::UnboundedSender<Value>,
    kick: Notify,
    connections: AtomicUsize,
    /// Server clock minus real clock (ms)
    clock_offset: i64,
}

/// Scripted sync server bound to an ephemeral port
pub struct MockServer {
    pub url: String,
    frames: mpsc::UnboundedReceiver<Value>,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::start_with_clock_offset(0).await
    }

    pub async fn start_with_clock_offset(clock_offset: i64) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ServerState {
            frames: frames_tx,
            kick: Notify::new(),
            connections: AtomicUsize::new(0),
            clock_offset,
        });

        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("ws://127.0.0.1:{}/ws", port),
            frames: frames_rx,
            state,
            task,
        }
    }

    /// Client configuration pointing at this server, with short retry delays
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url.clone());
        config.reconnect_min_delay = Duration::from_millis(50);
        config.reconnect_max_delay = Duration::from_millis(200);
        config.connect_timeout = Duration::from_secs(2);
        config
    }

    /// Next structured frame received from any client
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server stopped")
    }

    /// Close every open connection
    pub fn kick(&self) {
        self.state.kick.notify_waiters();
    }

    /// Number of connections accepted so far
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let kicked = state.kick.notified();
    tokio::pin!(kicked);
    kicked.as_mut().enable();
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = &mut kicked => {
                socket.send(Message::Close(None)).await.ok();
                break;
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = respond(&state, text.as_str())
                        && socket.send(Message::Text(reply.into())).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }
}

fn respond(state: &ServerState, text: &str) -> Option<String> {
    if !text.starts_with('{') {
        // Clock probe
        return Some(format!("{}\n{}", text, now_millis() + state.clock_offset));
    }

    let frame: Value = serde_json::from_str(text).ok()?;
    state.frames.send(frame.clone()).ok();

    let info = &frame["info"];
    let reply = match frame["type"].as_str()? {
        "room_create" => json!({
            "type": "room_created",
            "info": {
                "room": room("r1", info["room_name"].as_str().unwrap_or("Bright Meadow")),
                "secret": "s1",
                "clients": clients(info["client_name"].clone()),
                "you": "sock1",
            },
        }),
        "client_join" => json!({
            "type": "room_joined",
            "info": {
                "room": room(info["room_id"].as_str()?, "Joined Room"),
                "clients": clients(info["client_name"].clone()),
                "admin": !info["room_secret"].is_null(),
                "you": "sock2",
            },
        }),
        _ => return None,
    };
    Some(reply.to_string())
}

fn room(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "media": [],
        "loaded": null,
        "start": null,
        "paused": null,
        "admins_only_dj": false,
        "admins_only_see_clients": false,
        "admins_only_chat": false,
    })
}

fn clients(name: Value) -> Value {
    json!({
        "admins": [{"socket": "sock1", "name": name, "admin": true, "synced": null}],
        "guests": [],
        "hidden": false,
        "limited": false,
        "total": 1,
    })
}

/// Wait until a published snapshot satisfies `predicate`
pub async fn wait_for_state(
    handle: &StoreHandle,
    predicate: impl Fn(&AppState) -> bool,
) -> Arc<AppState> {
    let mut state = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            let snapshot = state.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            state.changed().await.expect("dispatcher stopped");
        }
    })
    .await
    .expect("timed out waiting for state")
}
