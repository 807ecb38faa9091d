//! Client configuration.

use std::{path::PathBuf, time::Duration};

/// Default WebSocket endpoint of the sync server
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";

/// Which deployment of the app this client talks to.
///
/// The two deployments share the protocol but differ in welcome messages and
/// in how new rooms are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppFlavor {
    /// Selah: rooms get a random name from the server
    #[default]
    Selah,
    /// Singit: rooms are called "Room" by default and playlists can be paid for
    Singit,
}

impl AppFlavor {
    /// Name requested for a freshly created room (`None` lets the server pick one)
    pub fn new_room_name(self) -> Option<&'static str> {
        match self {
            Self::Selah => None,
            Self::Singit => Some("Room"),
        }
    }
}

/// All tunables of the sync client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint
    pub url: String,
    /// SQLite file for durable state (`None` keeps everything in memory)
    pub db_path: Option<PathBuf>,
    /// Maximum time to wait for a connection handshake
    pub connect_timeout: Duration,
    /// First reconnection delay
    pub reconnect_min_delay: Duration,
    /// Upper bound for reconnection delays
    pub reconnect_max_delay: Duration,
    /// Multiplier applied to the delay after every failed attempt
    pub reconnect_growth: f64,
    /// Interval between probes of the post-connect sync burst
    pub sync_burst_interval: Duration,
    /// Number of successful round trips that ends the sync burst
    pub sync_burst_target: u32,
    /// Keep-alive probe interval (the gateway drops sockets idle for 10 minutes)
    pub keepalive_interval: Duration,
    /// Pause between hiding one notification and showing the next
    pub notification_delay: Duration,
    /// Capacity of the durable write queue
    pub write_queue_capacity: usize,
    /// Deployment flavor
    pub flavor: AppFlavor,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            db_path: None,
            connect_timeout: Duration::from_secs(10),
            reconnect_min_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
            reconnect_growth: 1.3,
            sync_burst_interval: Duration::from_secs(1),
            sync_burst_target: 3,
            keepalive_interval: Duration::from_secs(9 * 60),
            notification_delay: Duration::from_millis(500),
            write_queue_capacity: 1024,
            flavor: AppFlavor::Selah,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given endpoint with default tunables
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
