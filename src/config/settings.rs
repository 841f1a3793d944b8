use std::time::Duration;

use serde::Deserialize;

/// Upper bound on the close grace window, whatever the configuration says.
pub const MAX_CLOSE_GRACE_MS: u64 = 60_000;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub bus: BusSettings,
    pub rooms: RoomSettings,
    pub content: ContentSettings,
    pub log: LogSettings,
}

/// Host and port the WebSocket server binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Which room store to use and how long a single store call may take.
///
/// `backend` is one of `memory`, `sled` (uses `path`) or `redis` (uses
/// `url`).
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub backend: String,
    pub path: String,
    pub url: String,
    pub op_timeout_ms: u64,
}

impl StoreSettings {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms.max(1))
    }
}

/// Which message bus to use. `backend` is `local` or `redis`.
#[derive(Debug, Deserialize, Clone)]
pub struct BusSettings {
    pub backend: String,
    pub url: String,
    pub buffer_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomSettings {
    /// How long an empty room is kept before it is closed. 0 closes at once.
    pub close_grace_ms: u64,
    pub default_page_size: usize,
}

impl RoomSettings {
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms.min(MAX_CLOSE_GRACE_MS))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContentSettings {
    /// JSON file of content summaries loaded into the in-memory catalog.
    pub seed_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub store: Option<PartialStoreSettings>,
    pub bus: Option<PartialBusSettings>,
    pub rooms: Option<PartialRoomSettings>,
    pub content: Option<ContentSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStoreSettings {
    pub backend: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub op_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBusSettings {
    pub backend: Option<String>,
    pub url: Option<String>,
    pub buffer_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRoomSettings {
    pub close_grace_ms: Option<u64>,
    pub default_page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            store: StoreSettings {
                backend: "memory".to_string(),
                path: "roomcast_db".to_string(),
                url: "redis://127.0.0.1:6379/".to_string(),
                op_timeout_ms: 3000,
            },
            bus: BusSettings {
                backend: "local".to_string(),
                url: "redis://127.0.0.1:6379/".to_string(),
                buffer_size: 256,
            },
            rooms: RoomSettings {
                close_grace_ms: 0,
                default_page_size: 10,
            },
            content: ContentSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
