mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{
    BusSettings, ContentSettings, LogSettings, MAX_CLOSE_GRACE_MS, RoomSettings, ServerSettings,
    Settings, StoreSettings,
};

/// Loads `config/default.*` (optional) and `ROOMCAST__SECTION__KEY`
/// environment variables, merged over `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("ROOMCAST")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let store = partial.store;
    let bus = partial.bus;
    let rooms = partial.rooms;
    let log = partial.log;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        store: StoreSettings {
            backend: store
                .as_ref()
                .and_then(|s| s.backend.clone())
                .unwrap_or(default.store.backend),
            path: store
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.store.path),
            url: store
                .as_ref()
                .and_then(|s| s.url.clone())
                .unwrap_or(default.store.url),
            op_timeout_ms: store
                .as_ref()
                .and_then(|s| s.op_timeout_ms)
                .unwrap_or(default.store.op_timeout_ms),
        },
        bus: BusSettings {
            backend: bus
                .as_ref()
                .and_then(|b| b.backend.clone())
                .unwrap_or(default.bus.backend),
            url: bus
                .as_ref()
                .and_then(|b| b.url.clone())
                .unwrap_or(default.bus.url),
            buffer_size: bus
                .as_ref()
                .and_then(|b| b.buffer_size)
                .unwrap_or(default.bus.buffer_size),
        },
        rooms: RoomSettings {
            close_grace_ms: rooms
                .as_ref()
                .and_then(|r| r.close_grace_ms)
                .unwrap_or(default.rooms.close_grace_ms),
            default_page_size: rooms
                .as_ref()
                .and_then(|r| r.default_page_size)
                .unwrap_or(default.rooms.default_page_size),
        },
        content: partial.content.unwrap_or(default.content),
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    }
}
