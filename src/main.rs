use std::sync::Arc;

use roomcast::bus::open_bus;
use roomcast::config::load_config;
use roomcast::content::{ContentCatalog, MemoryCatalog};
use roomcast::hub::BroadcastHub;
use roomcast::rooms::ChatService;
use roomcast::store::open_store;
use roomcast::transport::websocket::start_websocket_server;
use roomcast::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run_server().await {
        logging::init("info");
        error!("Server failed: {}", e);
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.log.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let store = open_store(&config.store).await?;
    let bus = open_bus(&config.bus).await?;
    let content: Arc<dyn ContentCatalog> = match &config.content.seed_path {
        Some(path) => Arc::new(MemoryCatalog::from_json_file(path)?),
        None => Arc::new(MemoryCatalog::new()),
    };

    let hub = Arc::new(BroadcastHub::new(bus));
    let service = ChatService::new(store, hub, content).configure(&config);

    tokio::select! {
        result = start_websocket_server(&addr, service) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}
