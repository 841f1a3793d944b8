//! Message bus
//!
//! The publish/subscribe primitive carrying room messages between
//! processes. A subscription is a stream of raw payloads; dropping the
//! stream closes the subscription.
//!
//! Both backends deliver at most once and in publish order per topic.

pub mod local;
pub mod redis_bus;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::BusSettings;
use crate::utils::Result;

pub use local::LocalBus;
pub use redis_bus::RedisBus;

/// An open subscription to one topic.
pub type BusStream = BoxStream<'static, String>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Fails with `ChatError::BusUnavailable` if the subscription cannot be
    /// opened.
    async fn subscribe(&self, topic: &str) -> Result<BusStream>;

    /// Fails with `ChatError::BusUnavailable`; never buffers or retries.
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

/// Opens the backend named in `settings.backend`.
pub async fn open_bus(settings: &BusSettings) -> Result<Arc<dyn MessageBus>> {
    let bus: Arc<dyn MessageBus> = match settings.backend.as_str() {
        "redis" => Arc::new(RedisBus::connect(&settings.url).await?),
        "local" => Arc::new(LocalBus::new(settings.buffer_size)),
        other => {
            tracing::warn!(backend = other, "Unknown bus backend, using local");
            Arc::new(LocalBus::new(settings.buffer_size))
        }
    };

    tracing::info!(backend = %settings.backend, "Message bus ready");
    Ok(bus)
}

#[cfg(test)]
mod tests;
