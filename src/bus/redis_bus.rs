//! Bus backed by Redis PUBLISH/SUBSCRIBE.
//!
//! Every subscription opens its own pub/sub connection; publishes share one
//! multiplexed connection. Redis pub/sub is at-most-once: messages published
//! while a subscriber is disconnected are lost.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::{BusStream, MessageBus};
use crate::utils::{ChatError, Result};

pub struct RedisBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

fn unavailable(err: redis::RedisError) -> ChatError {
    ChatError::BusUnavailable(err.to_string())
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        tracing::info!(url, "Connected to Redis message bus");

        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn subscribe(&self, topic: &str) -> Result<BusStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(unavailable)?;
        pubsub.subscribe(topic).await.map_err(unavailable)?;

        let topic = topic.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Dropping undecodable bus payload");
                    None
                }
            };
            futures::future::ready(payload)
        });

        Ok(Box::pin(stream))
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let mut conn = self.publisher.clone();
        let _: () = conn.publish(topic, payload).await.map_err(unavailable)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus").finish_non_exhaustive()
    }
}
