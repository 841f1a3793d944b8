//! In-process bus for single-node deployments.
//!
//! Each topic is a `tokio::sync::broadcast` channel. A receiver that falls
//! more than `buffer_size` messages behind skips the overflow, which is
//! logged and otherwise dropped. A topic's channel is removed when its last
//! subscription is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{BusStream, MessageBus};
use crate::utils::Result;

type Topics = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

fn lock(topics: &Topics) -> MutexGuard<'_, HashMap<String, broadcast::Sender<String>>> {
    topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct LocalBus {
    topics: Topics,
    buffer_size: usize,
}

impl LocalBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: Arc::default(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of open subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.topics)
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics with at least one open subscription.
    pub fn topic_count(&self) -> usize {
        lock(&self.topics).len()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// One receiver on a topic. Dropping the last one removes the topic.
struct Subscription {
    rx: Option<broadcast::Receiver<String>>,
    topic: String,
    topics: Topics,
}

impl Subscription {
    async fn next(&mut self) -> Option<String> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        topic = %self.topic,
                        skipped,
                        "Subscriber lagged, messages dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.rx.take());
        let mut topics = lock(&self.topics);
        if topics
            .get(&self.topic)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            topics.remove(&self.topic);
            tracing::trace!(topic = %self.topic, "Removed idle topic");
        }
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn subscribe(&self, topic: &str) -> Result<BusStream> {
        let rx = lock(&self.topics)
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe();

        let subscription = Subscription {
            rx: Some(rx),
            topic: topic.to_string(),
            topics: self.topics.clone(),
        };
        let stream = futures::stream::unfold(subscription, |mut subscription| async move {
            let payload = subscription.next().await?;
            Some((payload, subscription))
        });

        Ok(Box::pin(stream))
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        let topics = lock(&self.topics);
        match topics.get(topic) {
            // A send error only means nobody is listening right now.
            Some(tx) => {
                let _ = tx.send(payload);
            }
            None => tracing::trace!(topic, "Publish to topic without subscribers"),
        }
        Ok(())
    }
}
