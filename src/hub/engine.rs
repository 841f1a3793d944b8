//! Hub engine
//!
//! Concurrency and usage notes:
//! - The subscription table sits behind a single async mutex covering
//!   subscribe, unsubscribe and close. Opening a room's bus subscription
//!   happens while that lock is held, so two local handlers racing into the
//!   same room still produce one subscription.
//! - `publish` never touches the table: every message goes through the bus,
//!   including messages only local handlers will see, so all processes
//!   observe a room's messages in the same order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::channel::{HandlerId, RoomChannel};
use super::{ChatMessage, MessageHandler};
use crate::bus::MessageBus;
use crate::store::RoomId;
use crate::store::keys::room_topic;
use crate::utils::Result;

pub struct BroadcastHub {
    bus: Arc<dyn MessageBus>,
    channels: Mutex<HashMap<RoomId, RoomChannel>>,
}

impl BroadcastHub {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `handler` for the room's messages, opening the room's bus
    /// subscription if this process has none yet. On failure nothing is
    /// registered.
    pub async fn subscribe(
        &self,
        room_id: &str,
        handler_id: impl Into<HandlerId>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        let handler_id = handler_id.into();
        let mut channels = self.channels.lock().await;

        if let Some(channel) = channels.get(room_id) {
            channel.add(handler_id.clone(), handler);
            tracing::debug!(
                room = room_id,
                handler = %handler_id,
                handlers = channel.len(),
                "Handler added"
            );
            return Ok(());
        }

        let stream = self.bus.subscribe(&room_topic(room_id)).await?;
        let channel = RoomChannel::open(room_id, stream);
        channel.add(handler_id.clone(), handler);
        channels.insert(room_id.to_string(), channel);

        tracing::info!(room = room_id, handler = %handler_id, "Opened room subscription");
        Ok(())
    }

    /// Removes a handler. The last handler of a room closes its bus
    /// subscription. Returns whether the handler was registered.
    pub async fn unsubscribe(&self, room_id: &str, handler_id: &str) -> bool {
        let mut channels = self.channels.lock().await;

        let Some(channel) = channels.get(room_id) else {
            return false;
        };
        let removed = channel.remove(handler_id);

        if channel.is_empty() {
            if let Some(channel) = channels.remove(room_id) {
                channel.close().await;
                tracing::info!(room = room_id, "Closed room subscription");
            }
        }

        removed
    }

    /// Removes a handler from every room it is registered in, closing the
    /// subscriptions left without handlers. Returns the rooms it left.
    pub async fn cleanup_handler(&self, handler_id: &str) -> Vec<RoomId> {
        let mut channels = self.channels.lock().await;
        let mut left = Vec::new();
        let mut emptied = Vec::new();

        for (room_id, channel) in channels.iter() {
            if channel.remove(handler_id) {
                left.push(room_id.clone());
            }
            if channel.is_empty() {
                emptied.push(room_id.clone());
            }
        }

        for room_id in emptied {
            if let Some(channel) = channels.remove(&room_id) {
                channel.close().await;
                tracing::info!(room = %room_id, "Closed room subscription");
            }
        }

        tracing::debug!(handler = handler_id, rooms = left.len(), "Cleaned up handler");
        left
    }

    /// Drops every local handler of the room along with its subscription.
    /// Returns the number of handlers dropped.
    pub async fn close_room(&self, room_id: &str) -> usize {
        let mut channels = self.channels.lock().await;

        match channels.remove(room_id) {
            Some(channel) => {
                let dropped = channel.len();
                channel.close().await;
                tracing::info!(room = room_id, dropped, "Closed room subscription");
                dropped
            }
            None => 0,
        }
    }

    /// Sends `message` to its room's bus topic. Local handlers receive it
    /// once the bus delivers it back.
    pub async fn publish(&self, message: &ChatMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.bus.publish(&room_topic(&message.room_id), json).await?;

        tracing::debug!(room = %message.room_id, sender = %message.sender, "Published message");
        Ok(())
    }

    /// Number of rooms with an open bus subscription in this process.
    pub async fn subscription_count(&self) -> usize {
        self.channels.lock().await.len()
    }

    pub async fn is_subscribed(&self, room_id: &str) -> bool {
        self.channels.lock().await.contains_key(room_id)
    }

    pub async fn handler_count(&self, room_id: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(room_id)
            .map(RoomChannel::len)
            .unwrap_or(0)
    }

    pub async fn has_handler(&self, room_id: &str, handler_id: &str) -> bool {
        self.channels
            .lock()
            .await
            .get(room_id)
            .is_some_and(|channel| channel.contains(handler_id))
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub").finish_non_exhaustive()
    }
}
