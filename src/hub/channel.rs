//! Room channel
//!
//! A `RoomChannel` is one open bus subscription plus the handlers it feeds.
//! The handler set is only mutated while the hub's table lock is held; the
//! delivery task takes a read snapshot per message.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{ChatMessage, MessageHandler};
use crate::bus::BusStream;
use crate::store::RoomId;

pub type HandlerId = String;

type Handlers = Arc<RwLock<HashMap<HandlerId, Arc<dyn MessageHandler>>>>;

pub struct RoomChannel {
    pub room_id: RoomId,
    handlers: Handlers,
    pump: JoinHandle<()>,
}

impl RoomChannel {
    /// Starts delivering `stream` to the (initially empty) handler set.
    pub fn open(room_id: &str, stream: BusStream) -> Self {
        let handlers: Handlers = Arc::default();
        let pump = tokio::spawn(deliver(room_id.to_string(), stream, handlers.clone()));

        Self {
            room_id: room_id.to_string(),
            handlers,
            pump,
        }
    }

    /// Adds or replaces a handler.
    pub fn add(&self, id: HandlerId, handler: Arc<dyn MessageHandler>) {
        write(&self.handlers).insert(id, handler);
    }

    pub fn remove(&self, id: &str) -> bool {
        write(&self.handlers).remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        read(&self.handlers).contains_key(id)
    }

    pub fn len(&self) -> usize {
        read(&self.handlers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops delivery and drops the bus subscription before returning.
    pub async fn close(self) {
        self.pump.abort();
        let _ = self.pump.await;
    }
}

impl std::fmt::Debug for RoomChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomChannel")
            .field("room_id", &self.room_id)
            .field("handlers", &self.len())
            .finish()
    }
}

fn read(handlers: &Handlers) -> RwLockReadGuard<'_, HashMap<HandlerId, Arc<dyn MessageHandler>>> {
    handlers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(handlers: &Handlers) -> RwLockWriteGuard<'_, HashMap<HandlerId, Arc<dyn MessageHandler>>> {
    handlers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn deliver(room_id: RoomId, mut stream: BusStream, handlers: Handlers) {
    while let Some(raw) = stream.next().await {
        let message: ChatMessage = match serde_json::from_str(&raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(room = %room_id, error = %e, "Dropping malformed bus message");
                continue;
            }
        };

        let targets: Vec<Arc<dyn MessageHandler>> = read(&handlers).values().cloned().collect();
        for handler in targets {
            handler.on_message(&room_id, &message);
        }
    }

    tracing::warn!(room = %room_id, "Bus subscription ended");
}
