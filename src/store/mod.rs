//! Room store
//!
//! The shared registry behind every room operation. It holds three kinds of
//! state, each mutated with single atomic operations:
//! - room id -> `Room` metadata
//! - session id -> room id (membership)
//! - room id -> occupancy counter (never negative)
//!
//! Components receive an `Arc<dyn RoomStore>` at construction, so the
//! backend can be the shared Redis store in production, sled for a durable
//! single-process deployment, or the in-memory store in tests.

pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod sled_store;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StoreSettings;
use crate::utils::Result;

pub use memory::MemoryRoomStore;
pub use redis_store::RedisRoomStore;
pub use sled_store::SledRoomStore;

pub type RoomId = String;
pub type SessionId = String;
pub type ContentId = u64;

/// Room identifiers are the decimal form of the owning content id.
pub fn room_id_for(content_id: ContentId) -> RoomId {
    content_id.to_string()
}

/// Metadata of an active chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub content_id: ContentId,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// A room for `content_id`, stamped with the current time.
    pub fn create(content_id: ContentId) -> Self {
        Self {
            room_id: room_id_for(content_id),
            content_id,
            created_at: Utc::now(),
        }
    }
}

/// Access to the shared room registry.
///
/// Every method fails with `ChatError::StoreUnavailable` when the backend
/// cannot be reached; implementations never turn such failures into
/// defaults.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>>;

    /// Idempotent upsert.
    async fn put_room(&self, room: &Room) -> Result<()>;

    /// Idempotent; deleting an absent room is not an error.
    async fn delete_room(&self, room_id: &str) -> Result<()>;

    /// Snapshot of active room ids, in no particular order.
    async fn list_room_ids(&self) -> Result<HashSet<RoomId>>;

    async fn get_membership(&self, session_id: &str) -> Result<Option<RoomId>>;

    async fn set_membership(&self, session_id: &str, room_id: &str) -> Result<()>;

    /// Records the membership only if the session has none. Returns `true`
    /// when this call created the mapping.
    async fn set_membership_if_absent(&self, session_id: &str, room_id: &str) -> Result<bool>;

    /// Returns `true` when a mapping existed and was removed by this call.
    async fn clear_membership(&self, session_id: &str) -> Result<bool>;

    /// Current occupancy, 0 when no counter exists.
    async fn get_count(&self, room_id: &str) -> Result<u64>;

    async fn increment(&self, room_id: &str) -> Result<u64>;

    /// Decrements, floored at zero. An absent counter stays absent.
    async fn decrement(&self, room_id: &str) -> Result<u64>;

    async fn delete_counter(&self, room_id: &str) -> Result<()>;
}

/// Opens the backend named in `settings.backend`.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn RoomStore>> {
    let store: Arc<dyn RoomStore> = match settings.backend.as_str() {
        "sled" => Arc::new(SledRoomStore::open(&settings.path)?),
        "redis" => Arc::new(RedisRoomStore::connect(&settings.url).await?),
        "memory" => Arc::new(MemoryRoomStore::new()),
        other => {
            tracing::warn!(backend = other, "Unknown store backend, using memory");
            Arc::new(MemoryRoomStore::new())
        }
    };

    tracing::info!(backend = %settings.backend, "Room store ready");
    Ok(store)
}
