//! Room lifecycle
//!
//! A room moves `Absent -> Active -> Absent`. It is created the first time a
//! session asks to join the chat of an existing content item and removed
//! when the last session leaves or an administrator closes it.
//!
//! Nothing polls: the service calls `release_if_empty` when a leave brings
//! occupancy to zero. With a grace window configured, the close is deferred
//! by that long and skipped if someone rejoined in the meantime.
//!
//! Joins and empty-room closes of the same room are serialised in-process
//! through a striped set of admission gates. A join holds the room's gate
//! from `ensure_room` until its membership is counted, and the close checks
//! occupancy under the same gate, so a room is never torn down under a
//! join that is still in flight.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::MAX_CLOSE_GRACE_MS;
use crate::content::ContentCatalog;
use crate::hub::BroadcastHub;
use crate::store::{ContentId, Room, RoomStore, room_id_for};
use crate::utils::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The room was empty and has been closed.
    Closed,
    /// A delayed recheck has been scheduled.
    Deferred,
    /// Someone is still (or again) in the room.
    StillOccupied,
}

const GATE_STRIPES: usize = 64;

/// Fixed set of async mutexes; a room id always maps to the same one.
struct AdmissionGates {
    stripes: Vec<Mutex<()>>,
}

impl AdmissionGates {
    fn new() -> Self {
        Self {
            stripes: (0..GATE_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock(&self, room_id: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        room_id.hash(&mut hasher);
        let stripe = (hasher.finish() % GATE_STRIPES as u64) as usize;
        self.stripes[stripe].lock().await
    }
}

#[derive(Clone)]
pub struct RoomLifecycleManager {
    store: Arc<dyn RoomStore>,
    hub: Arc<BroadcastHub>,
    content: Arc<dyn ContentCatalog>,
    gates: Arc<AdmissionGates>,
    close_grace: Duration,
}

impl RoomLifecycleManager {
    pub fn new(
        store: Arc<dyn RoomStore>,
        hub: Arc<BroadcastHub>,
        content: Arc<dyn ContentCatalog>,
    ) -> Self {
        Self {
            store,
            hub,
            content,
            gates: Arc::new(AdmissionGates::new()),
            close_grace: Duration::ZERO,
        }
    }

    /// Keep empty rooms for `grace` before closing them, capped at
    /// `MAX_CLOSE_GRACE_MS`.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace.min(Duration::from_millis(MAX_CLOSE_GRACE_MS));
        self
    }

    pub fn close_grace(&self) -> Duration {
        self.close_grace
    }

    /// Holds off empty-room closes of `room_id` while the guard lives. Not
    /// reentrant: release it before calling `release_if_empty` or
    /// `close_room` for the same room.
    pub async fn admit(&self, room_id: &str) -> MutexGuard<'_, ()> {
        self.gates.lock(room_id).await
    }

    /// Returns the content item's room, creating it if needed. Fails with
    /// `ContentNotFound`, writing nothing, if the content does not exist.
    pub async fn ensure_room(&self, content_id: ContentId) -> Result<Room> {
        let room_id = room_id_for(content_id);
        if let Some(room) = self.store.get_room(&room_id).await? {
            return Ok(room);
        }

        if !self.content.exists(content_id).await? {
            return Err(ChatError::ContentNotFound(content_id));
        }

        let room = Room::create(content_id);
        self.store.put_room(&room).await?;
        tracing::info!(room = %room.room_id, "Room created");
        Ok(room)
    }

    /// Fails with `RoomNotFound` if the room is not active.
    pub async fn get_room(&self, room_id: &str) -> Result<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))
    }

    /// Whether the content item currently has an active room.
    pub async fn is_active(&self, content_id: ContentId) -> Result<bool> {
        Ok(self.store.get_room(&room_id_for(content_id)).await?.is_some())
    }

    /// Deletes the room and its counter and drops this process's
    /// subscription. Closing an absent room is a no-op.
    pub async fn close_room(&self, room_id: &str) -> Result<()> {
        let _gate = self.admit(room_id).await;
        self.remove_room(room_id).await
    }

    async fn remove_room(&self, room_id: &str) -> Result<()> {
        self.store.delete_room(room_id).await?;
        self.store.delete_counter(room_id).await?;
        let dropped = self.hub.close_room(room_id).await;

        tracing::info!(room = room_id, dropped_handlers = dropped, "Room closed");
        Ok(())
    }

    /// Closes the room if nobody is in it, immediately or after the grace
    /// window.
    pub async fn release_if_empty(&self, room_id: &str) -> Result<ReleaseOutcome> {
        if !self.close_grace.is_zero() {
            let manager = self.clone();
            let owned_room_id = room_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(manager.close_grace).await;
                if let Err(e) = manager.close_if_empty(&owned_room_id).await {
                    tracing::warn!(room = %owned_room_id, error = %e, "Deferred room close failed");
                }
            });
            let grace_ms = self.close_grace.as_millis() as u64;
            tracing::debug!(room = room_id, grace_ms, "Room close deferred");
            return Ok(ReleaseOutcome::Deferred);
        }

        self.close_if_empty(room_id).await
    }

    async fn close_if_empty(&self, room_id: &str) -> Result<ReleaseOutcome> {
        let _gate = self.admit(room_id).await;
        if self.store.get_count(room_id).await? > 0 {
            return Ok(ReleaseOutcome::StillOccupied);
        }
        self.remove_room(room_id).await?;
        Ok(ReleaseOutcome::Closed)
    }
}

impl std::fmt::Debug for RoomLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomLifecycleManager")
            .field("close_grace", &self.close_grace)
            .finish_non_exhaustive()
    }
}
