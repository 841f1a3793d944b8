//! Presence tracking
//!
//! Join/leave accounting on top of the room store: which room each session
//! is in, and how many sessions each room holds. A session is in at most
//! one room; joining a different room requires leaving first.

use std::sync::Arc;

use serde::Serialize;

use crate::store::{RoomId, RoomStore};
use crate::utils::{ChatError, Result};

/// A room and its occupancy right after a join or leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    pub room_id: RoomId,
    pub occupancy: u64,
}

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn RoomStore>,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Records the session in `room_id` and returns the new occupancy.
    ///
    /// Re-joining the room the session is already in changes nothing and
    /// returns the current occupancy. Joining while mapped to another room
    /// fails with `AlreadyInRoom`.
    pub async fn join(&self, session_id: &str, room_id: &str) -> Result<u64> {
        loop {
            if self.store.set_membership_if_absent(session_id, room_id).await? {
                let occupancy = self.store.increment(room_id).await?;
                tracing::info!(session = session_id, room = room_id, occupancy, "Session joined");
                return Ok(occupancy);
            }

            match self.store.get_membership(session_id).await? {
                Some(current) if current == room_id => {
                    tracing::debug!(
                        session = session_id,
                        room = room_id,
                        "Session already in room"
                    );
                    return self.store.get_count(room_id).await;
                }
                Some(current) => {
                    return Err(ChatError::AlreadyInRoom {
                        session_id: session_id.to_string(),
                        room_id: current,
                    });
                }
                // left between the two calls; claim again
                None => continue,
            }
        }
    }

    /// Removes the session from its room. Returns `None` when the session
    /// was not in any room (including a repeated leave).
    pub async fn leave(&self, session_id: &str) -> Result<Option<Presence>> {
        let Some(room_id) = self.store.get_membership(session_id).await? else {
            tracing::debug!(session = session_id, "Leave without membership ignored");
            return Ok(None);
        };

        if !self.store.clear_membership(session_id).await? {
            tracing::debug!(session = session_id, room = %room_id, "Membership already cleared");
            return Ok(None);
        }

        let occupancy = self.store.decrement(&room_id).await?;
        tracing::info!(session = session_id, room = %room_id, occupancy, "Session left");
        Ok(Some(Presence { room_id, occupancy }))
    }

    pub async fn occupancy(&self, room_id: &str) -> Result<u64> {
        self.store.get_count(room_id).await
    }

    /// The room the session is currently in.
    pub async fn room_of(&self, session_id: &str) -> Result<Option<RoomId>> {
        self.store.get_membership(session_id).await
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker").finish_non_exhaustive()
    }
}
