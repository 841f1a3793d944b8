//! In-process room store.
//!
//! All three maps sit behind one mutex, so each trait call is atomic with
//! respect to every other call on the same store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Room, RoomId, RoomStore, SessionId};
use crate::utils::Result;

#[derive(Debug, Default)]
struct State {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<SessionId, RoomId>,
    counts: HashMap<RoomId, u64>,
}

#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    state: Mutex<State>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        Ok(self.state().rooms.get(room_id).cloned())
    }

    async fn put_room(&self, room: &Room) -> Result<()> {
        self.state().rooms.insert(room.room_id.clone(), room.clone());
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.state().rooms.remove(room_id);
        Ok(())
    }

    async fn list_room_ids(&self) -> Result<HashSet<RoomId>> {
        Ok(self.state().rooms.keys().cloned().collect())
    }

    async fn get_membership(&self, session_id: &str) -> Result<Option<RoomId>> {
        Ok(self.state().memberships.get(session_id).cloned())
    }

    async fn set_membership(&self, session_id: &str, room_id: &str) -> Result<()> {
        self.state()
            .memberships
            .insert(session_id.to_string(), room_id.to_string());
        Ok(())
    }

    async fn set_membership_if_absent(&self, session_id: &str, room_id: &str) -> Result<bool> {
        let mut state = self.state();
        if state.memberships.contains_key(session_id) {
            return Ok(false);
        }
        state
            .memberships
            .insert(session_id.to_string(), room_id.to_string());
        Ok(true)
    }

    async fn clear_membership(&self, session_id: &str) -> Result<bool> {
        Ok(self.state().memberships.remove(session_id).is_some())
    }

    async fn get_count(&self, room_id: &str) -> Result<u64> {
        Ok(self.state().counts.get(room_id).copied().unwrap_or(0))
    }

    async fn increment(&self, room_id: &str) -> Result<u64> {
        let mut state = self.state();
        let count = state.counts.entry(room_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement(&self, room_id: &str) -> Result<u64> {
        let mut state = self.state();
        match state.counts.get_mut(room_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                Ok(*count)
            }
            None => Ok(0),
        }
    }

    async fn delete_counter(&self, room_id: &str) -> Result<()> {
        self.state().counts.remove(room_id);
        Ok(())
    }
}
