//! Room store backed by `sled`
//!
//! An embedded, durable backend for single-process deployments. Each kind
//! of state lives in its own tree, named after the shared key layout:
//! - `CHAT_ROOM`: room id -> JSON encoded `Room`
//! - `ENTER_INFO`: session id -> room id
//! - `USER_COUNT`: room id -> big-endian `u64`
//!
//! Counter updates go through `update_and_fetch`, which retries a
//! compare-and-swap internally, so concurrent joins and leaves on the same
//! room never lose an update.

use std::collections::HashSet;

use async_trait::async_trait;
use sled::{Db, Tree};

use super::keys::{CHAT_ROOMS, ENTER_INFO, USER_COUNT};
use super::{Room, RoomId, RoomStore};
use crate::utils::{ChatError, Result};

#[derive(Clone)]
pub struct SledRoomStore {
    rooms: Tree,
    memberships: Tree,
    counts: Tree,
}

impl SledRoomStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Builds the store on an already opened database.
    pub fn with_db(db: Db) -> Result<Self> {
        Ok(Self {
            rooms: db.open_tree(CHAT_ROOMS)?,
            memberships: db.open_tree(ENTER_INFO)?,
            counts: db.open_tree(USER_COUNT)?,
        })
    }
}

fn decode_count(bytes: &[u8]) -> Result<u64> {
    <[u8; 8]>::try_from(bytes).map(u64::from_be_bytes).map_err(|_| {
        ChatError::StoreUnavailable(format!("corrupt counter of {} bytes", bytes.len()))
    })
}

/// Applies `step` to a stored counter. A corrupt value is written back
/// unchanged so the caller's decode reports it.
fn step_count(raw: &[u8], step: impl Fn(u64) -> u64) -> Vec<u8> {
    match decode_count(raw) {
        Ok(count) => step(count).to_be_bytes().to_vec(),
        Err(_) => raw.to_vec(),
    }
}

fn decode_room_id(bytes: &[u8]) -> Result<RoomId> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ChatError::StoreUnavailable(format!("corrupt room id: {e}")))
}

#[async_trait]
impl RoomStore for SledRoomStore {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        match self.rooms.get(room_id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_room(&self, room: &Room) -> Result<()> {
        let serialized = serde_json::to_vec(room)?;
        self.rooms.insert(room.room_id.as_bytes(), serialized)?;
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.rooms.remove(room_id)?;
        Ok(())
    }

    async fn list_room_ids(&self) -> Result<HashSet<RoomId>> {
        self.rooms
            .iter()
            .keys()
            .map(|key| decode_room_id(&key?))
            .collect()
    }

    async fn get_membership(&self, session_id: &str) -> Result<Option<RoomId>> {
        match self.memberships.get(session_id)? {
            Some(raw) => Ok(Some(decode_room_id(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_membership(&self, session_id: &str, room_id: &str) -> Result<()> {
        self.memberships.insert(session_id, room_id.as_bytes())?;
        Ok(())
    }

    async fn set_membership_if_absent(&self, session_id: &str, room_id: &str) -> Result<bool> {
        let swapped =
            self.memberships
                .compare_and_swap(session_id, None::<&[u8]>, Some(room_id.as_bytes()))?;
        Ok(swapped.is_ok())
    }

    async fn clear_membership(&self, session_id: &str) -> Result<bool> {
        Ok(self.memberships.remove(session_id)?.is_some())
    }

    async fn get_count(&self, room_id: &str) -> Result<u64> {
        match self.counts.get(room_id)? {
            Some(raw) => decode_count(&raw),
            None => Ok(0),
        }
    }

    async fn increment(&self, room_id: &str) -> Result<u64> {
        let updated = self.counts.update_and_fetch(room_id, |old| {
            Some(match old {
                Some(raw) => step_count(raw, |count| count.saturating_add(1)),
                None => 1u64.to_be_bytes().to_vec(),
            })
        })?;
        match updated {
            Some(raw) => decode_count(&raw),
            None => Ok(0),
        }
    }

    async fn decrement(&self, room_id: &str) -> Result<u64> {
        let updated = self.counts.update_and_fetch(room_id, |old| {
            old.map(|raw| step_count(raw, |count| count.saturating_sub(1)))
        })?;
        match updated {
            Some(raw) => decode_count(&raw),
            None => Ok(0),
        }
    }

    async fn delete_counter(&self, room_id: &str) -> Result<()> {
        self.counts.remove(room_id)?;
        Ok(())
    }
}

impl std::fmt::Debug for SledRoomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRoomStore")
            .field("rooms", &self.rooms.len())
            .field("sessions", &self.memberships.len())
            .finish()
    }
}
