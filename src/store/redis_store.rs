//! Room store backed by Redis
//!
//! The shared backend every process instance talks to. Rooms and
//! memberships are hash fields, occupancy counters are plain integer keys:
//! - `HSET CHAT_ROOM <roomId> <json>`
//! - `HSET ENTER_INFO <sessionId> <roomId>`
//! - `INCR USER_COUNT_<roomId>`
//!
//! Each operation is a single Redis command, or a single Lua script for the
//! floored decrement, so no update is computed in application code.

use std::collections::HashSet;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

use super::keys::{CHAT_ROOMS, ENTER_INFO, user_count_key};
use super::{Room, RoomId, RoomStore};
use crate::utils::Result;

/// Decrements a counter without ever storing a negative value. An absent
/// key is left absent.
const DECREMENT_FLOORED: &str = r"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
if tonumber(current) <= 0 then
  redis.call('SET', KEYS[1], 0)
  return 0
end
return redis.call('DECR', KEYS[1])
";

pub struct RedisRoomStore {
    conn: MultiplexedConnection,
    decrement: Script,
}

impl RedisRoomStore {
    /// Connects to the Redis server at `url` (for example
    /// `redis://127.0.0.1:6379/`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!(url, "Connected to Redis room store");

        Ok(Self {
            conn,
            decrement: Script::new(DECREMENT_FLOORED),
        })
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl RoomStore for RedisRoomStore {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(CHAT_ROOMS, room_id).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_room(&self, room: &Room) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(room)?;
        let _: () = conn.hset(CHAT_ROOMS, &room.room_id, json).await?;
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(CHAT_ROOMS, room_id).await?;
        Ok(())
    }

    async fn list_room_ids(&self) -> Result<HashSet<RoomId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.hkeys(CHAT_ROOMS).await?;
        Ok(ids.into_iter().collect())
    }

    async fn get_membership(&self, session_id: &str) -> Result<Option<RoomId>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(ENTER_INFO, session_id).await?)
    }

    async fn set_membership(&self, session_id: &str, room_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(ENTER_INFO, session_id, room_id).await?;
        Ok(())
    }

    async fn set_membership_if_absent(&self, session_id: &str, room_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.hset_nx(ENTER_INFO, session_id, room_id).await?)
    }

    async fn clear_membership(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.hdel(ENTER_INFO, session_id).await?;
        Ok(removed > 0)
    }

    async fn get_count(&self, room_id: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(user_count_key(room_id)).await?;
        Ok(count.map(to_count).unwrap_or(0))
    }

    async fn increment(&self, room_id: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(user_count_key(room_id), 1).await?;
        Ok(to_count(count))
    }

    async fn decrement(&self, room_id: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .decrement
            .key(user_count_key(room_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(to_count(count))
    }

    async fn delete_counter(&self, room_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(user_count_key(room_id)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisRoomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRoomStore")
            .field("conn", &"redis::aio::MultiplexedConnection")
            .finish()
    }
}
