//! The `error` module defines the error type returned by the room store,
//! the message bus and every layer built on top of them.
//!
//! Infrastructure failures (`StoreUnavailable`, `BusUnavailable`,
//! `CatalogUnavailable`, `Timeout`) are transient: callers may retry with
//! backoff or surface a service-unavailable condition. The remaining
//! variants describe a request that cannot succeed as issued.

use std::time::Duration;

use thiserror::Error;

use crate::store::{ContentId, RoomId, SessionId};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("room store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("content catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    #[error("session {0} is not in any room")]
    NotInRoom(SessionId),

    #[error("session {session_id} is already in room {room_id}")]
    AlreadyInRoom {
        session_id: SessionId,
        room_id: RoomId,
    },

    #[error("invalid page request: {0}")]
    InvalidPage(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChatError::StoreUnavailable(_)
                | ChatError::BusUnavailable(_)
                | ChatError::CatalogUnavailable(_)
                | ChatError::Timeout(_)
        )
    }

    /// Stable machine-readable code, sent to clients in error frames.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::StoreUnavailable(_) => "store_unavailable",
            ChatError::BusUnavailable(_) => "bus_unavailable",
            ChatError::CatalogUnavailable(_) => "catalog_unavailable",
            ChatError::Timeout(_) => "timeout",
            ChatError::RoomNotFound(_) => "room_not_found",
            ChatError::ContentNotFound(_) => "content_not_found",
            ChatError::NotInRoom(_) => "not_in_room",
            ChatError::AlreadyInRoom { .. } => "already_in_room",
            ChatError::InvalidPage(_) => "invalid_page",
            ChatError::Serialization(_) => "serialization",
        }
    }
}

impl From<sled::Error> for ChatError {
    fn from(err: sled::Error) -> Self {
        ChatError::StoreUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for ChatError {
    fn from(err: redis::RedisError) -> Self {
        ChatError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
