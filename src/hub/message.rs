//! Message definitions for the hub
//!
//! `ChatMessage` is serialized to JSON on the bus and handed to every
//! handler of the room. `timestamp` is milliseconds since the UNIX epoch and
//! `message_id` an opaque UUID; neither is used for deduplication.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Enter,
    Talk,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: String,
    pub sender: String,
    pub kind: MessageKind,
    pub payload: String,
    pub timestamp: i64,
    pub message_id: String,
}

impl ChatMessage {
    pub fn new(room_id: &str, sender: &str, kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            kind,
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            message_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn talk(room_id: &str, sender: &str, payload: impl Into<String>) -> Self {
        Self::new(room_id, sender, MessageKind::Talk, payload)
    }
}
