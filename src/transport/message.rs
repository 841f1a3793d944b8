use serde::{Deserialize, Serialize};

use crate::hub::ChatMessage;
use crate::rooms::RoomPage;
use crate::store::{ContentId, RoomId};
use crate::utils::ChatError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { content_id: ContentId },

    #[serde(rename = "leave")]
    Leave,

    #[serde(rename = "send")]
    Send { payload: String },

    /// Missing fields fall back to the first page and the configured size.
    #[serde(rename = "list_rooms")]
    ListRooms {
        page: Option<usize>,
        size: Option<usize>,
    },

    #[serde(rename = "chat_active")]
    ChatActive { content_id: ContentId },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "joined")]
    Joined { room_id: RoomId, occupancy: u64 },

    #[serde(rename = "left")]
    Left { room_id: RoomId, occupancy: u64 },

    #[serde(rename = "not_in_room")]
    NotInRoom {},

    #[serde(rename = "message")]
    Message(ChatMessage),

    #[serde(rename = "rooms")]
    Rooms(RoomPage),

    #[serde(rename = "chat_active")]
    ChatActive { content_id: ContentId, active: bool },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl From<&ChatError> for ServerMessage {
    fn from(err: &ChatError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
