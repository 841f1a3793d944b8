//! Key layout shared by every process talking to the same store.

/// Hash of room id -> serialized `Room`.
pub const CHAT_ROOMS: &str = "CHAT_ROOM";

/// Hash of session id -> room id.
pub const ENTER_INFO: &str = "ENTER_INFO";

/// Prefix of the per-room occupancy counter keys.
pub const USER_COUNT: &str = "USER_COUNT";

pub fn user_count_key(room_id: &str) -> String {
    format!("{USER_COUNT}_{room_id}")
}

/// Bus topic carrying the messages of one room.
pub fn room_topic(room_id: &str) -> String {
    format!("chat:room:{room_id}")
}
