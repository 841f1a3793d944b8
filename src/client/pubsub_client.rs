use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::hub::{ChatMessage, MessageHandler};
use crate::store::SessionId;
use crate::transport::message::ServerMessage;

/// Represents a connected WebSocket client.
#[derive(Debug)]
pub struct Client {
    /// Session identifier, unique per connection.
    pub id: SessionId,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            sender,
        }
    }

    /// Queues `message` for the client. Returns `false` if the connection's
    /// writer is gone.
    pub fn send(&self, message: &ServerMessage) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(
                    session = %self.id,
                    error = %e,
                    "Failed to serialize server message"
                );
                return false;
            }
        };

        match self.sender.send(WsMessage::text(text)) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(session = %self.id, "Client writer closed");
                false
            }
        }
    }
}

impl MessageHandler for Client {
    fn on_message(&self, _room_id: &str, message: &ChatMessage) {
        self.send(&ServerMessage::Message(message.clone()));
    }
}
