//! Broadcast hub
//!
//! The process-local side of room messaging. For every room with at least
//! one local handler the hub keeps exactly one bus subscription and fans
//! each delivered message out to the registered handlers.
//!
//! Public types:
//! - `BroadcastHub`: subscribe/unsubscribe handlers, publish messages.
//! - `ChatMessage`: the payload carried on the bus.
//! - `MessageHandler`: delivery callback implemented by transports.

pub mod channel;
pub mod engine;
pub mod message;

pub use channel::HandlerId;
pub use engine::BroadcastHub;
pub use message::{ChatMessage, MessageKind};

/// Receives the messages of the rooms it is subscribed to.
///
/// Called from the room's delivery task, in bus order. Implementations
/// should hand the message off (for example to a channel) rather than block.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, room_id: &str, message: &ChatMessage);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &ChatMessage) + Send + Sync,
{
    fn on_message(&self, room_id: &str, message: &ChatMessage) {
        self(room_id, message)
    }
}

#[cfg(test)]
mod tests;
