//! The `transport` module is responsible for handling network communication
//! with clients, primarily via WebSockets.
//!
//! It defines the JSON protocol used between clients and the server, and
//! implements the WebSocket server itself: one chat session per connection,
//! requests forwarded to the `ChatService`.

pub mod message;
pub mod websocket;
