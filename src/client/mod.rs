//! The `client` module defines the representation of a connected client.
//!
//! A `Client` owns the session id assigned to its connection and the channel
//! feeding its WebSocket writer. It is also the `MessageHandler` the hub
//! delivers room messages to.

pub mod pubsub_client;
pub use pubsub_client::Client;
