//! # Roomcast
//!
//! `roomcast` hosts ephemeral chat rooms tied to content items. Clients join
//! the room of a content item over a WebSocket, exchange messages with the
//! other occupants, and the room disappears once the last one leaves.
//!
//! ## Core Modules
//!
//! - `store`: Shared registry of rooms, session memberships and occupancy counters
//!   (memory, sled or Redis).
//! - `bus`: Publish/subscribe primitive carrying room messages between processes (local or Redis).
//! - `presence`: Join/leave accounting on top of the store.
//! - `hub`: Per-process room subscriptions and fan-out to local handlers.
//! - `rooms`: Room lifecycle, the paged room directory and the `ChatService` facade.
//! - `content`: The content catalog rooms are created for.
//! - `client`: Represents a connected WebSocket client.
//! - `config`: Handles loading and managing server configuration.
//! - `transport`: Manages the WebSocket server and communication with clients.
//! - `utils`: Error taxonomy and logging setup.

pub mod bus;
pub mod client;
pub mod config;
pub mod content;
pub mod hub;
pub mod presence;
pub mod rooms;
pub mod store;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests;
