//! Rooms
//!
//! Orchestration built on the store, presence tracker and hub:
//! - `lifecycle`: creating rooms for existing content and tearing them down
//! - `directory`: the paginated room listing
//! - `service`: the call surface transport adapters use

pub mod directory;
pub mod lifecycle;
pub mod service;

pub use directory::{RoomDirectory, RoomPage, RoomSummary};
pub use lifecycle::{ReleaseOutcome, RoomLifecycleManager};
pub use service::ChatService;
