//! The `utils` module provides shared definitions used across `roomcast`:
//! the error taxonomy returned by every component and logging setup.

pub mod error;
pub mod logging;

pub use error::{ChatError, Result};
