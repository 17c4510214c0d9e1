//! Shared types and error helpers used by the channel crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
