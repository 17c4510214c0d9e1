//! Channel plugin system.
//!
//! Each channel implements the [`ChannelPlugin`] trait and hands out a
//! [`ChannelOutbound`] used by the host to deliver replies.

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{ChannelOutbound, ChannelPlugin, ChannelType},
};
