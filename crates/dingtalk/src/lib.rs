//! DingTalk channel plugin for moltis.
//!
//! Outbound delivery to DingTalk robots: replies go through the per-message
//! session webhook, proactive sends to users and groups go through the
//! OpenAPI, and failed media sends degrade to a visible link text.

pub mod auth;
pub mod client;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod markdown;
pub mod media;
pub mod message;
pub mod outbound;
pub mod plugin;
pub mod proactive;
pub mod state;
pub mod target;
pub mod webhook;
pub mod webhook_cache;

pub use {
    client::{DeliveryResult, DingTalkClient},
    config::{DingTalkAccountConfig, DingTalkCredentials, resolve_credentials},
    dispatch::DeliveryDispatcher,
    error::{Error, Result},
    plugin::DingTalkPlugin,
    target::{DeliveryTarget, classify},
    webhook_cache::SessionWebhookCache,
};
