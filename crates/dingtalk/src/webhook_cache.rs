//! Time-bounded cache of session webhooks per conversation.
//!
//! Populated by the inbound path on every message; read when a reply must be
//! sent without a live webhook in hand. Expired entries are never returned
//! but stay stored until overwritten.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::config::DEFAULT_WEBHOOK_TTL_SECS;

#[derive(Debug, Clone)]
struct CachedWebhook {
    url: String,
    /// Unix epoch milliseconds.
    expires_at: i64,
}

/// Conversation ID to most recent session webhook.
#[derive(Debug)]
pub struct SessionWebhookCache {
    entries: RwLock<HashMap<String, CachedWebhook>>,
    default_ttl: Duration,
}

fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl SessionWebhookCache {
    pub fn new() -> Self {
        Self::with_default_ttl(Duration::from_secs(DEFAULT_WEBHOOK_TTL_SECS))
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store the webhook for a conversation, expiring `ttl` from now
    /// (the cache default when `None`). Overwrites any previous entry.
    pub fn remember(&self, conversation_id: &str, url: &str, ttl: Option<Duration>) {
        self.remember_at(conversation_id, url, ttl, unix_now_ms());
    }

    /// Store the webhook with an absolute expiry in epoch milliseconds, as
    /// carried by inbound events (`sessionWebhookExpiredTime`).
    pub fn remember_until(&self, conversation_id: &str, url: &str, expires_at_ms: i64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(conversation_id.to_string(), CachedWebhook {
            url: url.to_string(),
            expires_at: expires_at_ms,
        });
    }

    /// Live webhook for `conversation_id`, or else the freshest live webhook
    /// across all conversations.
    pub fn recall(&self, conversation_id: Option<&str>) -> Option<String> {
        self.recall_at(conversation_id, unix_now_ms())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember_at(&self, conversation_id: &str, url: &str, ttl: Option<Duration>, now: i64) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.remember_until(conversation_id, url, now.saturating_add(ttl_ms));
    }

    fn recall_at(&self, conversation_id: Option<&str>, now: i64) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = conversation_id
            && let Some(entry) = entries.get(id)
            && entry.expires_at > now
        {
            return Some(entry.url.clone());
        }
        entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .max_by_key(|entry| entry.expires_at)
            .map(|entry| entry.url.clone())
    }
}

impl Default for SessionWebhookCache {
    fn default() -> Self {
        Self::new()
    }
}
