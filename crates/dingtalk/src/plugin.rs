use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    tracing::{info, warn},
};

use moltis_channels::{
    Error as ChannelError,
    plugin::{ChannelOutbound, ChannelPlugin, ChannelType},
};

use crate::{
    config::{DingTalkAccountConfig, resolve_credentials},
    dispatch::DeliveryDispatcher,
    error::Error,
    message::MessageComposer,
    outbound::DingTalkOutbound,
    state::{AccountState, AccountStateMap},
    webhook_cache::SessionWebhookCache,
};

/// DingTalk channel plugin.
pub struct DingTalkPlugin {
    accounts: AccountStateMap,
    outbound: DingTalkOutbound,
    http: reqwest::Client,
}

impl DingTalkPlugin {
    pub fn new() -> Self {
        let accounts: AccountStateMap = Arc::new(RwLock::new(HashMap::new()));
        let outbound = DingTalkOutbound {
            accounts: Arc::clone(&accounts),
        };
        Self {
            accounts,
            outbound,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn shared_outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::new(DingTalkOutbound {
            accounts: Arc::clone(&self.accounts),
        })
    }

    pub fn account_ids(&self) -> Vec<String> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts.keys().cloned().collect()
    }

    pub fn has_account(&self, account_id: &str) -> bool {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts.contains_key(account_id)
    }

    /// Record the session webhook carried by an inbound message.
    ///
    /// `expires_at_ms` is the event's absolute expiry; without it the
    /// account's `webhook_ttl_secs` applies.
    pub fn remember_session_webhook(
        &self,
        account_id: &str,
        conversation_id: &str,
        url: &str,
        expires_at_ms: Option<i64>,
    ) -> Result<()> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let state = accounts
            .get(account_id)
            .ok_or_else(|| ChannelError::unknown_account(account_id))?;
        match expires_at_ms {
            Some(expires_at) => state.webhooks.remember_until(conversation_id, url, expires_at),
            None => state.webhooks.remember(conversation_id, url, None),
        }
        Ok(())
    }
}

impl Default for DingTalkPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for DingTalkPlugin {
    fn id(&self) -> &str {
        ChannelType::DingTalk.as_str()
    }

    fn name(&self) -> &str {
        "DingTalk"
    }

    async fn start_account(&mut self, account_id: &str, config: serde_json::Value) -> Result<()> {
        let cfg: DingTalkAccountConfig = serde_json::from_value(config)?;
        if !cfg.enabled {
            info!(account_id, "dingtalk account disabled, not starting");
            return Ok(());
        }
        let credentials = resolve_credentials(&cfg).ok_or(Error::MissingCredentials)?;

        let dispatcher = DeliveryDispatcher::new(self.http.clone(), &cfg.api_base).with_composer(
            MessageComposer::new(cfg.markdown.table_mode, cfg.render_mode),
        );
        let webhooks =
            SessionWebhookCache::with_default_ttl(Duration::from_secs(cfg.webhook_ttl_secs));

        info!(account_id, app_key = %credentials.app_key, "starting dingtalk account");
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(account_id.to_string(), AccountState {
            account_id: account_id.to_string(),
            config: cfg,
            credentials,
            dispatcher: Arc::new(dispatcher),
            webhooks: Arc::new(webhooks),
        });
        Ok(())
    }

    async fn stop_account(&mut self, account_id: &str) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        if accounts.remove(account_id).is_none() {
            warn!(account_id, "DingTalk account not found");
        } else {
            info!(account_id, "stopped dingtalk account");
        }
        Ok(())
    }

    fn outbound(&self) -> Option<&dyn ChannelOutbound> {
        Some(&self.outbound)
    }
}
