use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait, tracing::debug};

use {
    moltis_channels::{Error as ChannelError, plugin::ChannelOutbound},
    moltis_common::types::ReplyPayload,
};

use crate::{
    config::DingTalkCredentials,
    dispatch::DeliveryDispatcher,
    markdown::chunk_markdown_text,
    media::decode_data_url,
    state::AccountStateMap,
    webhook_cache::SessionWebhookCache,
};

/// Prefix addressing a conversation through its cached session webhook.
pub const CONVERSATION_PREFIX: &str = "conversation:";

/// Outbound sender for DingTalk channel accounts.
pub struct DingTalkOutbound {
    pub(crate) accounts: AccountStateMap,
}

struct AccountSnapshot {
    credentials: DingTalkCredentials,
    dispatcher: Arc<DeliveryDispatcher>,
    webhooks: Arc<SessionWebhookCache>,
    text_chunk_limit: usize,
}

impl DingTalkOutbound {
    fn account_snapshot(&self, account_id: &str) -> Result<AccountSnapshot, ChannelError> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let state = accounts
            .get(account_id)
            .ok_or_else(|| ChannelError::unknown_account(account_id))?;
        Ok(AccountSnapshot {
            credentials: state.credentials.clone(),
            dispatcher: Arc::clone(&state.dispatcher),
            webhooks: Arc::clone(&state.webhooks),
            text_chunk_limit: state.config.text_chunk_limit,
        })
    }
}

impl AccountSnapshot {
    /// Destination string for the dispatcher. `conversation:<id>` and an
    /// empty `to` resolve to a cached session webhook.
    fn destination(&self, to: &str) -> Result<String, ChannelError> {
        let to = to.trim();
        let conversation = if to.is_empty() {
            None
        } else if let Some(id) = to.strip_prefix(CONVERSATION_PREFIX) {
            Some(id.trim())
        } else {
            return Ok(to.to_string());
        };
        self.webhooks.recall(conversation).ok_or_else(|| {
            ChannelError::unavailable(format!(
                "no live session webhook for conversation '{}'",
                conversation.unwrap_or("*")
            ))
        })
    }
}

#[async_trait]
impl ChannelOutbound for DingTalkOutbound {
    async fn send_text(&self, account_id: &str, to: &str, text: &str) -> Result<()> {
        let snapshot = self.account_snapshot(account_id)?;
        let destination = snapshot.destination(to)?;
        let chunks = chunk_markdown_text(text, snapshot.text_chunk_limit);
        debug!(account_id, chunks = chunks.len(), "sending DingTalk text");
        for chunk in chunks {
            snapshot
                .dispatcher
                .send_text(&destination, &chunk, Some(&snapshot.credentials))
                .await?;
        }
        Ok(())
    }

    async fn send_media(&self, account_id: &str, to: &str, payload: &ReplyPayload) -> Result<()> {
        let Some(media) = payload.media.as_ref() else {
            return self.send_text(account_id, to, &payload.text).await;
        };
        let snapshot = self.account_snapshot(account_id)?;
        let destination = snapshot.destination(to)?;
        let body = Some(payload.text.as_str());
        let credentials = Some(&snapshot.credentials);

        if media.url.starts_with("data:") {
            let buffer = decode_data_url(&media.url, media.file_name.as_deref())?;
            snapshot
                .dispatcher
                .send_media_buffer(&destination, body, buffer, credentials)
                .await?;
        } else {
            snapshot
                .dispatcher
                .send_media(&destination, body, Some(&media.url), credentials)
                .await?;
        }
        Ok(())
    }
}
