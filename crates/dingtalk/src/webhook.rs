use std::sync::Arc;

use {async_trait::async_trait, tracing::debug};

use crate::{
    client::{DeliveryResult, DingTalkClient, post_webhook},
    delivery::DeliveryStrategy,
    error::{Error, Result},
    media::{MediaKind, MediaSource, upload_media},
    message::{OutboundMessage, compose_image, compose_link},
    target::DeliveryTarget,
};

/// Delivery through a session webhook.
///
/// Needs no credentials. When a live client is attached its access token is
/// sent along, and local media can be uploaded.
pub struct WebhookDelivery {
    http: reqwest::Client,
    url: String,
    target: DeliveryTarget,
    client: Option<Arc<DingTalkClient>>,
}

impl WebhookDelivery {
    pub fn new(
        http: reqwest::Client,
        webhook_url: &str,
        client: Option<Arc<DingTalkClient>>,
    ) -> Self {
        Self {
            http,
            url: webhook_url.to_string(),
            target: DeliveryTarget::ReplyChannel {
                handle: webhook_url.to_string(),
            },
            client,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for WebhookDelivery {
    fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<DeliveryResult> {
        let token = match self.client.as_ref() {
            Some(client) => match client.access_token().await {
                Ok(token) => Some(token),
                Err(e) => {
                    debug!(error = %e, "sending webhook message without access token");
                    None
                },
            },
            None => None,
        };
        post_webhook(&self.http, &self.url, message, token.as_ref()).await
    }

    async fn send_media(&self, source: &MediaSource) -> Result<DeliveryResult> {
        let message = match source {
            MediaSource::Remote { url, name } => match source.kind() {
                MediaKind::Image => compose_image(name, url),
                MediaKind::Voice | MediaKind::File => {
                    compose_link(name, &format!("File: {name}"), url, None)
                },
            },
            MediaSource::Bytes { data, name } => {
                let kind = source.kind();
                if kind != MediaKind::Image {
                    return Err(Error::unsupported(format!(
                        "session webhooks cannot carry uploaded {} attachments",
                        kind.as_str()
                    )));
                }
                let media_id = upload_media(self.client.as_deref(), data, name, kind).await?;
                compose_image(name, &format!("@{media_id}"))
            },
        };
        self.send_message(&message).await
    }
}
