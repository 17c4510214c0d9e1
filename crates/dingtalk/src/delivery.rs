use async_trait::async_trait;

use crate::{
    client::DeliveryResult, error::Result, media::MediaSource, message::OutboundMessage,
    target::DeliveryTarget,
};

/// One of the two send mechanisms: session webhook or proactive OpenAPI.
///
/// The dispatcher drives the fallback cascade identically over both.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn target(&self) -> &DeliveryTarget;

    /// Send a composed message.
    async fn send_message(&self, message: &OutboundMessage) -> Result<DeliveryResult>;

    /// Send resolved media.
    async fn send_media(&self, source: &MediaSource) -> Result<DeliveryResult>;

    /// Whether a media send with neither media nor text succeeds as a no-op.
    fn empty_media_send_is_noop(&self) -> bool {
        false
    }
}
