use std::sync::Arc;

use {async_trait::async_trait, serde_json::json};

use crate::{
    client::{DeliveryResult, DingTalkClient},
    delivery::DeliveryStrategy,
    error::{Error, Result},
    media::{MediaKind, MediaSource, upload_media},
    message::{OutboundMessage, compose_link},
    target::DeliveryTarget,
};

const USER_SEND_PATH: &str = "/v1.0/robot/oToMessages/batchSend";
const GROUP_SEND_PATH: &str = "/v1.0/robot/groupMessages/send";

/// Delivery through the proactive OpenAPI to a user or group.
pub struct ProactiveDelivery {
    target: DeliveryTarget,
    client: Arc<DingTalkClient>,
}

impl ProactiveDelivery {
    pub fn new(target: DeliveryTarget, client: Arc<DingTalkClient>) -> Result<Self> {
        if !target.is_proactive() {
            return Err(Error::invalid_input(
                "proactive delivery needs a user or group target",
            ));
        }
        Ok(Self { target, client })
    }

    async fn send_keyed(
        &self,
        msg_key: &str,
        msg_param: &serde_json::Value,
    ) -> Result<DeliveryResult> {
        let (path, body, conversation_id) = match &self.target {
            DeliveryTarget::DirectUser { id } => (USER_SEND_PATH, json!({ "userIds": [id] }), id),
            DeliveryTarget::DirectGroup { id } => {
                (GROUP_SEND_PATH, json!({ "openConversationId": id }), id)
            },
            DeliveryTarget::ReplyChannel { .. } => {
                return Err(Error::invalid_input("reply channel is not a proactive target"));
            },
        };
        let message_id = self
            .client
            .send_proactive(path, body, msg_key, msg_param)
            .await?;
        Ok(DeliveryResult {
            conversation_id: conversation_id.clone(),
            message_id,
        })
    }
}

#[async_trait]
impl DeliveryStrategy for ProactiveDelivery {
    fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<DeliveryResult> {
        let (msg_key, msg_param) = message.proactive_params();
        self.send_keyed(msg_key, &msg_param).await
    }

    async fn send_media(&self, source: &MediaSource) -> Result<DeliveryResult> {
        match source {
            MediaSource::Remote { url, name } => match source.kind() {
                MediaKind::Image => {
                    self.send_keyed("sampleImageMsg", &json!({ "photoURL": url }))
                        .await
                },
                MediaKind::Voice | MediaKind::File => {
                    self.send_message(&compose_link(name, &format!("File: {name}"), url, None))
                        .await
                },
            },
            MediaSource::Bytes { data, name } => {
                // Voice clips go out as files: `sampleAudio` needs a duration
                // the pipeline cannot know.
                let kind = match source.kind() {
                    MediaKind::Image => MediaKind::Image,
                    MediaKind::Voice | MediaKind::File => MediaKind::File,
                };
                let media_id = upload_media(Some(&*self.client), data, name, kind).await?;
                match kind {
                    MediaKind::Image => {
                        self.send_keyed("sampleImageMsg", &json!({ "photoURL": media_id }))
                            .await
                    },
                    MediaKind::Voice | MediaKind::File => {
                        let file_type = std::path::Path::new(name)
                            .extension()
                            .and_then(|e| e.to_str())
                            .unwrap_or("file")
                            .to_ascii_lowercase();
                        self.send_keyed(
                            "sampleFile",
                            &json!({
                                "mediaId": media_id,
                                "fileName": name,
                                "fileType": file_type,
                            }),
                        )
                        .await
                    },
                }
            },
        }
    }

    fn empty_media_send_is_noop(&self) -> bool {
        true
    }
}
