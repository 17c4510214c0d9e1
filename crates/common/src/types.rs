use serde::{Deserialize, Serialize};

/// A reply handed to a channel outbound: text plus an optional attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
}

/// Media referenced by a reply.
///
/// `url` is a remote URL, a local path, or a `data:` URL carrying the bytes
/// inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub url: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_media(mut self, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.media = Some(MediaAttachment {
            url: url.into(),
            mime_type: mime_type.into(),
            file_name: None,
        });
        self
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_omits_media() {
        let json = serde_json::to_value(ReplyPayload::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hi" }));
    }

    #[test]
    fn media_payload_parses_without_file_name() {
        let payload: ReplyPayload = serde_json::from_str(
            r#"{"text":"","media":{"url":"https://x/a.png","mime_type":"image/png"}}"#,
        )
        .unwrap();
        let media = payload.media.unwrap();
        assert_eq!(media.url, "https://x/a.png");
        assert!(media.file_name.is_none());
    }
}
