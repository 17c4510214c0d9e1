//! Outbound message payloads and their composition.
//!
//! Payloads serialize to the exact JSON accepted by a session webhook:
//! `{"msgtype": "text", "text": {...}, "at": {...}}` and friends.

use serde::{Deserialize, Serialize};

use crate::{
    config::RenderMode,
    markdown::{MarkdownTableMode, convert_markdown_tables, derive_title, looks_like_markdown},
};

/// Mention directive. Always names explicit recipients; never broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtDirective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_user_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_mobiles: Option<Vec<String>>,
    pub is_at_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCardButton {
    pub title: String,
    #[serde(rename = "actionURL")]
    pub action_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCardContent {
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_title: Option<String>,
    #[serde(
        default,
        rename = "singleURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub single_url: Option<String>,
    /// `"0"` vertical, `"1"` horizontal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btn_orientation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btns: Option<Vec<ActionCardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkContent {
    pub title: String,
    pub text: String,
    pub message_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
}

/// A composed outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgtype")]
pub enum OutboundMessage {
    #[serde(rename = "text")]
    Text {
        text: TextContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<AtDirective>,
    },
    #[serde(rename = "markdown")]
    Markdown {
        markdown: MarkdownContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<AtDirective>,
    },
    #[serde(rename = "actionCard")]
    ActionCard {
        #[serde(rename = "actionCard")]
        action_card: ActionCardContent,
    },
    #[serde(rename = "link")]
    Link { link: LinkContent },
}

impl OutboundMessage {
    /// Wire `msgtype` value.
    pub fn msgtype(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Markdown { .. } => "markdown",
            Self::ActionCard { .. } => "actionCard",
            Self::Link { .. } => "link",
        }
    }

    /// Proactive API `(msgKey, msgParam)` pair for this message.
    pub fn proactive_params(&self) -> (&'static str, serde_json::Value) {
        match self {
            Self::Text { text, .. } => {
                ("sampleText", serde_json::json!({ "content": text.content }))
            },
            Self::Markdown { markdown, .. } => (
                "sampleMarkdown",
                serde_json::json!({ "title": markdown.title, "text": markdown.text }),
            ),
            Self::ActionCard { action_card } => match (
                &action_card.single_title,
                &action_card.single_url,
            ) {
                (Some(single_title), Some(single_url)) => (
                    "sampleActionCard",
                    serde_json::json!({
                        "title": action_card.title,
                        "text": action_card.text,
                        "singleTitle": single_title,
                        "singleURL": single_url,
                    }),
                ),
                _ => (
                    "sampleMarkdown",
                    serde_json::json!({ "title": action_card.title, "text": action_card.text }),
                ),
            },
            Self::Link { link } => (
                "sampleLink",
                serde_json::json!({
                    "title": link.title,
                    "text": link.text,
                    "messageUrl": link.message_url,
                    "picUrl": link.pic_url.clone().unwrap_or_default(),
                }),
            ),
        }
    }
}

fn mention_directive(mentions: &[String]) -> Option<AtDirective> {
    let ids: Vec<String> = mentions
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(AtDirective {
        at_user_ids: Some(ids),
        at_mobiles: None,
        is_at_all: false,
    })
}

/// Text message. `body` is used verbatim.
pub fn compose_text(body: &str, mentions: &[String]) -> OutboundMessage {
    OutboundMessage::Text {
        text: TextContent {
            content: body.to_string(),
        },
        at: mention_directive(mentions),
    }
}

pub fn compose_markdown(title: &str, body: &str, mentions: &[String]) -> OutboundMessage {
    OutboundMessage::Markdown {
        markdown: MarkdownContent {
            title: title.to_string(),
            text: body.to_string(),
        },
        at: mention_directive(mentions),
    }
}

pub fn compose_action_card(
    title: &str,
    body: &str,
    single_button_title: Option<&str>,
    single_button_url: Option<&str>,
) -> OutboundMessage {
    OutboundMessage::ActionCard {
        action_card: ActionCardContent {
            title: title.to_string(),
            text: body.to_string(),
            single_title: single_button_title.map(str::to_owned),
            single_url: single_button_url.map(str::to_owned),
            btn_orientation: None,
            btns: None,
        },
    }
}

/// Action card carrying markdown, which DingTalk renders more fully than a
/// markdown message (code blocks, links).
pub fn compose_markdown_card(body: &str, title: Option<&str>) -> OutboundMessage {
    compose_action_card(title.unwrap_or("Message"), body, None, None)
}

pub fn compose_link(
    title: &str,
    body: &str,
    url: &str,
    image_url: Option<&str>,
) -> OutboundMessage {
    OutboundMessage::Link {
        link: LinkContent {
            title: title.to_string(),
            text: body.to_string(),
            message_url: url.to_string(),
            pic_url: image_url.map(str::to_owned),
        },
    }
}

/// Markdown message embedding a single image.
pub fn compose_image(title: &str, image_ref: &str) -> OutboundMessage {
    compose_markdown(title, &format!("![image]({image_ref})"), &[])
}

/// Composes reply text for an account: applies the table transformation
/// once, then picks a message shape by render mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageComposer {
    pub table_mode: MarkdownTableMode,
    pub render_mode: RenderMode,
}

impl MessageComposer {
    pub fn new(table_mode: MarkdownTableMode, render_mode: RenderMode) -> Self {
        Self {
            table_mode,
            render_mode,
        }
    }

    /// Plain text message with tables converted.
    pub fn text(&self, body: &str, mentions: &[String]) -> OutboundMessage {
        compose_text(&convert_markdown_tables(body, self.table_mode), mentions)
    }

    /// Message for a reply body, shaped by the render mode.
    ///
    /// Action cards carry no `at` block, so card mode composes a markdown
    /// message instead when there are mentions to deliver.
    pub fn reply(&self, body: &str, mentions: &[String]) -> OutboundMessage {
        let converted = convert_markdown_tables(body, self.table_mode);
        match self.render_mode {
            RenderMode::Raw => compose_text(&converted, mentions),
            RenderMode::Card if mention_directive(mentions).is_some() => {
                compose_markdown(&derive_title(&converted), &converted, mentions)
            },
            RenderMode::Card => compose_markdown_card(&converted, Some(&derive_title(&converted))),
            RenderMode::Auto if looks_like_markdown(&converted) => {
                compose_markdown(&derive_title(&converted), &converted, mentions)
            },
            RenderMode::Auto => compose_text(&converted, mentions),
        }
    }
}
