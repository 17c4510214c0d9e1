//! Destination string classification.
//!
//! `https://...`/`http://...` is a session webhook, `user:`/`staff:` a direct
//! user, `group:`/`chat:` a group conversation, a bare `cid...` an open
//! conversation ID, and anything else a bare staff ID.

use std::fmt;

/// Prefix DingTalk uses for open conversation (group) IDs.
pub const GROUP_ID_PREFIX: &str = "cid";

const USER_PREFIXES: [&str; 2] = ["user:", "staff:"];
const GROUP_PREFIXES: [&str; 2] = ["group:", "chat:"];

/// Where an outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryTarget {
    /// A session webhook handed out with an inbound message.
    ReplyChannel { handle: String },
    /// A single user, addressed by staff ID.
    DirectUser { id: String },
    /// A group conversation, addressed by open conversation ID.
    DirectGroup { id: String },
}

impl DeliveryTarget {
    /// Whether this target is reached through the proactive OpenAPI.
    pub fn is_proactive(&self) -> bool {
        !matches!(self, Self::ReplyChannel { .. })
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReplyChannel { .. } => "reply-channel",
            Self::DirectUser { .. } => "direct-user",
            Self::DirectGroup { .. } => "direct-group",
        }
    }
}

/// Renders the canonical destination string; `classify` maps it back to an
/// equal target.
impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplyChannel { handle } => f.write_str(handle),
            Self::DirectUser { id } => write!(f, "user:{id}"),
            Self::DirectGroup { id } => write!(f, "group:{id}"),
        }
    }
}

/// Classify a destination string. Total: every input maps to one target.
pub fn classify(destination: &str) -> DeliveryTarget {
    let trimmed = destination.trim();

    if has_prefix_ignore_case(trimmed, "https://") || has_prefix_ignore_case(trimmed, "http://") {
        return DeliveryTarget::ReplyChannel {
            handle: trimmed.to_string(),
        };
    }
    if let Some(id) = strip_any_prefix(trimmed, &USER_PREFIXES) {
        return DeliveryTarget::DirectUser { id };
    }
    if let Some(id) = strip_any_prefix(trimmed, &GROUP_PREFIXES) {
        return DeliveryTarget::DirectGroup { id };
    }
    if trimmed.starts_with(GROUP_ID_PREFIX) {
        return DeliveryTarget::DirectGroup {
            id: trimmed.to_string(),
        };
    }
    DeliveryTarget::DirectUser {
        id: trimmed.to_string(),
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn strip_any_prefix(s: &str, prefixes: &[&str]) -> Option<String> {
    prefixes
        .iter()
        .find(|p| has_prefix_ignore_case(s, p))
        .map(|p| s[p.len()..].trim().to_string())
}
