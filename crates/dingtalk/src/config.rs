use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::markdown::MarkdownTableMode;

/// Default base URL of the DingTalk OpenAPI.
pub const DEFAULT_API_BASE: &str = "https://api.dingtalk.com";

/// Default lifetime of a session webhook when the inbound event carries none.
pub const DEFAULT_WEBHOOK_TTL_SECS: u64 = 3600;

/// How outbound text is rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Markdown message when the body contains markdown, plain text otherwise.
    #[default]
    Auto,
    /// Always plain text.
    Raw,
    /// Always a markdown action card.
    Card,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// How markdown tables are transformed before composing text.
    pub table_mode: MarkdownTableMode,
}

/// Configuration for a single DingTalk robot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DingTalkAccountConfig {
    /// Whether the account is enabled.
    pub enabled: bool,

    /// App key (client ID).
    pub app_key: String,

    /// App secret (client secret).
    #[serde(serialize_with = "serialize_secret")]
    pub app_secret: Secret<String>,

    /// Robot code; defaults to the app key for proactive sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robot_code: Option<String>,

    /// OpenAPI base URL.
    pub api_base: String,

    pub markdown: MarkdownConfig,

    pub render_mode: RenderMode,

    /// Maximum characters per outbound text message.
    pub text_chunk_limit: usize,

    /// Fallback lifetime for cached session webhooks.
    pub webhook_ttl_secs: u64,
}

impl std::fmt::Debug for DingTalkAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkAccountConfig")
            .field("enabled", &self.enabled)
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .field("robot_code", &self.robot_code)
            .field("api_base", &self.api_base)
            .field("markdown", &self.markdown)
            .field("render_mode", &self.render_mode)
            .field("text_chunk_limit", &self.text_chunk_limit)
            .field("webhook_ttl_secs", &self.webhook_ttl_secs)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for DingTalkAccountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_key: String::new(),
            app_secret: Secret::new(String::new()),
            robot_code: None,
            api_base: DEFAULT_API_BASE.into(),
            markdown: MarkdownConfig::default(),
            render_mode: RenderMode::Auto,
            text_chunk_limit: crate::markdown::TEXT_CHUNK_LIMIT,
            webhook_ttl_secs: DEFAULT_WEBHOOK_TTL_SECS,
        }
    }
}

/// App credentials for the proactive API.
#[derive(Clone)]
pub struct DingTalkCredentials {
    pub app_key: String,
    pub app_secret: Secret<String>,
    pub robot_code: Option<String>,
}

impl DingTalkCredentials {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: Secret::new(app_secret.into()),
            robot_code: None,
        }
    }

    pub fn with_robot_code(mut self, robot_code: impl Into<String>) -> Self {
        self.robot_code = Some(robot_code.into());
        self
    }

    /// Robot code used by proactive sends and uploads.
    pub fn effective_robot_code(&self) -> &str {
        self.robot_code.as_deref().unwrap_or(&self.app_key)
    }
}

impl std::fmt::Debug for DingTalkCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[REDACTED]")
            .field("robot_code", &self.robot_code)
            .finish()
    }
}

/// Resolve app credentials from an account config.
///
/// Returns `None` unless both key and secret are non-blank.
pub fn resolve_credentials(config: &DingTalkAccountConfig) -> Option<DingTalkCredentials> {
    let app_key = config.app_key.trim();
    let app_secret = config.app_secret.expose_secret().trim();
    if app_key.is_empty() || app_secret.is_empty() {
        return None;
    }
    let robot_code = config
        .robot_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    Some(DingTalkCredentials {
        app_key: app_key.to_owned(),
        app_secret: Secret::new(app_secret.to_owned()),
        robot_code,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_fields() {
        let cfg: DingTalkAccountConfig =
            serde_json::from_value(serde_json::json!({ "app_key": "ding123" }))
                .unwrap();
        assert_eq!(cfg.app_key, "ding123");
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.render_mode, RenderMode::Auto);
        assert_eq!(cfg.markdown.table_mode, MarkdownTableMode::Ascii);
        assert_eq!(cfg.webhook_ttl_secs, 3600);
        assert!(cfg.enabled);
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = DingTalkAccountConfig {
            app_secret: Secret::new("hunter2".into()),
            ..DingTalkAccountConfig::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn credentials_require_key_and_secret() {
        let mut cfg = DingTalkAccountConfig {
            app_key: "  ding123 ".into(),
            ..DingTalkAccountConfig::default()
        };
        assert!(resolve_credentials(&cfg).is_none());

        cfg.app_secret = Secret::new(" s3cret ".into());
        cfg.robot_code = Some("   ".into());
        let creds = resolve_credentials(&cfg).unwrap();
        assert_eq!(creds.app_key, "ding123");
        assert_eq!(creds.app_secret.expose_secret(), "s3cret");
        assert_eq!(creds.robot_code, None);
        assert_eq!(creds.effective_robot_code(), "ding123");
    }

    #[test]
    fn robot_code_overrides_app_key() {
        let creds = DingTalkCredentials::new("key", "secret").with_robot_code("robot");
        assert_eq!(creds.effective_robot_code(), "robot");
    }
}
