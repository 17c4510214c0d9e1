//! CLI subcommands for sending DingTalk messages.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    moltis_dingtalk::{
        DeliveryDispatcher, DeliveryResult, DingTalkAccountConfig, markdown::chunk_markdown_text,
        message::MessageComposer, resolve_credentials,
    },
    secrecy::Secret,
    serde::Deserialize,
    tracing::debug,
};

/// Credential overrides, taking precedence over the config file.
#[derive(Args, Clone, Default)]
pub struct CredentialArgs {
    /// DingTalk app key (client ID).
    #[arg(long, global = true, env = "DINGTALK_APP_KEY")]
    pub app_key: Option<String>,
    /// DingTalk app secret (client secret).
    #[arg(long, global = true, env = "DINGTALK_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,
    /// Robot code for proactive sends; defaults to the app key.
    #[arg(long, global = true, env = "DINGTALK_ROBOT_CODE")]
    pub robot_code: Option<String>,
    /// OpenAPI base URL.
    #[arg(long, global = true, env = "DINGTALK_API_BASE")]
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    dingtalk: DingTalkAccountConfig,
}

fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(".config")
            .join("moltis")
            .join("moltis.toml")
    })
}

fn read_config_file(path: &Path) -> Result<DingTalkAccountConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let file: FileConfig =
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(file.dingtalk)
}

/// Load the `[dingtalk]` table and apply command-line overrides.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_config(path: Option<&Path>, args: &CredentialArgs) -> Result<DingTalkAccountConfig> {
    let mut config = match path {
        Some(path) if !path.exists() => bail!("config file not found: {}", path.display()),
        Some(path) => read_config_file(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => read_config_file(&path)?,
            None => DingTalkAccountConfig::default(),
        },
    };

    if let Some(app_key) = &args.app_key {
        config.app_key = app_key.clone();
    }
    if let Some(app_secret) = &args.app_secret {
        config.app_secret = Secret::new(app_secret.clone());
    }
    if let Some(robot_code) = &args.robot_code {
        config.robot_code = Some(robot_code.clone());
    }
    if let Some(api_base) = &args.api_base {
        config.api_base = api_base.clone();
    }
    Ok(config)
}

fn dispatcher(config: &DingTalkAccountConfig) -> DeliveryDispatcher {
    DeliveryDispatcher::new(reqwest::Client::new(), &config.api_base).with_composer(
        MessageComposer::new(config.markdown.table_mode, config.render_mode),
    )
}

/// Send `message`, split into chunks no longer than `text_chunk_limit`.
/// Returns the result of the last chunk.
pub async fn send_text(
    config: &DingTalkAccountConfig,
    to: &str,
    message: &str,
) -> Result<DeliveryResult> {
    let credentials = resolve_credentials(config);
    let dispatcher = dispatcher(config);
    let mut result = DeliveryResult::default();
    for chunk in chunk_markdown_text(message, config.text_chunk_limit) {
        result = dispatcher
            .send_text(to, &chunk, credentials.as_ref())
            .await?;
    }
    Ok(result)
}

pub async fn send_media(
    config: &DingTalkAccountConfig,
    to: &str,
    message: Option<&str>,
    media: &str,
) -> Result<DeliveryResult> {
    let credentials = resolve_credentials(config);
    let result = dispatcher(config)
        .send_media(to, message, Some(media), credentials.as_ref())
        .await?;
    Ok(result)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        moltis_dingtalk::{config::RenderMode, markdown::MarkdownTableMode},
        secrecy::ExposeSecret,
    };

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moltis.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_dingtalk_table() {
        let (_dir, path) = write_config(
            r#"
[dingtalk]
app_key = "key-from-file"
app_secret = "secret-from-file"
render_mode = "card"
text_chunk_limit = 1200

[dingtalk.markdown]
table_mode = "strip"
"#,
        );
        let config = load_config(Some(&path), &CredentialArgs::default()).unwrap();
        assert_eq!(config.app_key, "key-from-file");
        assert_eq!(config.app_secret.expose_secret(), "secret-from-file");
        assert_eq!(config.render_mode, RenderMode::Card);
        assert_eq!(config.markdown.table_mode, MarkdownTableMode::Strip);
        assert_eq!(config.text_chunk_limit, 1200);
        assert_eq!(config.webhook_ttl_secs, 3600);
    }

    #[test]
    fn arguments_override_file_values() {
        let (_dir, path) = write_config("[dingtalk]\napp_key = \"file\"\n");
        let args = CredentialArgs {
            app_key: Some("arg-key".into()),
            app_secret: Some("arg-secret".into()),
            robot_code: Some("robot".into()),
            api_base: Some("http://localhost:1".into()),
        };
        let config = load_config(Some(&path), &args).unwrap();
        let credentials = resolve_credentials(&config).unwrap();
        assert_eq!(credentials.app_key, "arg-key");
        assert_eq!(credentials.effective_robot_code(), "robot");
        assert_eq!(config.api_base, "http://localhost:1");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml")), &CredentialArgs::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let (_dir, path) = write_config("[dingtalk\n");
        let err = load_config(Some(&path), &CredentialArgs::default()).unwrap_err();
        assert!(err.to_string().contains("moltis.toml"), "{err}");
    }
}
