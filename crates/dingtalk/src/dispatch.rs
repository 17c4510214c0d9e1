//! Delivery dispatcher.
//!
//! Classifies a destination, picks the reply-channel or proactive strategy,
//! and runs rich sends through a forward-only fallback cascade. A media send
//! may degrade once to a link text and a markdown or card send once to plain
//! text. A failure of that text send reaches the caller.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use crate::{
    auth::AppAccessTokenProvider,
    client::{DeliveryResult, DingTalkClient},
    config::{DEFAULT_API_BASE, DingTalkCredentials},
    delivery::DeliveryStrategy,
    error::{Error, Result},
    media::{MediaBuffer, decode_data_url, resolve_media_source},
    message::{MessageComposer, OutboundMessage, compose_text},
    proactive::ProactiveDelivery,
    target::{DeliveryTarget, classify},
    webhook::WebhookDelivery,
};

/// Prefix of the text sent when a media attempt degrades.
pub const FALLBACK_PREFIX: &str = "📎";

/// Media handed to a send, before resolution.
enum MediaInput<'a> {
    Url(&'a str),
    Buffer(MediaBuffer),
}

impl MediaInput<'_> {
    /// What the fallback text points at.
    fn reference(&self) -> String {
        match self {
            Self::Url(url) => (*url).to_string(),
            Self::Buffer(buffer) => buffer
                .file_name
                .clone()
                .unwrap_or_else(|| "file".to_string()),
        }
    }
}

/// The richest form a send tries first.
enum RichAttempt<'a> {
    Message(OutboundMessage),
    Media(MediaInput<'a>),
}

enum Cascade<'a> {
    AttemptingRich(RichAttempt<'a>),
    AttemptingFallback { reason: Error },
    Done(DeliveryResult),
}

/// A client built from app credentials, with the provider that holds them.
struct CachedClient {
    tokens: Arc<AppAccessTokenProvider>,
    client: Arc<DingTalkClient>,
}

/// Routes outbound messages to DingTalk.
pub struct DeliveryDispatcher {
    http: reqwest::Client,
    api_base: String,
    composer: MessageComposer,
    client: Option<Arc<DingTalkClient>>,
    /// Keyed by app key and effective robot code.
    clients: Mutex<HashMap<(String, String), CachedClient>>,
}

impl Default for DeliveryDispatcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_API_BASE)
    }
}

impl DeliveryDispatcher {
    pub fn new(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            composer: MessageComposer::default(),
            client: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_composer(mut self, composer: MessageComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Attach a live client used for every send, regardless of credentials.
    pub fn with_client(mut self, client: Arc<DingTalkClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Client for a credential set, created on first use and reused while
    /// the secret stays the same.
    fn client_for(&self, credentials: &DingTalkCredentials) -> Arc<DingTalkClient> {
        if let Some(client) = &self.client {
            return Arc::clone(client);
        }
        let key = (
            credentials.app_key.clone(),
            credentials.effective_robot_code().to_string(),
        );
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = clients.get(&key)
            && cached.tokens.credentials().app_secret.expose_secret()
                == credentials.app_secret.expose_secret()
        {
            return Arc::clone(&cached.client);
        }

        let tokens = Arc::new(AppAccessTokenProvider::new(
            self.http.clone(),
            &self.api_base,
            credentials.clone(),
        ));
        let client = Arc::new(DingTalkClient::new(
            self.http.clone(),
            &self.api_base,
            credentials.effective_robot_code(),
            tokens.clone(),
        ));
        debug!(
            app_key = %credentials.app_key,
            robot_code = credentials.effective_robot_code(),
            "created DingTalk client"
        );
        clients.insert(key, CachedClient {
            tokens,
            client: Arc::clone(&client),
        });
        client
    }

    /// Pick the strategy for a target. No network call is made here.
    fn strategy(
        &self,
        target: DeliveryTarget,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<Box<dyn DeliveryStrategy>> {
        match target {
            DeliveryTarget::ReplyChannel { handle } => {
                let client = self
                    .client
                    .clone()
                    .or_else(|| credentials.map(|c| self.client_for(c)));
                Ok(Box::new(WebhookDelivery::new(
                    self.http.clone(),
                    &handle,
                    client,
                )))
            },
            target => {
                let credentials = credentials.ok_or(Error::MissingCredentials)?;
                let client = self.client_for(credentials);
                Ok(Box::new(ProactiveDelivery::new(target, client)?))
            },
        }
    }

    /// Send a text body, shaped by the composer's render mode.
    ///
    /// A markdown or card message that fails is retried once as plain text.
    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<DeliveryResult> {
        let strategy = self.strategy(classify(to), credentials)?;
        let message = self.composer.reply(body, &[]);
        debug!(
            kind = strategy.target().kind(),
            msgtype = message.msgtype(),
            "sending text"
        );
        if matches!(message, OutboundMessage::Text { .. }) {
            return strategy.send_message(&message).await;
        }
        let fallback = self.composer.text(body, &[]);
        run_cascade(strategy.as_ref(), RichAttempt::Message(message), &fallback).await
    }

    /// Send an already composed message.
    pub async fn send_message(
        &self,
        to: &str,
        message: &OutboundMessage,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<DeliveryResult> {
        let strategy = self.strategy(classify(to), credentials)?;
        debug!(
            kind = strategy.target().kind(),
            msgtype = message.msgtype(),
            "sending message"
        );
        strategy.send_message(message).await
    }

    /// Send optional text followed by optional media referenced by URL, path,
    /// or `data:` URL.
    pub async fn send_media(
        &self,
        to: &str,
        body: Option<&str>,
        media_url: Option<&str>,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<DeliveryResult> {
        let media = match media_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) if url.starts_with("data:") => {
                Some(MediaInput::Buffer(decode_data_url(url, None)?))
            },
            Some(url) => Some(MediaInput::Url(url)),
            None => None,
        };
        self.deliver_media(to, body, media, credentials).await
    }

    /// Send optional text followed by caller-supplied bytes.
    pub async fn send_media_buffer(
        &self,
        to: &str,
        body: Option<&str>,
        buffer: MediaBuffer,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<DeliveryResult> {
        self.deliver_media(to, body, Some(MediaInput::Buffer(buffer)), credentials)
            .await
    }

    async fn deliver_media(
        &self,
        to: &str,
        body: Option<&str>,
        media: Option<MediaInput<'_>>,
        credentials: Option<&DingTalkCredentials>,
    ) -> Result<DeliveryResult> {
        let strategy = self.strategy(classify(to), credentials)?;
        let body = body.unwrap_or_default();

        if !body.trim().is_empty() {
            strategy.send_message(&self.composer.text(body, &[])).await?;
        }

        let Some(media) = media else {
            // Without media the body closes the send as a second text.
            if body.trim().is_empty() && strategy.empty_media_send_is_noop() {
                debug!(kind = strategy.target().kind(), "nothing to send");
                return Ok(DeliveryResult::default());
            }
            return strategy.send_message(&self.composer.text(body, &[])).await;
        };

        let fallback = compose_text(&format!("{FALLBACK_PREFIX} {}", media.reference()), &[]);
        run_cascade(strategy.as_ref(), RichAttempt::Media(media), &fallback).await
    }
}

/// Attempt the rich send, degrading at most once to `fallback`.
async fn run_cascade(
    strategy: &dyn DeliveryStrategy,
    attempt: RichAttempt<'_>,
    fallback: &OutboundMessage,
) -> Result<DeliveryResult> {
    let mut state = Cascade::AttemptingRich(attempt);
    loop {
        state = match state {
            Cascade::AttemptingRich(attempt) => match attempt_rich(strategy, attempt).await {
                Ok(result) => Cascade::Done(result),
                Err(e) if e.is_fallback_eligible() => Cascade::AttemptingFallback { reason: e },
                Err(e) => return Err(e),
            },
            Cascade::AttemptingFallback { reason } => {
                warn!(
                    kind = strategy.target().kind(),
                    error = %reason,
                    "rich send failed, falling back to plain text"
                );
                Cascade::Done(strategy.send_message(fallback).await?)
            },
            Cascade::Done(result) => return Ok(result),
        };
    }
}

async fn attempt_rich(
    strategy: &dyn DeliveryStrategy,
    attempt: RichAttempt<'_>,
) -> Result<DeliveryResult> {
    let source = match attempt {
        RichAttempt::Message(message) => return strategy.send_message(&message).await,
        RichAttempt::Media(MediaInput::Url(url)) => resolve_media_source(Some(url), None).await?,
        RichAttempt::Media(MediaInput::Buffer(buffer)) => {
            resolve_media_source(None, Some(buffer)).await?
        },
    };
    debug!(
        kind = strategy.target().kind(),
        media_kind = source.kind().as_str(),
        name = source.name(),
        "sending media"
    );
    strategy.send_media(&source).await
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{auth::AccessTokenProvider, config::RenderMode, markdown::MarkdownTableMode},
        mockito::Matcher,
        secrecy::Secret,
        serde_json::json,
    };

    struct StaticToken;

    #[async_trait::async_trait]
    impl AccessTokenProvider for StaticToken {
        async fn access_token(&self) -> Result<Secret<String>> {
            Ok(Secret::new("live-tok".into()))
        }
    }

    fn creds() -> DingTalkCredentials {
        DingTalkCredentials::new("ding-key", "ding-secret").with_robot_code("robot-1")
    }

    async fn token_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/v1.0/oauth2/accessToken")
            .with_status(200)
            .with_body(r#"{"accessToken":"tok","expireIn":7200}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn direct_target_without_credentials_fails_before_io() {
        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = dispatcher
            .send_text("group:cid123", "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));

        let err = dispatcher
            .send_media("staff:42", None, Some("https://x/a.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));
    }

    #[tokio::test]
    async fn webhook_text_follows_render_mode() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/robot/send")
            .match_body(Matcher::PartialJson(json!({
                "msgtype": "markdown",
                "markdown": { "title": "Status" },
            })))
            .with_status(200)
            .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url())
            .with_composer(MessageComposer::new(
                MarkdownTableMode::Ascii,
                RenderMode::Auto,
            ));
        let url = format!("{}/robot/send", server.url());
        dispatcher
            .send_text(&url, "# Status\n\n**all good**", None)
            .await
            .unwrap();
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn media_send_without_url_repeats_body_as_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(json!({
                "msgtype": "text",
                "text": { "content": "## hi\n- a" },
            })))
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        dispatcher
            .send_media(&url, Some("## hi\n- a"), None, None)
            .await
            .unwrap();
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn failed_card_is_resent_once_as_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let card = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({ "msgtype": "actionCard" })))
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let text = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(json!({
                "msgtype": "text",
                "text": { "content": "hello" },
            })))
            .with_status(200)
            .with_body(r#"{"errcode":0}"#)
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url())
            .with_composer(MessageComposer::new(MarkdownTableMode::Ascii, RenderMode::Card));
        let url = format!("{}/hook", server.url());
        dispatcher.send_text(&url, "hello", None).await.unwrap();
        card.assert_async().await;
        text.assert_async().await;
    }

    #[tokio::test]
    async fn failed_plain_text_after_markdown_reaches_caller() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_body(r#"{"errcode":310000,"errmsg":"sign not match"}"#)
            .expect(2)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        let err = dispatcher
            .send_text(&url, "**bold** news", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery { code: Some(310000), .. }), "{err}");
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn plain_text_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        let err = dispatcher.send_text(&url, "plain", None).await.unwrap_err();
        assert!(matches!(err, Error::Delivery { code: Some(500), .. }), "{err}");
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn body_precedes_media() {
        let mut server = mockito::Server::new_async().await;
        let text = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({ "msgtype": "text" })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let image = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "msgtype": "markdown",
                "markdown": { "title": "cat.jpg", "text": "![image](https://x/cat.jpg)" },
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        dispatcher
            .send_media(&url, Some("look"), Some("https://x/cat.jpg"), None)
            .await
            .unwrap();
        text.assert_async().await;
        image.assert_async().await;
    }

    #[tokio::test]
    async fn missing_local_file_degrades_to_link_text() {
        let mut server = mockito::Server::new_async().await;
        let fallback = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "msgtype": "text",
                "text": { "content": "📎 /definitely/not/here.png" },
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        dispatcher
            .send_media(&url, None, Some("/definitely/not/here.png"), None)
            .await
            .unwrap();
        fallback.assert_async().await;
    }

    #[tokio::test]
    async fn failed_fallback_reaches_caller() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        let err = dispatcher
            .send_media(&url, None, Some("https://x/doc.pdf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Delivery { code: Some(500), .. }), "{err}");
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn uploaded_non_image_over_webhook_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let fallback = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "text": { "content": "📎 report.pdf" },
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let url = format!("{}/hook", server.url());
        dispatcher
            .send_media_buffer(
                &url,
                None,
                MediaBuffer {
                    data: b"%PDF".to_vec(),
                    file_name: Some("report.pdf".into()),
                },
                None,
            )
            .await
            .unwrap();
        fallback.assert_async().await;
    }

    #[tokio::test]
    async fn proactive_group_text_uses_group_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let send = server
            .mock("POST", "/v1.0/robot/groupMessages/send")
            .match_header("x-acs-dingtalk-access-token", "tok")
            .match_body(Matcher::Json(json!({
                "robotCode": "robot-1",
                "openConversationId": "cidABC",
                "msgKey": "sampleText",
                "msgParam": "{\"content\":\"hello\"}",
            })))
            .with_status(200)
            .with_body(r#"{"processQueryKey":"pqk-1"}"#)
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url())
            .with_composer(MessageComposer::new(MarkdownTableMode::Ascii, RenderMode::Raw));
        let result = dispatcher
            .send_text("cidABC", "hello", Some(&creds()))
            .await
            .unwrap();
        assert_eq!(result, DeliveryResult {
            conversation_id: "cidABC".into(),
            message_id: Some("pqk-1".into()),
        });
        token.assert_async().await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn proactive_remote_image_uses_photo_url() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let send = server
            .mock("POST", "/v1.0/robot/oToMessages/batchSend")
            .match_body(Matcher::PartialJson(json!({
                "userIds": ["u1"],
                "msgKey": "sampleImageMsg",
                "msgParam": "{\"photoURL\":\"https://x/p.png\"}",
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        dispatcher
            .send_media("user:u1", None, Some("https://x/p.png"), Some(&creds()))
            .await
            .unwrap();
        send.assert_async().await;
    }

    #[tokio::test]
    async fn proactive_local_file_is_uploaded_then_sent_as_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server).await;
        let upload = server
            .mock("POST", "/v1.0/robot/messageFiles/upload")
            .with_status(200)
            .with_body(r#"{"mediaId":"@media-1"}"#)
            .expect(1)
            .create_async()
            .await;
        let send = server
            .mock("POST", "/v1.0/robot/oToMessages/batchSend")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "userIds": ["u1"], "msgKey": "sampleFile" })),
                Matcher::Regex("@media-1".into()),
                Matcher::Regex("notes.txt".into()),
                Matcher::Regex("fileType".into()),
            ]))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        dispatcher
            .send_media("u1", None, path.to_str(), Some(&creds()))
            .await
            .unwrap();
        upload.assert_async().await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn proactive_empty_media_send_is_noop() {
        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let result = dispatcher
            .send_media("group:cid1", Some("  "), None, Some(&creds()))
            .await
            .unwrap();
        assert_eq!(result, DeliveryResult::default());
    }

    #[tokio::test]
    async fn invalid_data_url_is_rejected_without_fallback() {
        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = dispatcher
            .send_media("https://hook", None, Some("data:image/png,raw"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }), "{err}");
    }

    async fn token_for_secret(
        server: &mut mockito::ServerGuard,
        secret: &str,
        token: &str,
        hits: usize,
    ) -> mockito::Mock {
        server
            .mock("POST", "/v1.0/oauth2/accessToken")
            .match_body(Matcher::PartialJson(json!({ "appKey": "k", "appSecret": secret })))
            .with_status(200)
            .with_body(json!({ "accessToken": token, "expireIn": 7200 }).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    async fn robot_send(
        server: &mut mockito::ServerGuard,
        robot: &str,
        hits: usize,
    ) -> mockito::Mock {
        server
            .mock("POST", "/v1.0/robot/oToMessages/batchSend")
            .match_body(Matcher::PartialJson(json!({ "robotCode": robot })))
            .with_status(200)
            .with_body("{}")
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn clients_follow_robot_code_and_secret() {
        let mut server = mockito::Server::new_async().await;
        let old_secret = token_for_secret(&mut server, "s", "tok-s", 1).await;
        let new_secret = token_for_secret(&mut server, "s2", "tok-s2", 2).await;
        let robot_a = robot_send(&mut server, "robot-A", 2).await;
        let robot_b = robot_send(&mut server, "robot-B", 2).await;

        let dispatcher = DeliveryDispatcher::new(reqwest::Client::new(), &server.url());
        let first = DingTalkCredentials::new("k", "s").with_robot_code("robot-A");
        let second = DingTalkCredentials::new("k", "s2").with_robot_code("robot-B");
        let rotated = DingTalkCredentials::new("k", "s2").with_robot_code("robot-A");
        for creds in [&first, &second, &second, &rotated] {
            dispatcher
                .send_text("user:1", "hi", Some(creds))
                .await
                .unwrap();
        }
        old_secret.assert_async().await;
        new_secret.assert_async().await;
        robot_a.assert_async().await;
        robot_b.assert_async().await;
    }

    #[tokio::test]
    async fn attached_client_serves_both_paths() {
        let mut server = mockito::Server::new_async().await;
        let oauth = server
            .mock("POST", "/v1.0/oauth2/accessToken")
            .expect(0)
            .create_async()
            .await;
        let hook = server
            .mock("POST", "/hook")
            .match_header("x-acs-dingtalk-access-token", "live-tok")
            .with_status(200)
            .with_body(r#"{"errcode":0}"#)
            .expect(1)
            .create_async()
            .await;
        let send = server
            .mock("POST", "/v1.0/robot/oToMessages/batchSend")
            .match_header("x-acs-dingtalk-access-token", "live-tok")
            .match_body(Matcher::PartialJson(json!({ "robotCode": "robot-live" })))
            .with_status(200)
            .with_body(r#"{"processQueryKey":"q-live"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Arc::new(DingTalkClient::new(
            reqwest::Client::new(),
            &server.url(),
            "robot-live",
            Arc::new(StaticToken),
        ));
        let dispatcher =
            DeliveryDispatcher::new(reqwest::Client::new(), &server.url()).with_client(client);
        let url = format!("{}/hook", server.url());
        dispatcher.send_text(&url, "hi", None).await.unwrap();
        let result = dispatcher
            .send_text("user:u1", "hi", Some(&creds()))
            .await
            .unwrap();
        assert_eq!(result.message_id.as_deref(), Some("q-live"));
        oauth.assert_async().await;
        hook.assert_async().await;
        send.assert_async().await;
    }
}
