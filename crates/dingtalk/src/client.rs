use std::sync::Arc;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    auth::{ACCESS_TOKEN_HEADER, AccessTokenProvider, AppAccessTokenProvider},
    config::DingTalkCredentials,
    error::{Error, Result},
    message::OutboundMessage,
};

/// Result of a successful delivery.
///
/// `conversation_id` is best-effort: session webhooks do not report it, so it
/// is empty on the reply-channel path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub conversation_id: String,
    pub message_id: Option<String>,
}

/// Response body of a session webhook send.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    errcode: Option<i64>,
    errmsg: Option<String>,
    process_query_key: Option<String>,
}

/// Response body of a proactive OpenAPI send.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenApiSendResponse {
    process_query_key: Option<String>,
}

/// Error body returned by the OpenAPI on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct OpenApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// POST a composed message to a session webhook.
///
/// A non-2xx status or a non-zero `errcode` is a [`Error::Delivery`].
pub async fn post_webhook(
    http: &reqwest::Client,
    webhook_url: &str,
    message: &OutboundMessage,
    access_token: Option<&Secret<String>>,
) -> Result<DeliveryResult> {
    let mut req = http.post(webhook_url).json(message);
    if let Some(token) = access_token {
        req = req.header(ACCESS_TOKEN_HEADER, token.expose_secret());
    }
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::delivery(
            Some(i64::from(status.as_u16())),
            format!("webhook send failed: {body}"),
        ));
    }

    let text = resp.text().await.unwrap_or_default();
    let body: WebhookResponse = if text.trim().is_empty() {
        WebhookResponse::default()
    } else {
        serde_json::from_str(&text).map_err(|e| {
            Error::delivery(
                Some(i64::from(status.as_u16())),
                format!("unreadable webhook response: {e}"),
            )
        })?
    };
    if let Some(code) = body.errcode
        && code != 0
    {
        return Err(Error::delivery(
            Some(code),
            body.errmsg.unwrap_or_else(|| format!("code {code}")),
        ));
    }
    debug!(msgtype = message.msgtype(), "webhook send accepted");
    Ok(DeliveryResult {
        conversation_id: String::new(),
        message_id: body.process_query_key,
    })
}

/// A live, authenticated OpenAPI client.
pub struct DingTalkClient {
    http: reqwest::Client,
    api_base: String,
    robot_code: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl DingTalkClient {
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        robot_code: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            robot_code: robot_code.into(),
            tokens,
        }
    }

    /// Client whose tokens are issued from app credentials.
    pub fn from_credentials(
        http: reqwest::Client,
        api_base: &str,
        credentials: &DingTalkCredentials,
    ) -> Self {
        let tokens = Arc::new(AppAccessTokenProvider::new(
            http.clone(),
            api_base,
            credentials.clone(),
        ));
        Self::new(http, api_base, credentials.effective_robot_code(), tokens)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn robot_code(&self) -> &str {
        &self.robot_code
    }

    pub async fn access_token(&self) -> Result<Secret<String>> {
        self.tokens.access_token().await
    }

    /// Send a `(msgKey, msgParam)` message through a proactive endpoint.
    pub(crate) async fn send_proactive(
        &self,
        path: &str,
        mut body: serde_json::Value,
        msg_key: &str,
        msg_param: &serde_json::Value,
    ) -> Result<Option<String>> {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("robotCode".into(), self.robot_code.clone().into());
            obj.insert("msgKey".into(), msg_key.into());
            obj.insert("msgParam".into(), msg_param.to_string().into());
        }
        let token = self.access_token().await?;
        let resp = self
            .http
            .post(format!("{}{path}", self.api_base))
            .header(ACCESS_TOKEN_HEADER, token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err: OpenApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = match (err.code, err.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message,
                _ => text,
            };
            return Err(Error::delivery(Some(i64::from(status.as_u16())), message));
        }
        let parsed: OpenApiSendResponse = resp.json().await.unwrap_or_default();
        debug!(path, msg_key, "proactive send accepted");
        Ok(parsed.process_query_key)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::message::compose_text};

    #[tokio::test]
    async fn unreadable_success_body_is_a_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = post_webhook(
            &reqwest::Client::new(),
            &format!("{}/hook", server.url()),
            &compose_text("hi", &[]),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Delivery { code: Some(200), .. }), "{err}");
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn platform_errcode_is_a_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .with_body(r#"{"errcode":300001,"errmsg":"token is not exist"}"#)
            .create_async()
            .await;

        let err = post_webhook(
            &reqwest::Client::new(),
            &format!("{}/hook", server.url()),
            &compose_text("hi", &[]),
            None,
        )
        .await
        .unwrap_err();
        match err {
            Error::Delivery { code, message } => {
                assert_eq!(code, Some(300001));
                assert_eq!(message, "token is not exist");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
