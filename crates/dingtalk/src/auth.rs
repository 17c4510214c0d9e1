use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tokio::sync::Mutex,
    tracing::debug,
};

use crate::{
    config::DingTalkCredentials,
    error::{Error, Result},
};

/// Header carrying the OpenAPI access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-acs-dingtalk-access-token";

/// Source of OpenAPI access tokens for a live client.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<Secret<String>>;
}

#[derive(Clone)]
struct CachedAccessToken {
    token: Secret<String>,
    expires_at: Instant,
}

impl CachedAccessToken {
    fn is_valid(&self) -> bool {
        let refresh_skew = Duration::from_secs(60);
        self.expires_at > Instant::now() + refresh_skew
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: Option<String>,
    expire_in: Option<u64>,
    code: Option<String>,
    message: Option<String>,
}

/// Issues tokens from app credentials via `/v1.0/oauth2/accessToken`,
/// reusing each token until a minute before it expires.
pub struct AppAccessTokenProvider {
    http: reqwest::Client,
    api_base: String,
    credentials: DingTalkCredentials,
    cache: Mutex<Option<CachedAccessToken>>,
}

impl AppAccessTokenProvider {
    pub fn new(http: reqwest::Client, api_base: &str, credentials: DingTalkCredentials) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            cache: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &DingTalkCredentials {
        &self.credentials
    }

    async fn fetch(&self) -> Result<CachedAccessToken> {
        let url = format!("{}/v1.0/oauth2/accessToken", self.api_base);
        let body = serde_json::json!({
            "appKey": self.credentials.app_key,
            "appSecret": self.credentials.app_secret.expose_secret(),
        });
        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::delivery(
                Some(i64::from(status.as_u16())),
                format!("access token request failed: {text}"),
            ));
        }

        let body: TokenResponse = resp.json().await?;
        let Some(token) = body.access_token.filter(|t| !t.is_empty()) else {
            return Err(Error::delivery(
                None,
                format!(
                    "access token response had no token: {} {}",
                    body.code.unwrap_or_default(),
                    body.message.unwrap_or_default()
                ),
            ));
        };
        let ttl = body.expire_in.unwrap_or(7200).max(120);
        debug!(app_key = %self.credentials.app_key, ttl, "issued DingTalk access token");
        Ok(CachedAccessToken {
            token: Secret::new(token),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for AppAccessTokenProvider {
    async fn access_token(&self) -> Result<Secret<String>> {
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_valid()
        {
            return Ok(cached.token.clone());
        }
        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }
}
