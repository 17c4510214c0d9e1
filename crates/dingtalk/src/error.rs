use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A local media path does not exist.
    #[error("local media file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// No authenticated client is attached, so no access token can be issued.
    #[error("no authenticated DingTalk client available")]
    NoClient,

    /// The upload call failed or returned no media reference.
    #[error("DingTalk media upload failed: {message}")]
    UploadFailed { message: String },

    /// A proactive send was attempted without app credentials.
    #[error("DingTalk app credentials are not configured")]
    MissingCredentials,

    /// Non-success HTTP status, non-zero `errcode`, or a transport failure.
    #[error("DingTalk delivery failed{}: {message}", .code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Delivery { code: Option<i64>, message: String },

    /// The resolved media cannot be expressed on the chosen delivery path.
    #[error("unsupported on this delivery path: {message}")]
    Unsupported { message: String },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    Message { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn delivery(code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Delivery {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::UploadFailed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether a failure at the rich tier may be downgraded to the text
    /// fallback instead of reaching the caller.
    ///
    /// Missing credentials are the one exception: there is no alternate path.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, Self::MissingCredentials)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Delivery {
            code: err.status().map(|s| i64::from(s.as_u16())),
            message: err.to_string(),
        }
    }
}

impl moltis_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

moltis_common::impl_context!();
