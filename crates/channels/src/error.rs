/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by channel outbounds before a platform call is made.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested account ID is not registered.
    #[error("unknown channel account: {account_id}")]
    UnknownAccount { account_id: String },

    /// No route to the destination right now (e.g. no live reply channel).
    #[error("channel operation unavailable: {message}")]
    Unavailable { message: String },
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_account(account_id: impl std::fmt::Display) -> Self {
        Self::UnknownAccount {
            account_id: account_id.to_string(),
        }
    }
}
