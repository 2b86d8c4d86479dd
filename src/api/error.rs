use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A privileged request was attempted without a session token. Raised
    /// before any I/O happens.
    #[error("Authentication required")]
    AuthRequired,
    /// The round trip did not complete, or the body was not JSON.
    #[error("{0}")]
    Transport(String),
    #[error("invalid service origin '{origin}': {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn transport(error: impl std::fmt::Display) -> Self {
        Self::Transport(error.to_string())
    }
}
