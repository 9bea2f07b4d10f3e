use thiserror::Error;

/// Failure classes for upstream fetches and on-demand queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveDataError {
    /// Network failure or request timeout
    #[error("Upstream request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-2xx status
    #[error("API returned status code: {status}")]
    UpstreamRejected { status: u16 },

    /// Body could not be decoded into the expected shape
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("{0}")]
    NotFound(String),
}

impl From<reqwest::Error> for LiveDataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LiveDataError::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            LiveDataError::Decode(e.to_string())
        } else {
            LiveDataError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LiveDataError {
    fn from(e: serde_json::Error) -> Self {
        LiveDataError::Decode(e.to_string())
    }
}
