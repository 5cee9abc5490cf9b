use thiserror::Error;

/// Failure reported by any backend seam (request API, draft store, channel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered but refused the operation (`success: false`).
    #[error("{0}")]
    Rejected(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("request was cancelled")]
    Cancelled,
}

impl BackendError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    #[must_use]
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel(message.into())
    }
}

/// Inbound channel frame that could not be interpreted.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
