use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use session_contract::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Backend replied 2xx with `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("retry exhausted after max attempts (status: {}, last_error: {last_error:?})", display_status(.status))]
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("request was cancelled")]
    Cancelled,
}

fn display_status(status: &Option<StatusCode>) -> String {
    status
        .map(|status| status.as_u16().to_string())
        .unwrap_or_else(|| "n/a".to_owned())
}

impl From<WriterApiError> for BackendError {
    fn from(error: WriterApiError) -> Self {
        match error {
            WriterApiError::Status(status, message) => BackendError::Status {
                status: status.as_u16(),
                message,
            },
            WriterApiError::RetryExhausted {
                status: Some(status),
                last_error,
            } => BackendError::Status {
                status: status.as_u16(),
                message: last_error.unwrap_or_default(),
            },
            WriterApiError::Serde(error) => BackendError::Decode(error.to_string()),
            WriterApiError::MalformedResponse(message) => BackendError::Decode(message),
            WriterApiError::Rejected(message) => BackendError::Rejected(message),
            WriterApiError::WebSocket(message) => BackendError::Channel(message),
            WriterApiError::Cancelled => BackendError::Cancelled,
            other => BackendError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(detail_message)
            .or_else(|| self.error.as_ref().and_then(plain_message))
            .or_else(|| self.message.as_ref().and_then(plain_message))
    }
}

/// Extract a readable message from an error response body.
///
/// Understands `{"detail": "..."}`, validation-style `{"detail": [{"msg": ...}]}`,
/// `{"error": "..."}` and `{"message": "..."}`; anything else falls back to the
/// raw body or the status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message() {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn detail_message(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let messages = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(plain_message))
                .collect::<Vec<_>>();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        other => plain_message(other),
    }
}

fn plain_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(map) => map.get("message").and_then(plain_message),
        _ => None,
    }
}
