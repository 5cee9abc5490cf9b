use serde::Deserialize;
use serde_json::Value;

use crate::{FrameError, SessionStatus};

/// One inbound push notification.
///
/// Every field is optional. Unknown keys are tolerated and unknown status
/// strings leave `status` unset so a newer backend cannot wedge the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFrame {
    pub status: Option<SessionStatus>,
    pub message: Option<String>,
    pub project: Option<String>,
    pub chapter: Option<String>,
    pub iteration: Option<u32>,
    pub rewrite_iteration: Option<u32>,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    project: Option<Value>,
    #[serde(default)]
    chapter: Option<Value>,
    #[serde(default)]
    iteration: Option<Value>,
    #[serde(default)]
    rewrite_iteration: Option<Value>,
}

impl ChannelFrame {
    #[must_use]
    pub fn with_status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        if !value.is_object() {
            return Err(FrameError::NotAnObject(json_kind(&value)));
        }
        let raw: RawFrame = serde_json::from_value(value)?;

        Ok(Self {
            status: raw.status.as_deref().and_then(SessionStatus::parse),
            message: raw.message.and_then(text_field),
            project: raw.project.and_then(text_field),
            chapter: raw.chapter.and_then(text_field),
            iteration: raw.iteration.as_ref().and_then(count_field),
            rewrite_iteration: raw.rewrite_iteration.as_ref().and_then(count_field),
        })
    }
}

fn text_field(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn count_field(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
