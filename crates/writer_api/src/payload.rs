//! Wire bodies exchanged with the writing backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use session_contract::{
    char_len, word_count, AiContentRange, ContinueRequest, ContinueResponse, Draft, DraftStatus,
    FeedbackAction, FeedbackOutcome, FeedbackRequest, GeneratedDraft, SaveDraftRequest,
    SessionScope, StartSessionRequest,
};

use crate::error::WriterApiError;

const DEFAULT_REJECTION: &str = "request failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartSessionBody {
    pub project_id: String,
    pub chapter: String,
    pub chapter_title: String,
    pub chapter_goal: String,
    pub characters: Vec<String>,
    pub target_words: u32,
}

impl StartSessionBody {
    pub fn new(scope: &SessionScope, request: StartSessionRequest) -> Self {
        Self {
            project_id: scope.project_id.clone(),
            chapter: request.chapter_id,
            chapter_title: request.title,
            chapter_goal: request.goal,
            characters: request.participant_ids,
            target_words: request.target_word_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinueBody {
    pub project_id: String,
    pub chapter: String,
    pub existing_content: String,
    pub instruction: String,
    pub target_words: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_position: Option<usize>,
}

impl ContinueBody {
    pub fn new(scope: &SessionScope, request: ContinueRequest) -> Self {
        Self {
            project_id: scope.project_id.clone(),
            chapter: request.chapter_id,
            existing_content: request.existing_content,
            instruction: request.instruction,
            target_words: request.target_word_count,
            insert_position: request.insert_position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackBody {
    pub action: FeedbackAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<FeedbackRequest> for FeedbackBody {
    fn from(request: FeedbackRequest) -> Self {
        Self {
            action: request.action,
            content: request.comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveDraftBody {
    pub chapter: String,
    pub content: String,
    pub word_count: usize,
    pub status: DraftStatus,
}

impl From<SaveDraftRequest> for SaveDraftBody {
    fn from(request: SaveDraftRequest) -> Self {
        Self {
            chapter: request.chapter_id,
            content: request.content,
            word_count: request.word_count,
            status: request.status,
        }
    }
}

/// Generic `{success, error?, message?}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AckBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AckBody {
    /// Missing `success` counts as accepted.
    pub fn into_result(self) -> Result<FeedbackOutcome, WriterApiError> {
        if self.success == Some(false) {
            return Err(WriterApiError::Rejected(rejection_text(
                self.error,
                self.message,
            )));
        }
        Ok(FeedbackOutcome {
            message: self.message,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedDraftBody {
    pub content: String,
    #[serde(default)]
    pub word_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeBody {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContinueResponseBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub draft: Option<GeneratedDraftBody>,
    #[serde(default)]
    pub new_content_length: Option<usize>,
    #[serde(default)]
    pub ai_content_range: Option<RangeBody>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ContinueResponseBody {
    pub fn into_response(self) -> Result<ContinueResponse, WriterApiError> {
        if self.success == Some(false) {
            return Err(WriterApiError::Rejected(rejection_text(
                self.error,
                self.message,
            )));
        }
        let draft = self.draft.ok_or_else(|| {
            WriterApiError::MalformedResponse("continue response is missing `draft`".to_owned())
        })?;
        let length = char_len(&draft.content);

        Ok(ContinueResponse {
            new_content_length: self.new_content_length.unwrap_or(length),
            ai_content_range: self
                .ai_content_range
                .map(|range| AiContentRange::new(range.start, range.end)),
            draft: GeneratedDraft {
                word_count: draft.word_count.unwrap_or(length),
                content: draft.content,
            },
        })
    }
}

/// Stored draft as returned by the drafts endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftBody {
    #[serde(default)]
    pub chapter: Option<Value>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub word_count: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
}

impl DraftBody {
    /// Converts into a [`Draft`], falling back to `fallback_chapter` when the body omits it.
    pub fn into_draft(self, fallback_chapter: &str) -> Draft {
        let chapter_id = match self.chapter {
            Some(Value::String(chapter)) if !chapter.is_empty() => chapter,
            Some(Value::Number(number)) => number.to_string(),
            _ => fallback_chapter.to_owned(),
        };
        let status = match self.status.as_deref() {
            Some("reviewed") => DraftStatus::Reviewed,
            Some("final") => DraftStatus::Final,
            _ => DraftStatus::Draft,
        };

        Draft {
            chapter_id,
            version: self.version,
            word_count: self.word_count.unwrap_or_else(|| word_count(&self.content)),
            content: self.content,
            status,
        }
    }
}

fn rejection_text(error: Option<String>, message: Option<String>) -> String {
    error
        .filter(|text| !text.trim().is_empty())
        .or_else(|| message.filter(|text| !text.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_REJECTION.to_owned())
}
