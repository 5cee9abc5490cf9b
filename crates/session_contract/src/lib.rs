//! Backend-neutral contract for one AI-assisted drafting session.
//!
//! This crate defines only the shared vocabulary (statuses, drafts, channel
//! frames, request/response bodies) and the async seams a session host talks
//! through. It excludes transport details and all client-side reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
mod frame;

pub use error::{BackendError, FrameError};
pub use frame::ChannelFrame;

/// Backend-reported phase of the drafting pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Briefing,
    Writing,
    Reviewing,
    Editing,
    Waiting,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "idle" => Self::Idle,
            "briefing" => Self::Briefing,
            "writing" => Self::Writing,
            "reviewing" => Self::Reviewing,
            "editing" => Self::Editing,
            "waiting" => Self::Waiting,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Briefing => "briefing",
            Self::Writing => "writing",
            Self::Reviewing => "reviewing",
            Self::Editing => "editing",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Returns true for states only an explicit reset leaves.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns true while the backend pipeline is producing output.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Briefing | Self::Writing | Self::Reviewing | Self::Editing
        )
    }

    /// Returns true when arriving in this state means fresh content is in the draft store.
    #[must_use]
    pub fn publishes_content(&self) -> bool {
        matches!(self, Self::Waiting | Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open character-offset interval marking agent-authored text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AiContentRange {
    pub start: usize,
    pub end: usize,
}

impl AiContentRange {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Highlight covering a whole buffer of `len` characters, if non-empty.
    #[must_use]
    pub fn full(len: usize) -> Option<Self> {
        Self::new(0, len).validated(len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Clamps `end` to `content_len` and drops the range if nothing is left.
    #[must_use]
    pub fn validated(self, content_len: usize) -> Option<Self> {
        let end = self.end.min(content_len);
        if end <= self.start {
            None
        } else {
            Some(Self {
                start: self.start,
                end,
            })
        }
    }
}

/// Project/chapter pair a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionScope {
    pub project_id: String,
    pub chapter_id: String,
}

impl SessionScope {
    #[must_use]
    pub fn new(project_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            chapter_id: chapter_id.into(),
        }
    }

    /// Key used to address the push channel. The backend broadcasts per project.
    #[must_use]
    pub fn channel_key(&self) -> &str {
        &self.project_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    #[default]
    Draft,
    Reviewed,
    Final,
}

/// Persisted chapter draft as returned by the draft store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub chapter_id: String,
    pub version: u32,
    pub content: String,
    pub word_count: usize,
    pub status: DraftStatus,
}

/// Length in characters. [`AiContentRange`] offsets and insert positions use this unit.
#[must_use]
pub fn char_len(content: &str) -> usize {
    content.chars().count()
}

/// Word count as the backend reports it: one per character, since CJK prose has no
/// word separators.
#[must_use]
pub fn word_count(content: &str) -> usize {
    char_len(content)
}

/// Brief for starting a brand-new chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSessionRequest {
    pub chapter_id: String,
    pub title: String,
    pub goal: String,
    pub participant_ids: Vec<String>,
    pub target_word_count: u32,
}

/// Continue (append) or insert request. `insert_position` is `None` for continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueRequest {
    pub chapter_id: String,
    pub existing_content: String,
    pub instruction: String,
    pub target_word_count: u32,
    pub insert_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDraft {
    pub content: String,
    pub word_count: usize,
}

/// Successful continue/insert result. Failures surface as [`BackendError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueResponse {
    pub draft: GeneratedDraft,
    pub new_content_length: usize,
    pub ai_content_range: Option<AiContentRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    Confirm,
    Revise,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Revise => "revise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub action: FeedbackAction,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackOutcome {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDraftRequest {
    pub chapter_id: String,
    pub content: String,
    pub word_count: usize,
    pub status: DraftStatus,
}

/// Request/response surface of the drafting backend.
///
/// Results of `start_session` and `submit_feedback` arrive later over the push
/// channel; the direct return only reports whether the call was accepted.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    async fn start_session(
        &self,
        scope: &SessionScope,
        request: StartSessionRequest,
    ) -> Result<(), BackendError>;

    async fn continue_or_insert(
        &self,
        scope: &SessionScope,
        request: ContinueRequest,
    ) -> Result<ContinueResponse, BackendError>;

    async fn submit_feedback(
        &self,
        scope: &SessionScope,
        request: FeedbackRequest,
    ) -> Result<FeedbackOutcome, BackendError>;

    async fn cancel_session(&self, scope: &SessionScope) -> Result<(), BackendError>;

    /// Current backend status, shaped like a channel frame.
    async fn fetch_status(&self, scope: &SessionScope) -> Result<ChannelFrame, BackendError>;
}

/// Persistence for chapter drafts. Versions are always assigned by the store.
#[async_trait]
pub trait DraftStore: Send + Sync + 'static {
    async fn get_draft(&self, scope: &SessionScope) -> Result<Draft, BackendError>;

    async fn save_draft(
        &self,
        scope: &SessionScope,
        request: SaveDraftRequest,
    ) -> Result<Draft, BackendError>;
}

/// Opens receive-only push connections keyed by a session key.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    async fn open(&self, session_key: &str) -> Result<Box<dyn ChannelConnection>, BackendError>;
}

/// One open push connection.
#[async_trait]
pub trait ChannelConnection: Send {
    /// Next inbound text frame, or `None` once the peer closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, BackendError>>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn status_parse_round_trips_every_variant() {
        let all = [
            SessionStatus::Idle,
            SessionStatus::Briefing,
            SessionStatus::Writing,
            SessionStatus::Reviewing,
            SessionStatus::Editing,
            SessionStatus::Waiting,
            SessionStatus::Completed,
            SessionStatus::Error,
        ];

        for status in all {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("drafting"), None);
    }

    #[test]
    fn only_waiting_and_completed_publish_content() {
        assert!(SessionStatus::Waiting.publishes_content());
        assert!(SessionStatus::Completed.publishes_content());
        assert!(!SessionStatus::Editing.publishes_content());
        assert!(!SessionStatus::Error.publishes_content());
    }

    #[test]
    fn terminal_and_busy_classification() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Waiting.is_terminal());
        assert!(SessionStatus::Reviewing.is_busy());
        assert!(!SessionStatus::Idle.is_busy());
    }

    #[test]
    fn validated_range_clamps_end_to_content_length() {
        assert_eq!(
            AiContentRange::new(2, 40).validated(10),
            Some(AiContentRange::new(2, 10))
        );
        assert_eq!(AiContentRange::new(10, 40).validated(10), None);
        assert_eq!(AiContentRange::new(4, 4).validated(10), None);
    }

    #[test]
    fn full_range_is_none_for_empty_buffer() {
        assert_eq!(AiContentRange::full(0), None);
        assert_eq!(AiContentRange::full(500), Some(AiContentRange::new(0, 500)));
    }

    #[test]
    fn word_count_counts_characters() {
        assert_eq!(word_count("Hello world"), 11);
        assert_eq!(word_count("夜色很深"), 4);
    }

    #[test]
    fn char_len_ignores_utf8_width() {
        assert_eq!(char_len("夜色很深"), 4);
        assert_eq!("夜色很深".len(), 12);
        assert_eq!(char_len(""), 0);
    }

    #[test]
    fn channel_key_is_project_id() {
        let scope = SessionScope::new("novel-1", "ch-03");
        assert_eq!(scope.channel_key(), "novel-1");
    }
}
