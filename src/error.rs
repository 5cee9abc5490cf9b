use session_contract::SessionStatus;
use thiserror::Error;

use crate::status::UserAction;

/// Client-side rejection of a user request. Nothing is dispatched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} while session is {status}")]
    InvalidTransition {
        action: UserAction,
        status: SessionStatus,
    },

    #[error("instruction must not be empty")]
    EmptyInstruction,

    #[error("there is no existing content to continue from")]
    EmptyContent,

    #[error("no insert position captured; switch to insert mode first")]
    MissingInsertPosition,

    #[error("insert position {position} is beyond content length {len}")]
    InsertPositionOutOfRange { position: usize, len: usize },

    #[error("target word count must be positive")]
    InvalidTargetWordCount,

    #[error("chapter id must not be empty")]
    MissingChapterId,

    #[error("revision feedback must not be empty")]
    EmptyFeedback,

    #[error("session controller is not running")]
    NotRunning,
}

impl SessionError {
    #[must_use]
    pub fn invalid_transition(action: UserAction, status: SessionStatus) -> Self {
        Self::InvalidTransition { action, status }
    }
}
