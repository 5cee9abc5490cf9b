//! Session status transition guardrails.

use std::fmt;

use session_contract::SessionStatus;

use crate::error::SessionError;

/// Status-changing requests a user can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    StartNew,
    Continue,
    Insert,
    Revise,
    Confirm,
    Reset,
    Cancel,
}

impl UserAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartNew => "start a new chapter",
            Self::Continue => "continue writing",
            Self::Insert => "insert text",
            Self::Revise => "request a revision",
            Self::Confirm => "confirm the draft",
            Self::Reset => "reset the session",
            Self::Cancel => "cancel the session",
        }
    }

    /// Status the session moves to once the action is accepted.
    pub fn target(self) -> SessionStatus {
        match self {
            Self::StartNew => SessionStatus::Briefing,
            Self::Continue | Self::Insert | Self::Revise => SessionStatus::Writing,
            Self::Confirm => SessionStatus::Completed,
            Self::Reset | Self::Cancel => SessionStatus::Idle,
        }
    }

    /// Whether the action may be taken while the session is in `from`.
    pub fn allowed_from(self, from: SessionStatus) -> bool {
        match self {
            Self::StartNew | Self::Continue | Self::Insert => from == SessionStatus::Idle,
            Self::Revise | Self::Confirm => from == SessionStatus::Waiting,
            Self::Reset => from.is_terminal(),
            Self::Cancel => from != SessionStatus::Idle,
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the target status for `action`, or the rejection when `from` does not allow it.
pub fn validate_user_action(
    action: UserAction,
    from: SessionStatus,
) -> Result<SessionStatus, SessionError> {
    if action.allowed_from(from) {
        Ok(action.target())
    } else {
        Err(SessionError::invalid_transition(action, from))
    }
}

/// Transitions the backend pipeline is expected to announce over the channel.
///
/// Frames are applied even when they fall outside this table; it only decides
/// whether the jump is worth a log line.
pub fn is_expected_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Idle, Briefing)
            | (Idle, Writing)
            | (Briefing, Writing)
            | (Writing, Reviewing)
            | (Writing, Editing)
            | (Writing, Waiting)
            | (Writing, Completed)
            | (Writing, Idle)
            | (Reviewing, Editing)
            | (Reviewing, Writing)
            | (Reviewing, Waiting)
            | (Editing, Reviewing)
            | (Editing, Waiting)
            | (Waiting, Writing)
            | (Waiting, Editing)
            | (Waiting, Completed)
            | (Completed, Idle)
            | (Error, Idle)
            | (_, Error)
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use session_contract::SessionStatus;

    use super::*;

    #[test]
    fn generation_requests_start_only_from_idle() {
        for action in [UserAction::StartNew, UserAction::Continue, UserAction::Insert] {
            assert!(action.allowed_from(SessionStatus::Idle));
            assert!(!action.allowed_from(SessionStatus::Writing));
            assert!(!action.allowed_from(SessionStatus::Waiting));
        }
        assert_eq!(
            validate_user_action(UserAction::StartNew, SessionStatus::Idle),
            Ok(SessionStatus::Briefing)
        );
        assert_eq!(
            validate_user_action(UserAction::Insert, SessionStatus::Idle),
            Ok(SessionStatus::Writing)
        );
    }

    #[test]
    fn feedback_requires_waiting() {
        assert_eq!(
            validate_user_action(UserAction::Revise, SessionStatus::Waiting),
            Ok(SessionStatus::Writing)
        );
        assert_eq!(
            validate_user_action(UserAction::Confirm, SessionStatus::Waiting),
            Ok(SessionStatus::Completed)
        );
        assert_eq!(
            validate_user_action(UserAction::Confirm, SessionStatus::Editing),
            Err(SessionError::InvalidTransition {
                action: UserAction::Confirm,
                status: SessionStatus::Editing
            })
        );
    }

    #[test]
    fn reset_only_from_terminal_states() {
        assert!(UserAction::Reset.allowed_from(SessionStatus::Completed));
        assert!(UserAction::Reset.allowed_from(SessionStatus::Error));
        assert!(!UserAction::Reset.allowed_from(SessionStatus::Waiting));
    }

    #[test]
    fn cancel_from_any_active_state() {
        assert!(!UserAction::Cancel.allowed_from(SessionStatus::Idle));
        for from in [
            SessionStatus::Briefing,
            SessionStatus::Writing,
            SessionStatus::Reviewing,
            SessionStatus::Editing,
            SessionStatus::Waiting,
            SessionStatus::Completed,
            SessionStatus::Error,
        ] {
            assert_eq!(
                validate_user_action(UserAction::Cancel, from),
                Ok(SessionStatus::Idle)
            );
        }
    }

    #[test]
    fn pipeline_order_is_expected() {
        assert!(is_expected_transition(SessionStatus::Briefing, SessionStatus::Writing));
        assert!(is_expected_transition(SessionStatus::Editing, SessionStatus::Waiting));
        assert!(is_expected_transition(SessionStatus::Waiting, SessionStatus::Error));
        assert!(!is_expected_transition(SessionStatus::Idle, SessionStatus::Completed));
    }

    #[test]
    fn rejection_message_names_action_and_status() {
        let error = SessionError::invalid_transition(UserAction::Revise, SessionStatus::Idle);
        assert_eq!(
            error.to_string(),
            "cannot request a revision while session is idle"
        );
    }
}
