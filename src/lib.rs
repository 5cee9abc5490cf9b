//! Session controller for human/AI collaborative chapter drafting.
//!
//! Invariant: one authoritative text buffer and one AI-authored highlight. Both
//! are mutated only by [`SessionCore`], which arbitrates between push-channel
//! frames and direct request responses by generation.
//!
//! # Public API Overview
//! - Drive a session through [`SessionController`] (`start`, user requests, `stop`) and
//!   observe it via [`SessionSnapshot`]s.
//! - Embed the synchronous reducer directly with [`SessionCore`] and your own [`HostOps`].
//! - Track the highlight across edits with [`range::track_edit`].

pub mod autosave;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod message_log;
pub mod mode;
pub mod range;
pub mod reconcile;
pub mod session;
pub mod status;

pub use crate::autosave::{AutosaveStatus, SaveId};
pub use crate::buffer::{DraftBuffer, UnloadDecision};
pub use crate::channel::{ChannelClient, ChannelNotice};
pub use crate::config::{ConfigError, SessionConfig};
pub use crate::controller::SessionController;
pub use crate::error::SessionError;
pub use crate::message_log::{LogEntry, Role};
pub use crate::mode::{ChapterBrief, WriteMode};
pub use crate::reconcile::{Generation, OperationKind};
pub use crate::session::{HostOps, Progress, SessionCore, SessionEvent, SessionSnapshot};
pub use crate::status::UserAction;

/// Contract types re-exported for hosts that only depend on this crate.
pub use session_contract::{
    AiContentRange, BackendError, ChannelFrame, Draft, FeedbackAction, SessionScope,
    SessionStatus,
};
