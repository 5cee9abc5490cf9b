//! The session reducer.
//!
//! [`SessionCore`] owns every piece of mutable session state and is driven from
//! two directions: user requests (`start_new`, `continue_writing`, ...) and
//! [`SessionEvent`]s coming back from the backend, the store, the push channel
//! and timers. Side effects are requested through [`HostOps`]; the core itself
//! never awaits.

use session_contract::{
    char_len, word_count, AiContentRange, BackendError, ChannelFrame, ContinueRequest, ContinueResponse,
    Draft, DraftStatus, FeedbackAction, FeedbackOutcome, FeedbackRequest, SaveDraftRequest,
    SessionScope, SessionStatus, StartSessionRequest,
};
use tracing::{debug, info, warn};

use crate::autosave::{AutosaveState, AutosaveStatus, SaveId, SaveTrigger};
use crate::buffer::{DraftBuffer, UnloadDecision};
use crate::channel::ChannelNotice;
use crate::error::SessionError;
use crate::message_log::{LogEntry, MessageLog};
use crate::mode::{ChapterBrief, ModeController, WriteMode};
use crate::range::full_buffer;
use crate::reconcile::{Generation, OperationKind, Reconciler};
use crate::status::{is_expected_transition, validate_user_action, UserAction};

/// Side effects the reducer asks its host to perform.
///
/// Every call returns immediately; results come back as [`SessionEvent`]s.
pub trait HostOps {
    fn start_session(&mut self, generation: Generation, request: StartSessionRequest);
    fn continue_or_insert(&mut self, generation: Generation, request: ContinueRequest);
    fn submit_feedback(&mut self, generation: Generation, request: FeedbackRequest);
    fn cancel_session(&mut self, generation: Generation);
    fn load_draft(&mut self, generation: Generation);
    fn save_draft(&mut self, save_id: SaveId, request: SaveDraftRequest);
    fn fetch_status(&mut self);
    fn schedule_indicator_reset(&mut self, save_id: SaveId);
    fn request_render(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Channel(ChannelNotice),
    SessionStarted {
        generation: Generation,
        result: Result<(), BackendError>,
    },
    ContinueCompleted {
        generation: Generation,
        result: Result<ContinueResponse, BackendError>,
    },
    FeedbackCompleted {
        generation: Generation,
        result: Result<FeedbackOutcome, BackendError>,
    },
    CancelCompleted {
        generation: Generation,
        result: Result<(), BackendError>,
    },
    DraftLoaded {
        generation: Generation,
        result: Result<Draft, BackendError>,
    },
    DraftSaved {
        save_id: SaveId,
        result: Result<Draft, BackendError>,
    },
    StatusFetched {
        result: Result<ChannelFrame, BackendError>,
    },
    AutosaveTick,
    IndicatorReset {
        save_id: SaveId,
    },
}

/// Pipeline progress reported alongside channel frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub chapter: Option<String>,
    pub iteration: Option<u32>,
    pub rewrite_iteration: Option<u32>,
}

/// Read-only view of the session published after every reducer step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub status_message: Option<String>,
    pub content: String,
    pub ai_range: Option<AiContentRange>,
    pub mode: WriteMode,
    pub insert_position: Option<usize>,
    pub messages: Vec<LogEntry>,
    pub autosave: AutosaveStatus,
    pub dirty: bool,
    pub draft_version: Option<u32>,
    pub connected: bool,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCore {
    scope: SessionScope,
    status: SessionStatus,
    status_message: Option<String>,
    buffer: DraftBuffer,
    modes: ModeController,
    log: MessageLog,
    reconciler: Reconciler,
    autosave: AutosaveState,
    connected: bool,
    progress: Progress,
}

impl SessionCore {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            scope,
            status: SessionStatus::Idle,
            status_message: None,
            buffer: DraftBuffer::default(),
            modes: ModeController::default(),
            log: MessageLog::default(),
            reconciler: Reconciler::default(),
            autosave: AutosaveState::default(),
            connected: false,
            progress: Progress::default(),
        }
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn buffer(&self) -> &DraftBuffer {
        &self.buffer
    }

    pub fn messages(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn autosave_status(&self) -> &AutosaveStatus {
        self.autosave.status()
    }

    pub fn mode(&self) -> WriteMode {
        self.modes.mode()
    }

    pub fn insert_position(&self) -> Option<usize> {
        self.modes.insert_position()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn current_generation(&self) -> Generation {
        self.reconciler.current()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.buffer.has_unsaved_changes()
    }

    pub fn confirm_unload(&self) -> UnloadDecision {
        self.buffer.confirm_unload()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            status_message: self.status_message.clone(),
            content: self.buffer.content().to_owned(),
            ai_range: self.buffer.ai_range(),
            mode: self.modes.mode(),
            insert_position: self.modes.insert_position(),
            messages: self.log.entries().to_vec(),
            autosave: self.autosave.status().clone(),
            dirty: self.buffer.is_dirty(),
            draft_version: self.buffer.version(),
            connected: self.connected,
            progress: self.progress.clone(),
        }
    }

    /// Direct user edit. `position` is the cursor where the edit happened.
    pub fn apply_user_edit(&mut self, new_content: String, position: usize, host: &mut dyn HostOps) {
        self.buffer.apply_user_edit(new_content, position);
        host.request_render();
    }

    pub fn set_mode(&mut self, mode: WriteMode, cursor: usize, host: &mut dyn HostOps) {
        self.modes.set_mode(mode, cursor);
        host.request_render();
    }

    pub fn refresh_insert_position(&mut self, cursor: usize, host: &mut dyn HostOps) -> bool {
        let refreshed = self.modes.refresh_insert_position(cursor);
        if refreshed {
            host.request_render();
        }
        refreshed
    }

    pub fn start_new(
        &mut self,
        brief: ChapterBrief,
        host: &mut dyn HostOps,
    ) -> Result<Generation, SessionError> {
        let next = validate_user_action(UserAction::StartNew, self.status)?;
        let summary = format!("New chapter \"{}\": {}", brief.title.trim(), brief.goal.trim());
        let request = self.modes.build_start(&self.scope.chapter_id, brief)?;

        let generation = self.reconciler.issue(OperationKind::Start);
        self.enter(next, None);
        self.log.push_user(summary);
        info!(%generation, chapter = %request.chapter_id, "starting chapter session");
        host.start_session(generation, request);
        host.request_render();
        Ok(generation)
    }

    pub fn continue_writing(
        &mut self,
        instruction: &str,
        target_word_count: u32,
        host: &mut dyn HostOps,
    ) -> Result<Generation, SessionError> {
        let next = validate_user_action(UserAction::Continue, self.status)?;
        let request = self.modes.build_continue(
            &self.scope.chapter_id,
            self.buffer.content(),
            instruction,
            target_word_count,
        )?;

        let generation = self.reconciler.issue(OperationKind::Continue);
        self.dispatch_generation(next, generation, OperationKind::Continue, request, host);
        Ok(generation)
    }

    pub fn insert_at_marker(
        &mut self,
        instruction: &str,
        target_word_count: u32,
        host: &mut dyn HostOps,
    ) -> Result<Generation, SessionError> {
        let next = validate_user_action(UserAction::Insert, self.status)?;
        let request = self.modes.build_insert(
            &self.scope.chapter_id,
            self.buffer.content(),
            self.buffer.len(),
            instruction,
            target_word_count,
        )?;

        self.modes.retire_insert_position();
        let generation = self.reconciler.issue(OperationKind::Insert);
        self.dispatch_generation(next, generation, OperationKind::Insert, request, host);
        Ok(generation)
    }

    pub fn submit_feedback(
        &mut self,
        action: FeedbackAction,
        comment: Option<&str>,
        host: &mut dyn HostOps,
    ) -> Result<Generation, SessionError> {
        let (user_action, kind) = match action {
            FeedbackAction::Revise => (UserAction::Revise, OperationKind::Revise),
            FeedbackAction::Confirm => (UserAction::Confirm, OperationKind::Confirm),
        };
        let next = validate_user_action(user_action, self.status)?;
        let comment = comment
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_owned);
        if action == FeedbackAction::Revise && comment.is_none() {
            return Err(SessionError::EmptyFeedback);
        }

        let generation = self.reconciler.issue(kind);
        self.enter(next, None);
        if action == FeedbackAction::Confirm {
            self.buffer.clear_ai_range();
        }
        self.log
            .push_user(comment.clone().unwrap_or_else(|| "Confirmed draft".to_owned()));
        info!(%generation, action = action.as_str(), "submitting feedback");
        host.submit_feedback(generation, FeedbackRequest { action, comment });
        host.request_render();
        Ok(generation)
    }

    /// Loads the stored draft into a freshly mounted session. Supersedes anything in
    /// flight; the draft lands without a highlight and becomes the saved baseline.
    pub fn open(&mut self, host: &mut dyn HostOps) -> Generation {
        let ticket = self.reconciler.open();
        debug!(generation = %ticket.generation, "loading stored draft");
        host.load_draft(ticket.generation);
        host.request_render();
        ticket.generation
    }

    /// Leaves a finished or failed session.
    pub fn reset(&mut self, host: &mut dyn HostOps) -> Result<(), SessionError> {
        let next = validate_user_action(UserAction::Reset, self.status)?;
        let generation = self.reconciler.reset();
        self.enter(next, None);
        self.log.clear();
        self.progress = Progress::default();
        debug!(%generation, "session reset");
        host.request_render();
        Ok(())
    }

    /// Abandons the running session. Results of earlier requests become stale.
    pub fn cancel(&mut self, host: &mut dyn HostOps) -> Result<Generation, SessionError> {
        let next = validate_user_action(UserAction::Cancel, self.status)?;
        let generation = self.reconciler.issue(OperationKind::Cancel);
        self.enter(next, None);
        self.log.push_user("Cancelled session");
        info!(%generation, "cancelling session");
        host.cancel_session(generation);
        host.request_render();
        Ok(generation)
    }

    /// Saves the current content regardless of the dirty flag.
    pub fn save_now(&mut self, host: &mut dyn HostOps) -> SaveId {
        let save_id = self.begin_save(host);
        host.request_render();
        save_id
    }

    /// Supersedes in-flight work when the host shuts down.
    pub fn shutdown(&mut self) {
        self.reconciler.reset();
        self.autosave.abandon_in_flight();
        self.connected = false;
    }

    pub fn apply_event(&mut self, event: SessionEvent, host: &mut dyn HostOps) {
        match event {
            SessionEvent::Channel(ChannelNotice::Connected) => {
                self.connected = true;
                host.fetch_status();
            }
            SessionEvent::Channel(ChannelNotice::Disconnected { reason }) => {
                self.connected = false;
                debug!(%reason, "channel disconnected");
            }
            SessionEvent::Channel(ChannelNotice::Frame(frame)) => self.apply_frame(frame, host),
            SessionEvent::StatusFetched { result } => match result {
                Ok(frame) => self.apply_frame(frame, host),
                Err(err) => warn!(error = %err, "status resync failed"),
            },
            SessionEvent::SessionStarted { generation, result } => {
                if let Err(err) = result {
                    self.fail_request(generation, "start", &err);
                } else if self.reconciler.is_current(generation) {
                    debug!(%generation, "session start accepted");
                }
            }
            SessionEvent::ContinueCompleted { generation, result } => match result {
                Ok(response) => self.apply_continue_response(generation, response),
                Err(err) => self.fail_request(generation, "continue", &err),
            },
            SessionEvent::FeedbackCompleted { generation, result } => match result {
                Ok(outcome) => {
                    if !self.reconciler.is_current(generation) {
                        debug!(%generation, "dropping stale feedback acknowledgement");
                    } else if let Some(message) = outcome.message.as_deref() {
                        self.log.push_assistant(message);
                    }
                }
                Err(err) => self.fail_request(generation, "feedback", &err),
            },
            SessionEvent::CancelCompleted { generation, result } => {
                if let Err(err) = result {
                    warn!(%generation, error = %err, "backend cancel failed");
                }
            }
            SessionEvent::DraftLoaded { generation, result } => {
                self.apply_reload(generation, result);
            }
            SessionEvent::DraftSaved { save_id, result } => {
                self.apply_save_result(save_id, result, host);
            }
            SessionEvent::AutosaveTick => {
                if self
                    .autosave
                    .should_save(SaveTrigger::Interval, self.buffer.is_dirty())
                {
                    self.begin_save(host);
                }
            }
            SessionEvent::IndicatorReset { save_id } => {
                self.autosave.reset_indicator(save_id);
            }
        }
        host.request_render();
    }

    fn enter(&mut self, status: SessionStatus, message: Option<String>) {
        self.status = status;
        self.status_message = message;
    }

    fn dispatch_generation(
        &mut self,
        next: SessionStatus,
        generation: Generation,
        kind: OperationKind,
        request: ContinueRequest,
        host: &mut dyn HostOps,
    ) {
        self.enter(next, None);
        self.log.push_user(request.instruction.clone());
        info!(
            %generation,
            kind = kind.as_str(),
            insert_position = ?request.insert_position,
            target_word_count = request.target_word_count,
            "requesting generation"
        );
        host.continue_or_insert(generation, request);
        host.request_render();
    }

    fn apply_frame(&mut self, frame: ChannelFrame, host: &mut dyn HostOps) {
        self.record_progress(&frame);
        if let Some(message) = frame.message.as_deref() {
            self.log.push_assistant(message);
        }
        let Some(status) = frame.status else {
            return;
        };

        if !is_expected_transition(self.status, status) {
            debug!(from = %self.status, to = %status, "unexpected status transition");
        }
        self.enter(status, frame.message);

        if status.publishes_content() {
            if let Some(ticket) = self.reconciler.request_reload(self.buffer.is_dirty()) {
                debug!(generation = %ticket.generation, range = ?ticket.range, %status, "reloading draft");
                host.load_draft(ticket.generation);
            }
        }
    }

    fn record_progress(&mut self, frame: &ChannelFrame) {
        if frame.chapter.is_some() {
            self.progress.chapter.clone_from(&frame.chapter);
        }
        if frame.iteration.is_some() {
            self.progress.iteration = frame.iteration;
        }
        if frame.rewrite_iteration.is_some() {
            self.progress.rewrite_iteration = frame.rewrite_iteration;
        }
    }

    fn apply_continue_response(&mut self, generation: Generation, response: ContinueResponse) {
        if !self.reconciler.admit_response(generation) {
            debug!(%generation, "dropping stale generation response");
            return;
        }

        let content = response.draft.content;
        let range = match response.ai_content_range {
            Some(range) => Some(range),
            None => full_buffer(char_len(&content)),
        };
        self.buffer.replace(content, range);
        if self.status == SessionStatus::Writing {
            self.enter(SessionStatus::Idle, None);
        }
        info!(
            %generation,
            new_content_length = response.new_content_length,
            "applied generated content"
        );
    }

    fn apply_reload(&mut self, generation: Generation, result: Result<Draft, BackendError>) {
        match result {
            Ok(draft) => {
                let Some(policy) = self
                    .reconciler
                    .admit_reload(generation, self.buffer.is_dirty())
                else {
                    debug!(%generation, "dropping superseded draft reload");
                    return;
                };
                let range = policy.resolve(char_len(&draft.content));
                debug!(%generation, version = draft.version, "loaded draft");
                self.buffer.load(draft, range);
            }
            Err(err) => {
                self.reconciler.reload_failed(generation);
                warn!(%generation, error = %err, "draft reload failed");
            }
        }
    }

    fn fail_request(&mut self, generation: Generation, operation: &str, err: &BackendError) {
        if !self.reconciler.is_current(generation) {
            debug!(%generation, operation, error = %err, "dropping stale request failure");
            return;
        }
        warn!(%generation, operation, error = %err, "request failed");
        self.enter(SessionStatus::Error, Some(err.to_string()));
    }

    fn begin_save(&mut self, host: &mut dyn HostOps) -> SaveId {
        let content = self.buffer.content().to_owned();
        let request = SaveDraftRequest {
            chapter_id: self.scope.chapter_id.clone(),
            word_count: word_count(&content),
            content: content.clone(),
            status: DraftStatus::Draft,
        };
        let save_id = self.autosave.begin(content);
        debug!(save_id, "saving draft");
        host.save_draft(save_id, request);
        save_id
    }

    fn apply_save_result(
        &mut self,
        save_id: SaveId,
        result: Result<Draft, BackendError>,
        host: &mut dyn HostOps,
    ) {
        match result {
            Ok(draft) => {
                if let Some(snapshot) = self.autosave.succeed(save_id) {
                    self.buffer.mark_persisted(snapshot, draft.version);
                    debug!(save_id, version = draft.version, "draft saved");
                }
                if matches!(self.autosave.status(), AutosaveStatus::Saved { .. }) {
                    if let Some(shown) = self.autosave.shown_save() {
                        host.schedule_indicator_reset(shown);
                    }
                }
            }
            Err(err) => {
                warn!(save_id, error = %err, "draft save failed");
                self.autosave.fail(save_id, err.to_string());
            }
        }
    }
}
