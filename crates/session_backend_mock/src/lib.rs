//! Deterministic doubles for the `session_contract` seams.
//!
//! This crate contains no transport logic. It backs host-level tests and local
//! runs with scripted results, an in-memory draft store and an in-process push
//! channel.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use session_contract::{
    char_len, AiContentRange, BackendError, ChannelFrame, ContinueRequest, ContinueResponse,
    FeedbackOutcome, FeedbackRequest, GeneratedDraft, SessionBackend, SessionScope,
    StartSessionRequest,
};
use tokio::sync::oneshot;

mod channel;
mod store;

pub use channel::MockChannelTransport;
pub use store::InMemoryDraftStore;

/// Releases a held scripted result when dropped or released.
#[derive(Debug)]
pub struct ResponseGate(oneshot::Sender<()>);

impl ResponseGate {
    fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug)]
struct Scripted<T> {
    result: Result<T, BackendError>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Result<T, BackendError> {
        if let Some(gate) = self.gate {
            let _ = gate.await;
        }
        self.result
    }
}

fn immediate<T>(result: Result<T, BackendError>) -> Scripted<T> {
    Scripted { result, gate: None }
}

fn gated<T>(result: Result<T, BackendError>) -> (Scripted<T>, ResponseGate) {
    let (gate, rx) = ResponseGate::pair();
    (
        Scripted {
            result,
            gate: Some(rx),
        },
        gate,
    )
}

/// One recorded call against [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Start(StartSessionRequest),
    Continue(ContinueRequest),
    Feedback(FeedbackRequest),
    Cancel,
    FetchStatus,
}

#[derive(Debug, Default)]
struct ScriptState {
    calls: Vec<BackendCall>,
    start: VecDeque<Scripted<()>>,
    continues: VecDeque<Scripted<ContinueResponse>>,
    feedback: VecDeque<Scripted<FeedbackOutcome>>,
    cancel: VecDeque<Scripted<()>>,
    status: VecDeque<Scripted<ChannelFrame>>,
}

/// Scripted [`SessionBackend`]. Unscripted calls succeed with deterministic defaults.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    state: Mutex<ScriptState>,
}

impl ScriptedBackend {
    /// Marker appended by unscripted continue/insert calls.
    pub const GENERATED_TEXT: &'static str = "[generated]";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, result: Result<(), BackendError>) {
        lock_unpoisoned(&self.state).start.push_back(immediate(result));
    }

    pub fn push_continue(&self, result: Result<ContinueResponse, BackendError>) {
        lock_unpoisoned(&self.state)
            .continues
            .push_back(immediate(result));
    }

    /// Queues a continue result that is held until the returned gate is released.
    #[must_use]
    pub fn push_continue_gated(
        &self,
        result: Result<ContinueResponse, BackendError>,
    ) -> ResponseGate {
        let (scripted, gate) = gated(result);
        lock_unpoisoned(&self.state).continues.push_back(scripted);
        gate
    }

    pub fn push_feedback(&self, result: Result<FeedbackOutcome, BackendError>) {
        lock_unpoisoned(&self.state)
            .feedback
            .push_back(immediate(result));
    }

    #[must_use]
    pub fn push_feedback_gated(
        &self,
        result: Result<FeedbackOutcome, BackendError>,
    ) -> ResponseGate {
        let (scripted, gate) = gated(result);
        lock_unpoisoned(&self.state).feedback.push_back(scripted);
        gate
    }

    pub fn push_cancel(&self, result: Result<(), BackendError>) {
        lock_unpoisoned(&self.state).cancel.push_back(immediate(result));
    }

    pub fn push_status(&self, result: Result<ChannelFrame, BackendError>) {
        lock_unpoisoned(&self.state).status.push_back(immediate(result));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    #[must_use]
    pub fn continue_calls(&self) -> Vec<ContinueRequest> {
        lock_unpoisoned(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Continue(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn start_session(
        &self,
        _scope: &SessionScope,
        request: StartSessionRequest,
    ) -> Result<(), BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(BackendCall::Start(request));
            state.start.pop_front()
        };
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(()),
        }
    }

    async fn continue_or_insert(
        &self,
        _scope: &SessionScope,
        request: ContinueRequest,
    ) -> Result<ContinueResponse, BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(BackendCall::Continue(request.clone()));
            state.continues.pop_front()
        };
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(generate(&request)),
        }
    }

    async fn submit_feedback(
        &self,
        _scope: &SessionScope,
        request: FeedbackRequest,
    ) -> Result<FeedbackOutcome, BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(BackendCall::Feedback(request));
            state.feedback.pop_front()
        };
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(FeedbackOutcome::default()),
        }
    }

    async fn cancel_session(&self, _scope: &SessionScope) -> Result<(), BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(BackendCall::Cancel);
            state.cancel.pop_front()
        };
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(()),
        }
    }

    async fn fetch_status(&self, _scope: &SessionScope) -> Result<ChannelFrame, BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(BackendCall::FetchStatus);
            state.status.pop_front()
        };
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(ChannelFrame::default()),
        }
    }
}

/// Inserts [`ScriptedBackend::GENERATED_TEXT`] at the requested offset (or the end)
/// and reports the exact span it occupies.
fn generate(request: &ContinueRequest) -> ContinueResponse {
    let existing_len = char_len(&request.existing_content);
    let at = request
        .insert_position
        .unwrap_or(existing_len)
        .min(existing_len);
    let byte_at = request
        .existing_content
        .char_indices()
        .nth(at)
        .map_or(request.existing_content.len(), |(index, _)| index);

    let mut content = String::with_capacity(
        request.existing_content.len() + ScriptedBackend::GENERATED_TEXT.len(),
    );
    content.push_str(&request.existing_content[..byte_at]);
    content.push_str(ScriptedBackend::GENERATED_TEXT);
    content.push_str(&request.existing_content[byte_at..]);

    let length = char_len(&content);
    ContinueResponse {
        draft: GeneratedDraft {
            content,
            word_count: length,
        },
        new_content_length: length,
        ai_content_range: Some(AiContentRange::new(
            at,
            at + char_len(ScriptedBackend::GENERATED_TEXT),
        )),
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
