//! Async host for [`SessionCore`].
//!
//! The controller owns the reducer loop, the autosave timer, the push channel and
//! every spawned backend request. All of them live under one cancellation token
//! per `start()`/`stop()` cycle.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use session_contract::{
    ChannelTransport, ContinueRequest, DraftStore, FeedbackAction, FeedbackRequest,
    SaveDraftRequest, SessionBackend, SessionScope, StartSessionRequest,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use writer_api::{WebSocketTransport, WriterApiClient, WriterApiError};

use crate::autosave::SaveId;
use crate::buffer::UnloadDecision;
use crate::channel::{ChannelClient, ChannelNotice};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::mode::{ChapterBrief, WriteMode};
use crate::reconcile::Generation;
use crate::session::{HostOps, SessionCore, SessionEvent, SessionSnapshot};

struct Running {
    cancel: CancellationToken,
    host: TaskHost,
    tasks: Vec<JoinHandle<()>>,
}

pub struct SessionController {
    scope: SessionScope,
    config: SessionConfig,
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn DraftStore>,
    channel: ChannelClient,
    core: Arc<Mutex<SessionCore>>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    running: Mutex<Option<Running>>,
}

impl SessionController {
    pub fn new(
        scope: SessionScope,
        config: SessionConfig,
        backend: Arc<dyn SessionBackend>,
        store: Arc<dyn DraftStore>,
        transport: Arc<dyn ChannelTransport>,
    ) -> Self {
        let core = SessionCore::new(scope.clone());
        let (snapshots, _) = watch::channel(core.snapshot());
        Self {
            channel: ChannelClient::with_reconnect_delay(transport, config.reconnect_delay),
            scope,
            config,
            backend,
            store,
            core: Arc::new(Mutex::new(core)),
            snapshots: Arc::new(snapshots),
            running: Mutex::new(None),
        }
    }

    /// Controller talking to the HTTP backend and its websocket channel.
    pub fn with_writer_api(
        scope: SessionScope,
        config: SessionConfig,
    ) -> Result<Self, WriterApiError> {
        let client = Arc::new(WriterApiClient::new(config.writer_api_config())?);
        let transport = Arc::new(WebSocketTransport::new(client.api_base()));
        Ok(Self::new(
            scope,
            config,
            Arc::clone(&client) as Arc<dyn SessionBackend>,
            client,
            transport,
        ))
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock_unpoisoned(&self.core).snapshot()
    }

    pub fn is_running(&self) -> bool {
        lock_unpoisoned(&self.running).is_some()
    }

    /// Spawns the reducer loop, the autosave timer and the channel connection.
    /// Returns `false` if already running. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = lock_unpoisoned(&self.running);
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let host = TaskHost {
            scope: self.scope.clone(),
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            events: events_tx.clone(),
            cancel: cancel.clone(),
            indicator_reset: self.config.saved_indicator_reset,
            render_requested: false,
        };

        let reducer = tokio::spawn(run_reducer(
            Arc::clone(&self.core),
            host.clone(),
            events_rx,
            channel_rx,
            Arc::clone(&self.snapshots),
            cancel.clone(),
        ));
        let autosave = tokio::spawn(run_autosave_timer(
            events_tx,
            self.config.autosave_interval,
            cancel.clone(),
        ));

        {
            let mut opener = host.clone();
            let mut core = lock_unpoisoned(&self.core);
            core.open(&mut opener);
            if opener.take_render_request() {
                self.snapshots.send_replace(core.snapshot());
            }
        }

        self.channel.subscribe(channel_tx);
        self.channel.connect(self.scope.channel_key());

        info!(
            project = %self.scope.project_id,
            chapter = %self.scope.chapter_id,
            "session controller started"
        );
        *running = Some(Running {
            cancel,
            host,
            tasks: vec![reducer, autosave],
        });
        true
    }

    /// Closes the channel, stops timers and abandons in-flight requests. Safe to call repeatedly.
    pub fn stop(&self) {
        let Some(running) = lock_unpoisoned(&self.running).take() else {
            return;
        };
        self.channel.disconnect();
        running.cancel.cancel();
        for task in running.tasks {
            task.abort();
        }

        let mut core = lock_unpoisoned(&self.core);
        core.shutdown();
        self.snapshots.send_replace(core.snapshot());
        info!("session controller stopped");
    }

    pub fn apply_user_edit(&self, new_content: String, position: usize) -> Result<(), SessionError> {
        self.with_core(|core, host| core.apply_user_edit(new_content, position, host))
    }

    pub fn set_mode(&self, mode: WriteMode, cursor: usize) -> Result<(), SessionError> {
        self.with_core(|core, host| core.set_mode(mode, cursor, host))
    }

    pub fn refresh_insert_position(&self, cursor: usize) -> Result<bool, SessionError> {
        self.with_core(|core, host| core.refresh_insert_position(cursor, host))
    }

    pub fn start_new(&self, brief: ChapterBrief) -> Result<Generation, SessionError> {
        self.with_core(|core, host| core.start_new(brief, host))?
    }

    pub fn continue_writing(
        &self,
        instruction: &str,
        target_word_count: u32,
    ) -> Result<Generation, SessionError> {
        self.with_core(|core, host| core.continue_writing(instruction, target_word_count, host))?
    }

    pub fn insert_at_marker(
        &self,
        instruction: &str,
        target_word_count: u32,
    ) -> Result<Generation, SessionError> {
        self.with_core(|core, host| core.insert_at_marker(instruction, target_word_count, host))?
    }

    pub fn submit_feedback(
        &self,
        action: FeedbackAction,
        comment: Option<&str>,
    ) -> Result<Generation, SessionError> {
        self.with_core(|core, host| core.submit_feedback(action, comment, host))?
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.with_core(|core, host| core.reset(host))?
    }

    pub fn cancel(&self) -> Result<Generation, SessionError> {
        self.with_core(|core, host| core.cancel(host))?
    }

    pub fn save_now(&self) -> Result<SaveId, SessionError> {
        self.with_core(|core, host| core.save_now(host))
    }

    pub fn has_unsaved_changes(&self) -> bool {
        lock_unpoisoned(&self.core).has_unsaved_changes()
    }

    pub fn confirm_unload(&self) -> UnloadDecision {
        lock_unpoisoned(&self.core).confirm_unload()
    }

    fn with_core<R>(
        &self,
        apply: impl FnOnce(&mut SessionCore, &mut dyn HostOps) -> R,
    ) -> Result<R, SessionError> {
        let running = lock_unpoisoned(&self.running);
        let Some(running) = running.as_ref() else {
            return Err(SessionError::NotRunning);
        };
        let mut host = running.host.clone();
        let mut core = lock_unpoisoned(&self.core);
        let result = apply(&mut *core, &mut host);
        if host.take_render_request() {
            self.snapshots.send_replace(core.snapshot());
        }
        Ok(result)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs host side effects as tasks scoped to the controller's cancellation token.
#[derive(Clone)]
struct TaskHost {
    scope: SessionScope,
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn DraftStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    indicator_reset: Duration,
    render_requested: bool,
}

impl TaskHost {
    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                event = work => {
                    let _ = events.send(event);
                }
            }
        });
    }

    fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }
}

impl HostOps for TaskHost {
    fn start_session(&mut self, generation: Generation, request: StartSessionRequest) {
        let backend = Arc::clone(&self.backend);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = backend.start_session(&scope, request).await;
            SessionEvent::SessionStarted { generation, result }
        });
    }

    fn continue_or_insert(&mut self, generation: Generation, request: ContinueRequest) {
        let backend = Arc::clone(&self.backend);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = backend.continue_or_insert(&scope, request).await;
            SessionEvent::ContinueCompleted { generation, result }
        });
    }

    fn submit_feedback(&mut self, generation: Generation, request: FeedbackRequest) {
        let backend = Arc::clone(&self.backend);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = backend.submit_feedback(&scope, request).await;
            SessionEvent::FeedbackCompleted { generation, result }
        });
    }

    fn cancel_session(&mut self, generation: Generation) {
        let backend = Arc::clone(&self.backend);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = backend.cancel_session(&scope).await;
            SessionEvent::CancelCompleted { generation, result }
        });
    }

    fn load_draft(&mut self, generation: Generation) {
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = store.get_draft(&scope).await;
            SessionEvent::DraftLoaded { generation, result }
        });
    }

    fn save_draft(&mut self, save_id: SaveId, request: SaveDraftRequest) {
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = store.save_draft(&scope, request).await;
            SessionEvent::DraftSaved { save_id, result }
        });
    }

    fn fetch_status(&mut self) {
        let backend = Arc::clone(&self.backend);
        let scope = self.scope.clone();
        self.spawn(async move {
            let result = backend.fetch_status(&scope).await;
            SessionEvent::StatusFetched { result }
        });
    }

    fn schedule_indicator_reset(&mut self, save_id: SaveId) {
        let delay = self.indicator_reset;
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            SessionEvent::IndicatorReset { save_id }
        });
    }

    fn request_render(&mut self) {
        self.render_requested = true;
    }
}

async fn run_reducer(
    core: Arc<Mutex<SessionCore>>,
    mut host: TaskHost,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut channel: mpsc::UnboundedReceiver<ChannelNotice>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(notice) = channel.recv() => SessionEvent::Channel(notice),
            Some(event) = events.recv() => event,
            else => break,
        };

        let mut state = lock_unpoisoned(&core);
        state.apply_event(event, &mut host);
        if host.take_render_request() {
            snapshots.send_replace(state.snapshot());
        }
    }
    debug!("session reducer exited");
}

async fn run_autosave_timer(
    events: mpsc::UnboundedSender<SessionEvent>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticks.tick() => {}
        }
        if events.send(SessionEvent::AutosaveTick).is_err() {
            return;
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
