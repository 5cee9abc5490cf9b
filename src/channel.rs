//! Push channel client with automatic reconnection.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use session_contract::{ChannelFrame, ChannelTransport};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// What subscribers hear from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    Connected,
    Frame(ChannelFrame),
    Disconnected { reason: String },
}

type Subscribers = Arc<Mutex<Vec<UnboundedSender<ChannelNotice>>>>;

struct ChannelTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps one receive-only connection open for a session key.
///
/// Frames are forwarded in arrival order. When the connection drops, a new one
/// is attempted after `reconnect_delay` until [`ChannelClient::disconnect`] runs.
pub struct ChannelClient {
    transport: Arc<dyn ChannelTransport>,
    reconnect_delay: Duration,
    subscribers: Subscribers,
    task: Mutex<Option<ChannelTask>>,
}

impl ChannelClient {
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        Self::with_reconnect_delay(transport, DEFAULT_RECONNECT_DELAY)
    }

    pub fn with_reconnect_delay(
        transport: Arc<dyn ChannelTransport>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            transport,
            reconnect_delay,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, subscriber: UnboundedSender<ChannelNotice>) {
        lock_unpoisoned(&self.subscribers).push(subscriber);
    }

    pub fn is_running(&self) -> bool {
        lock_unpoisoned(&self.task)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Spawns the connection loop. Returns `false` when one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, session_key: &str) -> bool {
        let mut task = lock_unpoisoned(&self.task);
        if task.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_connection(
            Arc::clone(&self.transport),
            session_key.to_owned(),
            self.reconnect_delay,
            Arc::clone(&self.subscribers),
            cancel.clone(),
        ));
        *task = Some(ChannelTask { cancel, handle });
        true
    }

    /// Stops the connection loop and any pending reconnect. Safe to call repeatedly.
    ///
    /// Subscribers are detached first, so nothing is dispatched once this returns.
    pub fn disconnect(&self) {
        lock_unpoisoned(&self.subscribers).clear();
        if let Some(task) = lock_unpoisoned(&self.task).take() {
            task.cancel.cancel();
            task.handle.abort();
            debug!("channel client disconnected");
        }
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_connection(
    transport: Arc<dyn ChannelTransport>,
    session_key: String,
    reconnect_delay: Duration,
    subscribers: Subscribers,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = transport.open(&session_key) => opened,
        };

        match opened {
            Ok(mut connection) => {
                info!(%session_key, attempt, "channel connected");
                attempt = 0;
                dispatch(&subscribers, ChannelNotice::Connected);

                let reason = loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = connection.next_text() => next,
                    };
                    match next {
                        Some(Ok(text)) => match ChannelFrame::parse(&text) {
                            Ok(frame) => dispatch(&subscribers, ChannelNotice::Frame(frame)),
                            Err(err) => warn!(error = %err, "dropping malformed channel frame"),
                        },
                        Some(Err(err)) => break err.to_string(),
                        None => break "connection closed".to_owned(),
                    }
                };

                info!(%session_key, %reason, "channel lost; reconnecting");
                dispatch(&subscribers, ChannelNotice::Disconnected { reason });
            }
            Err(err) => {
                warn!(%session_key, attempt, error = %err, "channel connect failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

fn dispatch(subscribers: &Subscribers, notice: ChannelNotice) {
    let mut subscribers = lock_unpoisoned(subscribers);
    subscribers.retain(|subscriber| subscriber.send(notice.clone()).is_ok());
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
