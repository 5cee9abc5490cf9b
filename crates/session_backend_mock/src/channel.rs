use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use session_contract::{BackendError, ChannelConnection, ChannelTransport, SessionStatus};
use tokio::sync::{mpsc, Notify};

use crate::lock_unpoisoned;

type Inbound = Result<String, BackendError>;

#[derive(Debug, Default)]
struct ChannelState {
    session_keys: Vec<String>,
    current: Option<mpsc::UnboundedSender<Inbound>>,
    open_failures: VecDeque<BackendError>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ChannelState>,
    opened: Notify,
}

/// In-process push channel. Clones share one connection slot, so a test keeps a
/// clone to feed frames into whatever connection the client currently holds.
#[derive(Debug, Clone, Default)]
pub struct MockChannelTransport {
    shared: Arc<Shared>,
}

impl MockChannelTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail with `error`.
    pub fn fail_next_open(&self, error: BackendError) {
        lock_unpoisoned(&self.shared.state)
            .open_failures
            .push_back(error);
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        lock_unpoisoned(&self.shared.state).session_keys.len()
    }

    #[must_use]
    pub fn session_keys(&self) -> Vec<String> {
        lock_unpoisoned(&self.shared.state).session_keys.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock_unpoisoned(&self.shared.state)
            .current
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Resolves once at least `count` successful opens happened.
    pub async fn wait_for_opens(&self, count: usize) {
        loop {
            let notified = self.shared.opened.notified();
            if self.open_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Delivers a raw text frame to the live connection. Returns false when none is open.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.deliver(Ok(text.into()))
    }

    pub fn push_json(&self, value: Value) -> bool {
        self.push_text(value.to_string())
    }

    pub fn push_status(&self, status: SessionStatus, message: Option<&str>) -> bool {
        let mut frame = json!({ "status": status.as_str() });
        if let Some(message) = message {
            frame["message"] = Value::String(message.to_owned());
        }
        self.push_json(frame)
    }

    /// Delivers a receive error to the live connection.
    pub fn push_error(&self, error: BackendError) -> bool {
        self.deliver(Err(error))
    }

    /// Closes the live connection from the server side.
    pub fn close(&self) {
        lock_unpoisoned(&self.shared.state).current = None;
    }

    fn deliver(&self, inbound: Inbound) -> bool {
        let state = lock_unpoisoned(&self.shared.state);
        state
            .current
            .as_ref()
            .is_some_and(|sender| sender.send(inbound).is_ok())
    }
}

#[async_trait]
impl ChannelTransport for MockChannelTransport {
    async fn open(&self, session_key: &str) -> Result<Box<dyn ChannelConnection>, BackendError> {
        let receiver = {
            let mut state = lock_unpoisoned(&self.shared.state);
            if let Some(error) = state.open_failures.pop_front() {
                return Err(error);
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            state.current = Some(sender);
            state.session_keys.push(session_key.to_owned());
            receiver
        };
        self.shared.opened.notify_waiters();
        Ok(Box::new(MockConnection { receiver }))
    }
}

struct MockConnection {
    receiver: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl ChannelConnection for MockConnection {
    async fn next_text(&mut self) -> Option<Result<String, BackendError>> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn frames_reach_the_open_connection_until_close() {
        let transport = MockChannelTransport::new();
        assert!(!transport.push_text("{}"));

        let mut connection = transport.open("novel-1").await.expect("open");
        assert!(transport.push_status(SessionStatus::Writing, Some("drafting")));
        transport.close();

        let text = connection.next_text().await.expect("frame").expect("ok");
        let value: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value, json!({"status": "writing", "message": "drafting"}));
        assert!(connection.next_text().await.is_none());
        assert_eq!(transport.session_keys(), vec!["novel-1".to_owned()]);
    }

    #[tokio::test]
    async fn scripted_open_failure_is_consumed_once() {
        let transport = MockChannelTransport::new();
        transport.fail_next_open(BackendError::channel("refused"));

        assert!(transport.open("p").await.is_err());
        assert!(transport.open("p").await.is_ok());
        assert_eq!(transport.open_count(), 1);
    }
}
