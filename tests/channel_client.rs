use std::sync::Arc;
use std::time::Duration;

use draft_session::{BackendError, ChannelClient, ChannelNotice, SessionStatus};
use session_backend_mock::MockChannelTransport;
use tokio::sync::mpsc;
use tokio::time::Instant;

const RECONNECT: Duration = Duration::from_secs(3);

fn client(transport: &MockChannelTransport) -> (ChannelClient, mpsc::UnboundedReceiver<ChannelNotice>) {
    let client = ChannelClient::with_reconnect_delay(Arc::new(transport.clone()), RECONNECT);
    let (tx, rx) = mpsc::unbounded_channel();
    client.subscribe(tx);
    (client, rx)
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<ChannelNotice>) -> ChannelNotice {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("notice timed out")
        .expect("channel client dropped subscriber")
}

#[tokio::test(start_paused = true)]
async fn frames_are_dispatched_in_arrival_order() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    assert!(client.connect("novel-7"));
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    assert!(transport.push_status(SessionStatus::Briefing, None));
    assert!(transport.push_status(SessionStatus::Writing, Some("Drafting chapter 12")));

    let ChannelNotice::Frame(first) = next_notice(&mut rx).await else {
        panic!("expected frame");
    };
    let ChannelNotice::Frame(second) = next_notice(&mut rx).await else {
        panic!("expected frame");
    };
    assert_eq!(first.status, Some(SessionStatus::Briefing));
    assert_eq!(second.status, Some(SessionStatus::Writing));
    assert_eq!(second.message.as_deref(), Some("Drafting chapter 12"));
    assert_eq!(transport.session_keys(), vec!["novel-7".to_string()]);

    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    client.connect("novel-7");
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    transport.push_text("not json");
    transport.push_text("[1, 2, 3]");
    transport.push_text(r#"{"status": "waiting", "extra": {"nested": true}}"#);

    let ChannelNotice::Frame(frame) = next_notice(&mut rx).await else {
        panic!("expected frame");
    };
    assert_eq!(frame.status, Some(SessionStatus::Waiting));
    assert!(transport.is_connected());

    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_fixed_delay() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    client.connect("novel-7");
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    let closed_at = Instant::now();
    transport.close();
    assert!(matches!(
        next_notice(&mut rx).await,
        ChannelNotice::Disconnected { .. }
    ));

    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);
    assert!(closed_at.elapsed() >= RECONNECT);
    assert_eq!(transport.open_count(), 2);

    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn receive_error_triggers_reconnect() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    client.connect("novel-7");
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    transport.push_error(BackendError::channel("socket reset"));
    assert_eq!(
        next_notice(&mut rx).await,
        ChannelNotice::Disconnected {
            reason: "channel error: socket reset".to_string()
        }
    );
    transport.wait_for_opens(2).await;

    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn failed_open_is_retried() {
    let transport = MockChannelTransport::new();
    transport.fail_next_open(BackendError::channel("connection refused"));
    let (client, mut rx) = client(&transport);

    let started = Instant::now();
    client.connect("novel-7");
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);
    assert!(started.elapsed() >= RECONNECT);
    assert_eq!(transport.open_count(), 1);

    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn nothing_is_dispatched_after_disconnect() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    client.connect("novel-7");
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    client.disconnect();
    client.disconnect();
    transport.push_status(SessionStatus::Completed, None);
    transport.close();
    tokio::time::sleep(RECONNECT * 3).await;

    assert_eq!(rx.recv().await, None);
    assert_eq!(transport.open_count(), 1);
    assert!(!client.is_running());
}

#[tokio::test(start_paused = true)]
async fn second_connect_is_rejected_while_running() {
    let transport = MockChannelTransport::new();
    let (client, mut rx) = client(&transport);
    assert!(client.connect("novel-7"));
    assert!(!client.connect("novel-7"));
    assert_eq!(next_notice(&mut rx).await, ChannelNotice::Connected);

    client.disconnect();
    assert!(client.connect("novel-7"));
    client.disconnect();
}
