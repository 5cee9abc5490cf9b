use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures_util::SinkExt;
use session_contract::{
    BackendError, ChannelConnection, ChannelTransport, ContinueRequest, DraftStatus, DraftStore,
    SaveDraftRequest, SessionBackend, SessionScope,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use writer_api::{WebSocketTransport, WriterApiClient, WriterApiConfig};

fn allow_local_integration() -> bool {
    std::env::var("WRITER_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond { status: u16, body: String },
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}/api");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        body: body.to_owned(),
    }
}

fn scope() -> SessionScope {
    SessionScope::new("novel-1", "ch-01")
}

#[tokio::test]
async fn draft_fetch_retries_transient_status_then_succeeds() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(503, r#"{"detail":"overloaded"}"#),
        response_json(
            200,
            r#"{"chapter":"ch-01","version":3,"content":"Hello","word_count":5,"status":"draft"}"#,
        ),
    ])
    .await;
    let client = WriterApiClient::new(WriterApiConfig::new(&server.base_url)).expect("client");

    let draft = timeout(Duration::from_secs(12), DraftStore::get_draft(&client, &scope()))
        .await
        .expect("retry path should be bounded")
        .expect("draft fetch should eventually succeed");

    assert_eq!(draft.version, 3);
    assert_eq!(draft.content, "Hello");
    assert_eq!(server.request_count(), 2);

    server.shutdown();
}

#[tokio::test]
async fn draft_save_is_never_retried() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(503, r#"{"detail":"overloaded"}"#),
        response_json(200, r#"{"chapter":"ch-01","version":9,"content":"x"}"#),
    ])
    .await;
    let client = WriterApiClient::new(WriterApiConfig::new(&server.base_url)).expect("client");

    let error = DraftStore::save_draft(
        &client,
        &scope(),
        SaveDraftRequest {
            chapter_id: "ch-01".to_owned(),
            content: "x".to_owned(),
            word_count: 1,
            status: DraftStatus::Draft,
        },
    )
    .await
    .expect_err("503 should surface");

    assert_eq!(
        error,
        BackendError::Status {
            status: 503,
            message: "overloaded".to_owned()
        }
    );
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn continue_success_false_surfaces_as_rejection() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r#"{"success":false,"error":"generation failed"}"#,
    )])
    .await;
    let client = WriterApiClient::new(WriterApiConfig::new(&server.base_url)).expect("client");

    let error = SessionBackend::continue_or_insert(
        &client,
        &scope(),
        ContinueRequest {
            chapter_id: "ch-01".to_owned(),
            existing_content: "Once.".to_owned(),
            instruction: "go on".to_owned(),
            target_word_count: 300,
            insert_position: None,
        },
    )
    .await
    .expect_err("rejection");

    assert_eq!(error, BackendError::Rejected("generation failed".to_owned()));

    server.shutdown();
}

#[tokio::test]
async fn connection_reset_exhausts_status_retries() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
    ])
    .await;
    let client = WriterApiClient::new(WriterApiConfig::new(&server.base_url)).expect("client");

    let error = timeout(
        Duration::from_secs(20),
        SessionBackend::fetch_status(&client, &scope()),
    )
    .await
    .expect("retry path should resolve")
    .expect_err("connection reset should surface as failure");

    assert!(matches!(error, BackendError::Transport(_)));
    assert!(server.request_count() >= 4);

    server.shutdown();
}

#[tokio::test]
async fn websocket_transport_yields_text_frames_until_close() {
    if !allow_local_integration() {
        return;
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("local TCP listener should bind");
    let addr = listener.local_addr().expect("listener address");
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(socket)
            .await
            .expect("handshake");
        ws.send(Message::Text(r#"{"status":"writing"}"#.to_owned()))
            .await
            .expect("send");
        ws.send(Message::Ping(Vec::new())).await.expect("ping");
        ws.send(Message::Text(r#"{"status":"waiting"}"#.to_owned()))
            .await
            .expect("send");
        ws.close(None).await.expect("close");
    });

    let transport = WebSocketTransport::new(format!("http://{addr}/api"));
    let mut connection = transport.open("novel-1").await.expect("open");

    assert_eq!(
        connection.next_text().await,
        Some(Ok(r#"{"status":"writing"}"#.to_owned()))
    );
    assert_eq!(
        connection.next_text().await,
        Some(Ok(r#"{"status":"waiting"}"#.to_owned()))
    );
    assert_eq!(connection.next_text().await, None);

    server.await.expect("server task");
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
) {
    if read_request_headers(&mut socket).await.is_err() {
        return;
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r#"{"detail":"unexpected request"}"#));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_reason(status),
                body.len(),
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_request_headers(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(());
        }
    }
}
