use async_trait::async_trait;
use futures_util::StreamExt;
use session_contract::{BackendError, ChannelConnection, ChannelTransport};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::WriterApiError;
use crate::url::channel_url;

/// Push-channel transport backed by a websocket per session key.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    base_url: String,
}

impl WebSocketTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn url_for(&self, session_key: &str) -> Result<Url, WriterApiError> {
        channel_url(&self.base_url, session_key)
    }
}

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn open(&self, session_key: &str) -> Result<Box<dyn ChannelConnection>, BackendError> {
        let url = self.url_for(session_key)?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| WriterApiError::WebSocket(error.to_string()))?;
        tracing::debug!(%url, "websocket connected");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ChannelConnection for WebSocketConnection {
    async fn next_text(&mut self) -> Option<Result<String, BackendError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|_| {
                        BackendError::channel("binary frame is not valid UTF-8")
                    }));
                }
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(error) => return Some(Err(BackendError::channel(error.to_string()))),
            }
        }
    }
}
