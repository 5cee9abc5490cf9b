//! Transport-only client for the chapter-writing backend.
//!
//! This crate owns request building, response decoding and the push-channel
//! socket. It holds no session state; the host crate decides what a response
//! means for the buffer.

pub mod backend;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod url;

pub use channel::WebSocketTransport;
pub use client::{CancellationSignal, WriterApiClient};
pub use config::WriterApiConfig;
pub use error::WriterApiError;
pub use crate::url::{channel_url, endpoint_url, normalize_api_base};
