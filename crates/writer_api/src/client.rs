use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use session_contract::{
    ChannelFrame, ContinueRequest, ContinueResponse, Draft, FeedbackOutcome, FeedbackRequest,
    SaveDraftRequest, SessionScope, StartSessionRequest,
};

use crate::config::WriterApiConfig;
use crate::error::{parse_error_message, WriterApiError};
use crate::headers::build_headers;
use crate::payload::{
    AckBody, ContinueBody, ContinueResponseBody, DraftBody, FeedbackBody, SaveDraftBody,
    StartSessionBody,
};
use crate::retry::is_transient_status;
use crate::url::{endpoint_url, normalize_api_base};

/// Optional cancellation signal shared across request loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct WriterApiClient {
    http: Client,
    config: WriterApiConfig,
}

impl WriterApiClient {
    pub fn new(config: WriterApiConfig) -> Result<Self, WriterApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(WriterApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &WriterApiConfig {
        &self.config
    }

    pub fn api_base(&self) -> String {
        normalize_api_base(&self.config.base_url)
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, WriterApiError> {
        let headers = build_headers(&self.config, user_agent);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| WriterApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    WriterApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_post<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<RequestBuilder, WriterApiError> {
        let url = endpoint_url(&self.config.base_url, segments)?;
        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self.http.post(url).headers(headers).json(body))
    }

    pub fn build_get(&self, segments: &[&str]) -> Result<RequestBuilder, WriterApiError> {
        let url = endpoint_url(&self.config.base_url, segments)?;
        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self.http.get(url).headers(headers))
    }

    /// Sends a POST exactly once. Writes are never replayed.
    pub async fn post_once<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<T, WriterApiError> {
        if is_cancelled(cancellation) {
            return Err(WriterApiError::Cancelled);
        }

        let response = await_or_cancel(self.build_post(segments, body)?.send(), cancellation)
            .await?
            .map_err(WriterApiError::from)?;
        let status = response.status();
        let body = read_body(response, cancellation).await?;
        if !status.is_success() {
            return Err(WriterApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }
        decode_body(&body)
    }

    /// Sends an idempotent GET, retrying transient failures with backoff.
    pub async fn get_with_retry<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        cancellation: Option<&CancellationSignal>,
    ) -> Result<T, WriterApiError> {
        let endpoint = segments.join("/");
        let policy = self.config.retry;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=policy.max_retries {
            if is_cancelled(cancellation) {
                return Err(WriterApiError::Cancelled);
            }

            let response = await_or_cancel(self.build_get(segments)?.send(), cancellation)
                .await?
                .map_err(WriterApiError::from);

            match response {
                Ok(response) => {
                    let status = response.status();
                    let body = read_body(response, cancellation).await?;
                    if status.is_success() {
                        return decode_body(&body);
                    }

                    last_status = Some(status);
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if policy.allows(attempt) && is_transient_status(status.as_u16(), &body) {
                        tracing::debug!(attempt, status = status.as_u16(), %endpoint, "retrying GET");
                        await_or_cancel(tokio::time::sleep(policy.delay_for(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(WriterApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message.clone());
                    if policy.allows(attempt) {
                        tracing::debug!(attempt, error = %message, %endpoint, "retrying GET after transport error");
                        await_or_cancel(tokio::time::sleep(policy.delay_for(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(WriterApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(WriterApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    pub async fn start_session(
        &self,
        scope: &SessionScope,
        request: StartSessionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<FeedbackOutcome, WriterApiError> {
        let body = StartSessionBody::new(scope, request);
        let ack: AckBody = self.post_once(&["session", "start"], &body, cancellation).await?;
        ack.into_result()
    }

    pub async fn continue_or_insert(
        &self,
        scope: &SessionScope,
        request: ContinueRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ContinueResponse, WriterApiError> {
        let body = ContinueBody::new(scope, request);
        let response: ContinueResponseBody = self
            .post_once(&["session", "continue"], &body, cancellation)
            .await?;
        response.into_response()
    }

    pub async fn submit_feedback(
        &self,
        scope: &SessionScope,
        request: FeedbackRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<FeedbackOutcome, WriterApiError> {
        let body = FeedbackBody::from(request);
        let ack: AckBody = self
            .post_once(&["session", "feedback", scope.project_id.as_str()], &body, cancellation)
            .await?;
        ack.into_result()
    }

    pub async fn cancel_session(
        &self,
        scope: &SessionScope,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), WriterApiError> {
        let path = ["session", "cancel", scope.project_id.as_str()];
        let ack: AckBody = self
            .post_once(&path, &serde_json::json!({}), cancellation)
            .await?;
        ack.into_result().map(|_| ())
    }

    pub async fn fetch_status(
        &self,
        scope: &SessionScope,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChannelFrame, WriterApiError> {
        let path = ["session", "status", scope.project_id.as_str()];
        let value: serde_json::Value = self.get_with_retry(&path, cancellation).await?;
        ChannelFrame::from_value(value)
            .map_err(|error| WriterApiError::MalformedResponse(error.to_string()))
    }

    pub async fn get_draft(
        &self,
        scope: &SessionScope,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Draft, WriterApiError> {
        let body: DraftBody = self.get_with_retry(&draft_segments(scope), cancellation).await?;
        Ok(body.into_draft(&scope.chapter_id))
    }

    pub async fn save_draft(
        &self,
        scope: &SessionScope,
        request: SaveDraftRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Draft, WriterApiError> {
        let path = ["projects", scope.project_id.as_str(), "drafts"];
        let chapter = request.chapter_id.clone();
        let body = SaveDraftBody::from(request);
        let saved: DraftBody = self.post_once(&path, &body, cancellation).await?;
        Ok(saved.into_draft(&chapter))
    }
}

pub fn draft_segments(scope: &SessionScope) -> [&str; 4] {
    [
        "projects",
        scope.project_id.as_str(),
        "drafts",
        scope.chapter_id.as_str(),
    ]
}

async fn read_body(
    response: Response,
    cancellation: Option<&CancellationSignal>,
) -> Result<String, WriterApiError> {
    let status = response.status();
    let body = await_or_cancel(response.text(), cancellation)
        .await?
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Ok(body)
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, WriterApiError> {
    serde_json::from_str(body).map_err(WriterApiError::from)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, WriterApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(WriterApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(WriterApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
