//! Contract trait implementations over [`WriterApiClient`].

use async_trait::async_trait;
use session_contract::{
    BackendError, ChannelFrame, ContinueRequest, ContinueResponse, Draft, DraftStore,
    FeedbackOutcome, FeedbackRequest, SaveDraftRequest, SessionBackend, SessionScope,
    StartSessionRequest,
};

use crate::client::WriterApiClient;

#[async_trait]
impl SessionBackend for WriterApiClient {
    async fn start_session(
        &self,
        scope: &SessionScope,
        request: StartSessionRequest,
    ) -> Result<(), BackendError> {
        WriterApiClient::start_session(self, scope, request, None)
            .await
            .map(|_| ())
            .map_err(BackendError::from)
    }

    async fn continue_or_insert(
        &self,
        scope: &SessionScope,
        request: ContinueRequest,
    ) -> Result<ContinueResponse, BackendError> {
        WriterApiClient::continue_or_insert(self, scope, request, None)
            .await
            .map_err(BackendError::from)
    }

    async fn submit_feedback(
        &self,
        scope: &SessionScope,
        request: FeedbackRequest,
    ) -> Result<FeedbackOutcome, BackendError> {
        WriterApiClient::submit_feedback(self, scope, request, None)
            .await
            .map_err(BackendError::from)
    }

    async fn cancel_session(&self, scope: &SessionScope) -> Result<(), BackendError> {
        WriterApiClient::cancel_session(self, scope, None)
            .await
            .map_err(BackendError::from)
    }

    async fn fetch_status(&self, scope: &SessionScope) -> Result<ChannelFrame, BackendError> {
        WriterApiClient::fetch_status(self, scope, None)
            .await
            .map_err(BackendError::from)
    }
}

#[async_trait]
impl DraftStore for WriterApiClient {
    async fn get_draft(&self, scope: &SessionScope) -> Result<Draft, BackendError> {
        WriterApiClient::get_draft(self, scope, None)
            .await
            .map_err(BackendError::from)
    }

    async fn save_draft(
        &self,
        scope: &SessionScope,
        request: SaveDraftRequest,
    ) -> Result<Draft, BackendError> {
        WriterApiClient::save_draft(self, scope, request, None)
            .await
            .map_err(BackendError::from)
    }
}
