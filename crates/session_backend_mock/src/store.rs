use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use session_contract::{
    word_count, BackendError, Draft, DraftStatus, DraftStore, SaveDraftRequest, SessionScope,
};
use tokio::sync::oneshot;

use crate::{gated, immediate, lock_unpoisoned, ResponseGate, Scripted};

type ChapterKey = (String, String);

#[derive(Debug)]
enum GetScript {
    Answer(Result<Draft, BackendError>),
    /// Waits, then reads whatever is stored at release time.
    Hold(oneshot::Receiver<()>),
}

fn key(scope: &SessionScope) -> ChapterKey {
    (scope.project_id.clone(), scope.chapter_id.clone())
}

#[derive(Debug, Default)]
struct StoreState {
    versions: HashMap<ChapterKey, Vec<Draft>>,
    saves: Vec<SaveDraftRequest>,
    get_count: usize,
    scripted_gets: VecDeque<GetScript>,
    scripted_saves: VecDeque<Scripted<()>>,
}

/// Versioned draft store kept in memory. Every save appends a new version.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    state: Mutex<StoreState>,
}

impl InMemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` as the next version for `scope` and returns it.
    pub fn seed(&self, scope: &SessionScope, content: &str) -> Draft {
        let mut state = lock_unpoisoned(&self.state);
        append_version(
            &mut state,
            scope,
            content.to_owned(),
            DraftStatus::Draft,
        )
    }

    #[must_use]
    pub fn latest(&self, scope: &SessionScope) -> Option<Draft> {
        lock_unpoisoned(&self.state)
            .versions
            .get(&key(scope))
            .and_then(|versions| versions.last().cloned())
    }

    #[must_use]
    pub fn saves(&self) -> Vec<SaveDraftRequest> {
        lock_unpoisoned(&self.state).saves.clone()
    }

    #[must_use]
    pub fn get_count(&self) -> usize {
        lock_unpoisoned(&self.state).get_count
    }

    /// Makes the next `get_draft` return `result` instead of the stored draft.
    pub fn push_get(&self, result: Result<Draft, BackendError>) {
        lock_unpoisoned(&self.state)
            .scripted_gets
            .push_back(GetScript::Answer(result));
    }

    /// Holds the next `get_draft` until the gate is released; it then reads the
    /// latest stored version at release time.
    #[must_use]
    pub fn hold_next_get(&self) -> ResponseGate {
        let (gate, rx) = ResponseGate::pair();
        lock_unpoisoned(&self.state)
            .scripted_gets
            .push_back(GetScript::Hold(rx));
        gate
    }

    /// Makes the next save fail with `error` without storing anything.
    pub fn fail_next_save(&self, error: BackendError) {
        lock_unpoisoned(&self.state)
            .scripted_saves
            .push_back(immediate(Err(error)));
    }

    /// Holds the next save until the gate is released.
    #[must_use]
    pub fn hold_next_save(&self) -> ResponseGate {
        let (scripted, gate) = gated(Ok(()));
        lock_unpoisoned(&self.state).scripted_saves.push_back(scripted);
        gate
    }
}

fn append_version(
    state: &mut StoreState,
    scope: &SessionScope,
    content: String,
    status: DraftStatus,
) -> Draft {
    let versions = state.versions.entry(key(scope)).or_default();
    let version = versions.last().map_or(1, |draft| draft.version + 1);
    let draft = Draft {
        chapter_id: scope.chapter_id.clone(),
        version,
        word_count: word_count(&content),
        content,
        status,
    };
    versions.push(draft.clone());
    draft
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn get_draft(&self, scope: &SessionScope) -> Result<Draft, BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.get_count += 1;
            state.scripted_gets.pop_front()
        };

        match scripted {
            Some(GetScript::Answer(result)) => return result,
            Some(GetScript::Hold(gate)) => {
                let _ = gate.await;
            }
            None => {}
        }

        self.latest(scope).ok_or_else(|| BackendError::Status {
            status: 404,
            message: "Draft not found".to_owned(),
        })
    }

    async fn save_draft(
        &self,
        scope: &SessionScope,
        request: SaveDraftRequest,
    ) -> Result<Draft, BackendError> {
        let scripted = {
            let mut state = lock_unpoisoned(&self.state);
            state.saves.push(request.clone());
            state.scripted_saves.pop_front()
        };
        if let Some(scripted) = scripted {
            scripted.resolve().await?;
        }

        let mut state = lock_unpoisoned(&self.state);
        Ok(append_version(
            &mut state,
            scope,
            request.content,
            request.status,
        ))
    }
}
