//! The single mutable copy of the chapter text.

use session_contract::{char_len, AiContentRange, Draft};

use crate::range::{track_edit, EditEvent};

/// Whether leaving the page would lose unsaved work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Allow,
    /// Content differs from the last persisted snapshot; ask the user first.
    Block,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftBuffer {
    content: String,
    char_len: usize,
    ai_range: Option<AiContentRange>,
    baseline: String,
    version: Option<u32>,
}

impl DraftBuffer {
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.char_len
    }

    pub fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    /// Current highlight, re-validated against the current length.
    pub fn ai_range(&self) -> Option<AiContentRange> {
        self.ai_range.and_then(|range| range.validated(self.char_len))
    }

    /// Store-assigned version of the last load or save.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Applies a direct user edit and moves the highlight with it.
    pub fn apply_user_edit(&mut self, new_content: String, position: usize) {
        let new_len = char_len(&new_content);
        let edit = EditEvent::new(position, self.char_len, new_len);
        self.ai_range = track_edit(self.ai_range(), edit);
        self.content = new_content;
        self.char_len = new_len;
    }

    /// Replaces the text programmatically with an explicit highlight.
    pub fn replace(&mut self, content: String, ai_range: Option<AiContentRange>) {
        self.char_len = char_len(&content);
        self.content = content;
        self.ai_range = ai_range.and_then(|range| range.validated(self.char_len));
    }

    /// Replaces the text with a stored draft; the draft also becomes the saved baseline.
    pub fn load(&mut self, draft: Draft, ai_range: Option<AiContentRange>) {
        self.baseline.clone_from(&draft.content);
        self.version = Some(draft.version);
        self.replace(draft.content, ai_range);
    }

    pub fn clear_ai_range(&mut self) {
        self.ai_range = None;
    }

    /// Records that `snapshot` reached the store as `version`.
    pub fn mark_persisted(&mut self, snapshot: String, version: u32) {
        self.baseline = snapshot;
        self.version = Some(version);
    }

    pub fn is_dirty(&self) -> bool {
        self.content != self.baseline
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.is_dirty()
    }

    pub fn confirm_unload(&self) -> UnloadDecision {
        if self.is_dirty() {
            UnloadDecision::Block
        } else {
            UnloadDecision::Allow
        }
    }
}
