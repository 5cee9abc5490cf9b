//! Write modes and the requests they build.

use session_contract::{ContinueRequest, StartSessionRequest};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WriteMode {
    #[default]
    New,
    Continue,
    Insert,
}

/// Brief for a brand-new chapter. The chapter id comes from the session scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBrief {
    pub title: String,
    pub goal: String,
    pub participant_ids: Vec<String>,
    pub target_word_count: u32,
}

/// Tracks the selected mode and the insert marker captured for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeController {
    mode: WriteMode,
    insert_position: Option<usize>,
}

impl ModeController {
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn insert_position(&self) -> Option<usize> {
        self.insert_position
    }

    /// Switches mode. Entering insert mode captures `cursor`; leaving it drops the marker.
    pub fn set_mode(&mut self, mode: WriteMode, cursor: usize) {
        self.mode = mode;
        self.insert_position = match mode {
            WriteMode::Insert => Some(cursor),
            WriteMode::New | WriteMode::Continue => None,
        };
    }

    /// Re-captures the marker at `cursor` while in insert mode.
    pub fn refresh_insert_position(&mut self, cursor: usize) -> bool {
        if self.mode != WriteMode::Insert {
            return false;
        }
        self.insert_position = Some(cursor);
        true
    }

    /// Drops the marker after it has been used for one request.
    pub fn retire_insert_position(&mut self) {
        self.insert_position = None;
    }

    pub fn build_start(
        &self,
        chapter_id: &str,
        brief: ChapterBrief,
    ) -> Result<StartSessionRequest, SessionError> {
        if chapter_id.trim().is_empty() {
            return Err(SessionError::MissingChapterId);
        }
        validate_target(brief.target_word_count)?;

        Ok(StartSessionRequest {
            chapter_id: chapter_id.to_owned(),
            title: brief.title.trim().to_owned(),
            goal: brief.goal.trim().to_owned(),
            participant_ids: brief.participant_ids,
            target_word_count: brief.target_word_count,
        })
    }

    pub fn build_continue(
        &self,
        chapter_id: &str,
        existing_content: &str,
        instruction: &str,
        target_word_count: u32,
    ) -> Result<ContinueRequest, SessionError> {
        validate_generation(existing_content, instruction, target_word_count)?;

        Ok(ContinueRequest {
            chapter_id: chapter_id.to_owned(),
            existing_content: existing_content.to_owned(),
            instruction: instruction.trim().to_owned(),
            target_word_count,
            insert_position: None,
        })
    }

    /// Builds an insert request at the captured marker. `content_len` is in characters.
    pub fn build_insert(
        &self,
        chapter_id: &str,
        existing_content: &str,
        content_len: usize,
        instruction: &str,
        target_word_count: u32,
    ) -> Result<ContinueRequest, SessionError> {
        validate_generation(existing_content, instruction, target_word_count)?;
        let position = self
            .insert_position
            .ok_or(SessionError::MissingInsertPosition)?;
        if position > content_len {
            return Err(SessionError::InsertPositionOutOfRange {
                position,
                len: content_len,
            });
        }

        Ok(ContinueRequest {
            chapter_id: chapter_id.to_owned(),
            existing_content: existing_content.to_owned(),
            instruction: instruction.trim().to_owned(),
            target_word_count,
            insert_position: Some(position),
        })
    }
}

fn validate_generation(
    existing_content: &str,
    instruction: &str,
    target_word_count: u32,
) -> Result<(), SessionError> {
    if instruction.trim().is_empty() {
        return Err(SessionError::EmptyInstruction);
    }
    if existing_content.trim().is_empty() {
        return Err(SessionError::EmptyContent);
    }
    validate_target(target_word_count)
}

fn validate_target(target_word_count: u32) -> Result<(), SessionError> {
    if target_word_count == 0 {
        Err(SessionError::InvalidTargetWordCount)
    } else {
        Ok(())
    }
}
