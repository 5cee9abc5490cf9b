//! Keeps the AI-authored highlight attached to the right text while the user edits.
//!
//! Offsets are character offsets. Only direct user edits go through
//! [`track_edit`]; programmatic replacements set the range explicitly.

use session_contract::AiContentRange;

/// One direct user edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEvent {
    /// Cursor position where the edit happened, before it was applied.
    pub position: usize,
    /// Signed change in character length.
    pub length_delta: i64,
    /// Character length after the edit.
    pub new_length: usize,
}

impl EditEvent {
    #[must_use]
    pub fn new(position: usize, old_length: usize, new_length: usize) -> Self {
        Self {
            position,
            length_delta: to_signed(new_length) - to_signed(old_length),
            new_length,
        }
    }
}

/// Moves `range` across one user edit.
///
/// An edit at or before `start` shifts the whole range, one inside it (up to and
/// including `end`) stretches or shrinks `end`, one after it changes nothing. The
/// result is always `None` or satisfies `start < end <= new_length`.
#[must_use]
pub fn track_edit(range: Option<AiContentRange>, edit: EditEvent) -> Option<AiContentRange> {
    let range = range?;
    let cursor = to_signed(edit.position);
    let mut start = to_signed(range.start);
    let mut end = to_signed(range.end);

    if cursor <= start {
        start += edit.length_delta;
        end += edit.length_delta;
    } else if cursor <= end {
        end += edit.length_delta;
    }

    clamp(start, end, edit.new_length)
}

/// Highlight covering the whole buffer, or `None` when it is empty.
#[must_use]
pub fn full_buffer(len: usize) -> Option<AiContentRange> {
    AiContentRange::full(len)
}

fn clamp(start: i64, end: i64, new_length: usize) -> Option<AiContentRange> {
    let start = start.max(0);
    if end <= start {
        return None;
    }
    let end = end.min(to_signed(new_length));
    if end <= start {
        return None;
    }

    Some(AiContentRange::new(
        usize::try_from(start).ok()?,
        usize::try_from(end).ok()?,
    ))
}

fn to_signed(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
