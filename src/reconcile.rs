//! Generation-tagged arbitration between request responses and channel-triggered reloads.
//!
//! Every client-issued operation gets a fresh [`Generation`]. Results carry the
//! generation that was active when their request went out; anything older than the
//! active operation is dropped. Per operation the reconciler remembers whether the
//! direct response landed and whether a reload from the store was asked for, so each
//! operation mutates the buffer from the store at most once and a response always
//! wins over a reload.
//!
//! With no operation active (a fresh mount, or after a reset) reloads are passive:
//! they never highlight and never overwrite a buffer with unsaved edits.

use std::fmt;

use session_contract::AiContentRange;

use crate::range::full_buffer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Start,
    Continue,
    Insert,
    Revise,
    Confirm,
    Cancel,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Continue => "continue",
            Self::Insert => "insert",
            Self::Revise => "revise",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
        }
    }

    /// Highlight applied when a reload lands for this kind, or `None` when the kind never reloads.
    fn reload_range(self) -> Option<ReloadRange> {
        match self {
            Self::Start | Self::Continue | Self::Insert => Some(ReloadRange::FullBuffer),
            Self::Revise | Self::Confirm => Some(ReloadRange::Clear),
            Self::Cancel => None,
        }
    }
}

/// Highlight to apply once a reloaded draft is in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadRange {
    FullBuffer,
    Clear,
}

impl ReloadRange {
    pub fn resolve(self, content_len: usize) -> Option<AiContentRange> {
        match self {
            Self::FullBuffer => full_buffer(content_len),
            Self::Clear => None,
        }
    }
}

/// A reload the caller should fetch from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    pub generation: Generation,
    pub range: ReloadRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReloadState {
    NotRequested,
    Pending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveOperation {
    generation: Generation,
    kind: OperationKind,
    response_applied: bool,
    reload: ReloadState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    current: Generation,
    active: Option<ActiveOperation>,
    /// Generation of the last mutation applied to the buffer.
    buffer_generation: Generation,
    /// Passive reload in flight.
    passive_reload_pending: bool,
}

impl Reconciler {
    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn active_kind(&self) -> Option<OperationKind> {
        self.active.map(|active| active.kind)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.current
    }

    /// Starts a new operation, superseding whatever was active.
    pub fn issue(&mut self, kind: OperationKind) -> Generation {
        let generation = self.advance();
        self.active = Some(ActiveOperation {
            generation,
            kind,
            response_applied: false,
            reload: ReloadState::NotRequested,
        });
        self.passive_reload_pending = false;
        generation
    }

    /// Supersedes everything in flight without starting a new operation.
    pub fn reset(&mut self) -> Generation {
        let generation = self.advance();
        self.active = None;
        self.passive_reload_pending = false;
        generation
    }

    /// Supersedes everything in flight and asks for the stored draft, e.g. when a
    /// session is mounted. The load lands without a highlight.
    pub fn open(&mut self) -> ReloadTicket {
        let generation = self.reset();
        self.passive_reload_pending = true;
        ReloadTicket {
            generation,
            range: ReloadRange::Clear,
        }
    }

    /// Whether the active operation's content is already in the buffer.
    pub fn is_settled(&self) -> bool {
        self.active.is_some_and(|active| active.response_applied)
    }

    /// Admits a direct response. On `true` the caller must apply it; the operation is then settled.
    pub fn admit_response(&mut self, generation: Generation) -> bool {
        if !self.admits(generation) {
            return false;
        }
        let Some(active) = self.active.as_mut().filter(|a| a.generation == generation) else {
            return false;
        };
        active.response_applied = true;
        self.buffer_generation = generation;
        true
    }

    /// Asks for a reload after a content-publishing frame.
    ///
    /// Returns `None` when the content is already settled, a reload was already
    /// requested for this generation, or the active kind never reloads. With no
    /// operation active it also returns `None` while `buffer_dirty`.
    pub fn request_reload(&mut self, buffer_dirty: bool) -> Option<ReloadTicket> {
        let generation = self.current;
        match self.active.as_mut() {
            Some(active) => {
                let range = active.kind.reload_range()?;
                if active.response_applied || active.reload != ReloadState::NotRequested {
                    return None;
                }
                active.reload = ReloadState::Pending;
                Some(ReloadTicket { generation, range })
            }
            None => {
                if self.passive_reload_pending || buffer_dirty {
                    return None;
                }
                self.passive_reload_pending = true;
                Some(ReloadTicket {
                    generation,
                    range: ReloadRange::Clear,
                })
            }
        }
    }

    /// Admits a reload result. On `Some` the caller must load the draft with that highlight.
    ///
    /// A passive reload is dropped if the buffer picked up edits while it was in flight.
    pub fn admit_reload(
        &mut self,
        generation: Generation,
        buffer_dirty: bool,
    ) -> Option<ReloadRange> {
        if !self.admits(generation) {
            return None;
        }
        match self.active.as_mut() {
            Some(active) => {
                if active.response_applied || active.reload != ReloadState::Pending {
                    return None;
                }
                active.reload = ReloadState::Done;
                self.buffer_generation = generation;
                active.kind.reload_range()
            }
            None => {
                if !self.passive_reload_pending {
                    return None;
                }
                self.passive_reload_pending = false;
                if buffer_dirty {
                    return None;
                }
                self.buffer_generation = generation;
                Some(ReloadRange::Clear)
            }
        }
    }

    /// Re-arms the reload after a failed fetch so the next frame may try again.
    pub fn reload_failed(&mut self, generation: Generation) {
        if !self.is_current(generation) {
            return;
        }
        match self.active.as_mut() {
            Some(active) if active.reload == ReloadState::Pending => {
                active.reload = ReloadState::NotRequested;
            }
            Some(_) => {}
            None => self.passive_reload_pending = false,
        }
    }

    fn admits(&self, generation: Generation) -> bool {
        self.is_current(generation) && generation >= self.buffer_generation
    }

    fn advance(&mut self) -> Generation {
        self.current = Generation(self.current.0 + 1);
        self.current
    }
}
