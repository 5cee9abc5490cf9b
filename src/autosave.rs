//! Save bookkeeping for the draft buffer: in-flight snapshots and the saved indicator.

use std::collections::BTreeMap;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub type SaveId = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AutosaveStatus {
    #[default]
    Idle,
    Saving,
    /// RFC 3339 timestamp of the acknowledged save.
    Saved { at: String },
    Failed { message: String },
}

/// What kicked off a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Interval,
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveState {
    status: AutosaveStatus,
    next_save_id: SaveId,
    in_flight: BTreeMap<SaveId, String>,
    last_acknowledged: Option<SaveId>,
    /// Save whose success is currently shown; only its reset timer may clear it.
    shown_save: Option<SaveId>,
}

impl AutosaveState {
    pub fn status(&self) -> &AutosaveStatus {
        &self.status
    }

    /// Save whose success the indicator currently shows.
    pub fn shown_save(&self) -> Option<SaveId> {
        self.shown_save
    }

    pub fn is_saving(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Whether a tick of `trigger` should save right now.
    pub fn should_save(&self, trigger: SaveTrigger, dirty: bool) -> bool {
        match trigger {
            SaveTrigger::Manual => true,
            SaveTrigger::Interval => dirty && !self.is_saving(),
        }
    }

    /// Registers a save of `snapshot` and returns its id.
    pub fn begin(&mut self, snapshot: String) -> SaveId {
        self.next_save_id += 1;
        let save_id = self.next_save_id;
        self.in_flight.insert(save_id, snapshot);
        self.status = AutosaveStatus::Saving;
        self.shown_save = None;
        save_id
    }

    /// Marks `save_id` acknowledged and returns the snapshot that was sent.
    ///
    /// Returns `None` for unknown saves and for acknowledgements older than one
    /// already applied, so a slow early save never rolls the baseline back.
    pub fn succeed(&mut self, save_id: SaveId) -> Option<String> {
        let snapshot = self.in_flight.remove(&save_id)?;
        let superseded = self.last_acknowledged.is_some_and(|last| last > save_id);
        if !superseded {
            self.last_acknowledged = Some(save_id);
        }
        if self.in_flight.is_empty() {
            self.status = AutosaveStatus::Saved { at: now_rfc3339() };
            self.shown_save = self.last_acknowledged;
        }

        if superseded {
            None
        } else {
            Some(snapshot)
        }
    }

    pub fn fail(&mut self, save_id: SaveId, message: impl Into<String>) {
        if self.in_flight.remove(&save_id).is_none() {
            return;
        }
        self.status = AutosaveStatus::Failed {
            message: message.into(),
        };
        self.shown_save = None;
    }

    /// Clears the saved indicator if it still shows `save_id`.
    pub fn reset_indicator(&mut self, save_id: SaveId) -> bool {
        if self.shown_save != Some(save_id) {
            return false;
        }
        if matches!(self.status, AutosaveStatus::Saved { .. }) {
            self.status = AutosaveStatus::Idle;
        }
        self.shown_save = None;
        true
    }

    /// Forgets in-flight saves, e.g. when the controller stops.
    pub fn abandon_in_flight(&mut self) {
        self.in_flight.clear();
        if self.status == AutosaveStatus::Saving {
            self.status = AutosaveStatus::Idle;
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn interval_saves_only_when_dirty_and_idle() {
        let mut state = AutosaveState::default();
        assert!(!state.should_save(SaveTrigger::Interval, false));
        assert!(state.should_save(SaveTrigger::Interval, true));

        state.begin("x".to_owned());
        assert!(!state.should_save(SaveTrigger::Interval, true));
        assert!(state.should_save(SaveTrigger::Manual, false));
    }

    #[test]
    fn indicator_cycles_saving_saved_idle() {
        let mut state = AutosaveState::default();
        let save_id = state.begin("text".to_owned());
        assert_eq!(state.status(), &AutosaveStatus::Saving);

        assert_eq!(state.succeed(save_id).as_deref(), Some("text"));
        assert!(matches!(state.status(), AutosaveStatus::Saved { .. }));

        assert!(state.reset_indicator(save_id));
        assert_eq!(state.status(), &AutosaveStatus::Idle);
    }

    #[test]
    fn saved_timestamp_is_rfc3339() {
        let mut state = AutosaveState::default();
        let save_id = state.begin("text".to_owned());
        state.succeed(save_id);
        let AutosaveStatus::Saved { at } = state.status().clone() else {
            panic!("expected saved status");
        };
        assert!(OffsetDateTime::parse(&at, &Rfc3339).is_ok());
    }

    #[test]
    fn stale_reset_timer_does_not_clear_newer_save() {
        let mut state = AutosaveState::default();
        let first = state.begin("a".to_owned());
        state.succeed(first);
        let second = state.begin("ab".to_owned());

        assert!(!state.reset_indicator(first));
        assert_eq!(state.status(), &AutosaveStatus::Saving);

        state.succeed(second);
        assert!(state.reset_indicator(second));
    }

    #[test]
    fn out_of_order_acknowledgement_is_ignored() {
        let mut state = AutosaveState::default();
        let first = state.begin("a".to_owned());
        let second = state.begin("ab".to_owned());

        assert_eq!(state.succeed(second).as_deref(), Some("ab"));
        assert_eq!(state.status(), &AutosaveStatus::Saving);
        assert_eq!(state.succeed(first), None);
        assert!(matches!(state.status(), AutosaveStatus::Saved { .. }));
        assert!(state.reset_indicator(second));
    }

    #[test]
    fn failure_keeps_message_and_allows_retry() {
        let mut state = AutosaveState::default();
        let save_id = state.begin("a".to_owned());
        state.fail(save_id, "HTTP 503: overloaded");

        assert_eq!(
            state.status(),
            &AutosaveStatus::Failed {
                message: "HTTP 503: overloaded".to_owned()
            }
        );
        assert!(state.should_save(SaveTrigger::Interval, true));
    }
}
