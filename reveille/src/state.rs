//! Durable "already rang today" record.
//!
//! The daily guard is the only thing standing between a flaky schedule
//! provider and an alarm that rings twice in one morning, so it has to
//! survive crashes and restarts. It is also the one piece of state an
//! operator may need to override, hence the reset marker.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::signals::MarkerConsumer;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    /// When the alarm last started ringing.
    pub last_trigger_instant: Option<NaiveDateTime>,

    /// Day on which the guard was forced without ringing (missed window).
    #[serde(default)]
    pub guarded_on: Option<NaiveDate>,

    /// Cached daily guard for the day of the last [`refresh`](Self::refresh).
    #[serde(skip)]
    pub triggered_today: bool,
}

impl TriggerState {
    /// True iff the alarm rang, or was written off as missed, on `now`'s
    /// calendar day.
    pub fn is_triggered_today(&self, now: NaiveDateTime) -> bool {
        let today = now.date();
        self.last_trigger_instant.is_some_and(|t| t.date() == today)
            || self.guarded_on == Some(today)
    }

    /// Recompute the cached guard for `now`. Returns true when this clears
    /// a guard left over from an earlier day.
    pub fn refresh(&mut self, now: NaiveDateTime) -> bool {
        let was = self.triggered_today;
        self.triggered_today = self.is_triggered_today(now);
        was && !self.triggered_today
    }

    pub fn record_trigger(&mut self, now: NaiveDateTime) {
        self.last_trigger_instant = Some(now);
        self.triggered_today = true;
    }

    pub fn mark_missed(&mut self, now: NaiveDateTime) {
        self.guarded_on = Some(now.date());
        self.triggered_today = true;
    }

    /// Forget everything: nothing has rung.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// JSON file holding the [`TriggerState`], plus the reset marker that
/// overrides it.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    reset_marker: PathBuf,
    markers: MarkerConsumer,
}

impl StateStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            path: paths.trigger_state(),
            reset_marker: paths.reset_marker(),
            markers: MarkerConsumer::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record as of `now`.
    ///
    /// A pending reset marker wins over whatever is stored (and is
    /// consumed). A missing or unreadable record degrades to "nothing
    /// rang yet" rather than keeping the daemon from starting.
    pub fn load(&self, now: NaiveDateTime) -> TriggerState {
        if self.take_reset_request() {
            let state = TriggerState::default();
            self.save(&state);
            return state;
        }

        let mut state = match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = %self.path.display(), "No trigger state yet");
                TriggerState::default()
            }
            Err(e) => {
                warn!(error = %e, "Could not load trigger state, starting fresh");
                TriggerState::default()
            }
        };

        state.refresh(now);
        if let Some(last) = state.last_trigger_instant.filter(|_| state.triggered_today) {
            info!(at = %last.format("%H:%M"), "Alarm already rang today");
        }
        state
    }

    /// Stored record as of `now`, without consuming the reset marker.
    pub fn peek(&self, now: NaiveDateTime) -> Result<TriggerState> {
        let mut state = self.read()?.unwrap_or_default();
        state.refresh(now);
        Ok(state)
    }

    /// True if a reset is waiting to be picked up.
    pub fn reset_pending(&self) -> bool {
        self.reset_marker.exists()
    }

    /// Persist `state`. Failure costs only crash recovery, so it is logged
    /// and otherwise ignored.
    pub fn save(&self, state: &TriggerState) {
        if let Err(e) = self.try_save(state) {
            warn!(error = %e, "Could not save trigger state");
        }
    }

    /// Write to a temporary sibling, then rename over the record, so a
    /// crash mid-write leaves either the old or the new record.
    pub fn try_save(&self, state: &TriggerState) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Other(format!("{} has no parent", self.path.display())))?;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = dir.join(format!(".{name}.tmp.{}", std::process::id()));
        let data = serde_json::to_vec_pretty(state)?;

        {
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| Error::io(&tmp_path, e))?;
            f.write_all(&data).map_err(|e| Error::io(&tmp_path, e))?;
            f.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            Error::io(&self.path, e)
        })
    }

    /// Consume the reset marker. True if one is present and has not been
    /// honoured yet; a marker that cannot be removed counts only once.
    pub fn take_reset_request(&self) -> bool {
        if !self.markers.take(&self.reset_marker) {
            return false;
        }
        info!(path = %self.reset_marker.display(), "Reset marker found, clearing alarm state");
        true
    }

    #[cfg(test)]
    pub(crate) fn with_removal_strategies(
        mut self,
        strategies: &'static [crate::signals::Removal],
    ) -> Self {
        self.markers = MarkerConsumer::with_strategies(strategies);
        self
    }

    fn read(&self) -> Result<Option<TriggerState>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    use super::*;
    use crate::signals::Removal;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn store() -> (TempDir, Paths, StateStore) {
        let dir = TempDir::new().unwrap();
        let paths = Paths::isolated(dir.path());
        let store = StateStore::new(&paths);
        (dir, paths, store)
    }

    #[test]
    fn triggered_today_is_same_calendar_day() {
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0));

        assert!(state.is_triggered_today(at(14, 23, 59)));
        assert!(!state.is_triggered_today(at(15, 0, 0)));
        assert!(!state.is_triggered_today(at(13, 7, 0)));
    }

    #[test]
    fn refresh_clears_guard_after_midnight() {
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0));

        assert!(!state.refresh(at(14, 22, 0)));
        assert!(state.triggered_today);

        // First look after midnight, not necessarily at 00:00.
        assert!(state.refresh(at(15, 3, 17)));
        assert!(!state.triggered_today);
        assert!(!state.refresh(at(15, 3, 22)));
    }

    #[test]
    fn missed_window_guards_only_that_day() {
        let mut state = TriggerState::default();
        state.mark_missed(at(14, 7, 5));

        assert!(state.triggered_today);
        assert!(state.is_triggered_today(at(14, 8, 0)));
        assert!(!state.is_triggered_today(at(15, 7, 0)));
        assert_eq!(state.last_trigger_instant, None);
    }

    #[test]
    fn save_then_load_survives_restart() {
        let (_dir, _paths, store) = store();
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0) + Duration::seconds(20));
        store.try_save(&state).unwrap();

        let loaded = store.load(at(14, 9, 0));
        assert_eq!(loaded.last_trigger_instant, state.last_trigger_instant);
        assert!(loaded.triggered_today);

        let tomorrow = store.load(at(15, 6, 0));
        assert!(!tomorrow.triggered_today);
    }

    #[test]
    fn missed_guard_survives_restart() {
        let (_dir, _paths, store) = store();
        let mut state = TriggerState::default();
        state.mark_missed(at(14, 7, 5));
        store.try_save(&state).unwrap();

        assert!(store.load(at(14, 7, 10)).triggered_today);
    }

    #[test]
    fn missing_record_is_default() {
        let (_dir, _paths, store) = store();
        assert_eq!(store.load(at(14, 7, 0)), TriggerState::default());
    }

    #[test]
    fn corrupt_record_is_default() {
        let (_dir, _paths, store) = store();
        fs::write(store.path(), "{\"last_trigger_instant\": 12").unwrap();
        assert_eq!(store.load(at(14, 7, 0)), TriggerState::default());
    }

    #[test]
    fn legacy_record_without_guard_day_loads() {
        let (_dir, _paths, store) = store();
        fs::write(store.path(), r#"{"last_trigger_instant": "2026-03-14T07:00:20"}"#).unwrap();
        assert!(store.load(at(14, 8, 0)).triggered_today);
    }

    #[test]
    fn reset_marker_discards_record_and_is_consumed() {
        let (_dir, paths, store) = store();
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0));
        store.try_save(&state).unwrap();
        fs::write(paths.reset_marker(), "").unwrap();

        let loaded = store.load(at(14, 8, 0));
        assert_eq!(loaded, TriggerState::default());
        assert!(!paths.reset_marker().exists());
        assert!(!store.take_reset_request());
    }

    #[test]
    fn peek_leaves_reset_marker_alone() {
        let (_dir, paths, store) = store();
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0));
        store.try_save(&state).unwrap();
        fs::write(paths.reset_marker(), "").unwrap();

        assert!(store.peek(at(14, 8, 0)).unwrap().triggered_today);
        assert!(!store.peek(at(15, 8, 0)).unwrap().triggered_today);
        assert!(store.reset_pending());
    }

    #[test]
    fn undeletable_reset_marker_clears_state_once() {
        let (_dir, paths, store) = store();
        let store = store.with_removal_strategies(&[Removal::Unlink]);
        let mut state = TriggerState::default();
        state.record_trigger(at(14, 7, 0));
        store.try_save(&state).unwrap();
        fs::create_dir(paths.reset_marker()).unwrap();

        assert_eq!(store.load(at(14, 7, 1)), TriggerState::default());
        assert!(paths.reset_marker().exists());
        assert!(!store.take_reset_request());

        let mut state = store.load(at(14, 7, 2));
        assert!(!state.triggered_today);
        state.record_trigger(at(14, 7, 3));
        store.save(&state);
        assert!(store.load(at(14, 7, 4)).triggered_today);
    }

    #[test]
    fn save_failure_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let store = StateStore::new(&Paths::isolated(&blocker));

        assert!(store.try_save(&TriggerState::default()).is_err());
        store.save(&TriggerState::default());
    }

    #[test]
    fn save_leaves_no_temporary_files() {
        let (dir, _paths, store) = store();
        store.try_save(&TriggerState::default()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, [std::ffi::OsString::from("trigger_state.json")]);
    }
}
