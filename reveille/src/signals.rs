//! Snooze/stop requests and the status display, all as plain files.
//!
//! The button handler touches a marker file when a button is pressed; the
//! engine consumes (removes) it. Removal walks an ordered list of
//! strategies and only logs if every one fails. A marker that survives
//! all of them is still honoured, but only once: [`MarkerConsumer`]
//! remembers its modification time and ignores it until it is touched
//! again.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Paths;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::types::first_success;

/// Display token while the alarm is ringing.
pub const DISPLAY_WAKE: &str = "WAKE!";

/// Display token for a transient failure elsewhere in the system.
pub const DISPLAY_ERROR: &str = "ERR";

/// Ways to get rid of a consumed marker, in the order they are tried.
pub(crate) const REMOVAL_STRATEGIES: [Removal; 2] = [Removal::Unlink, Removal::RenameAside];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Unlink,
    /// Markers created by root may be undeletable but still renamable in a
    /// group-writable directory. The renamed file no longer matches.
    RenameAside,
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Removal::Unlink => write!(f, "unlink"),
            Removal::RenameAside => write!(f, "rename"),
        }
    }
}

impl Removal {
    fn apply(self, path: &Path) -> Result<()> {
        match self {
            Removal::Unlink => match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io(path, e)),
                _ => Ok(()),
            },
            Removal::RenameAside => {
                let stamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();
                let mut aside = path.as_os_str().to_owned();
                aside.push(format!("_{stamp}"));
                fs::rename(path, &aside).map_err(|e| Error::io(path, e))
            }
        }
    }
}

/// Takes marker files with at-most-once semantics per marker instance.
#[derive(Debug, Clone)]
pub(crate) struct MarkerConsumer {
    strategies: &'static [Removal],
    /// Markers that could not be removed, with the mtime they had when
    /// they were honoured.
    stuck: Arc<Mutex<HashMap<PathBuf, Option<SystemTime>>>>,
}

impl Default for MarkerConsumer {
    fn default() -> Self {
        Self::with_strategies(&REMOVAL_STRATEGIES)
    }
}

impl MarkerConsumer {
    pub(crate) fn with_strategies(strategies: &'static [Removal]) -> Self {
        Self {
            strategies,
            stuck: Arc::default(),
        }
    }

    /// True if `path` holds a marker that has not been honoured yet. The
    /// marker is removed, or remembered if it cannot be.
    pub(crate) fn take(&self, path: &Path) -> bool {
        let mut stuck = self.stuck.lock().unwrap_or_else(PoisonError::into_inner);

        let Ok(meta) = fs::symlink_metadata(path) else {
            stuck.remove(path);
            return false;
        };
        let modified = meta.modified().ok();
        if stuck.get(path) == Some(&modified) {
            return false;
        }

        match first_success(self.strategies, |strategy| strategy.apply(path)) {
            Ok(()) => {
                stuck.remove(path);
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not remove signal file, honouring it once"
                );
                stuck.insert(path.to_path_buf(), modified);
            }
        }
        true
    }
}

/// Which request a marker carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Snooze,
    Stop,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Snooze => write!(f, "snooze"),
            Request::Stop => write!(f, "stop"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalStore {
    markers: MarkerConsumer,
    signals_dir: PathBuf,
    snooze_markers: [PathBuf; 2],
    stop_markers: [PathBuf; 2],
    displays: [PathBuf; 2],
}

impl SignalStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            markers: MarkerConsumer::default(),
            signals_dir: paths.signals_dir.clone(),
            snooze_markers: paths.snooze_markers(),
            stop_markers: paths.stop_markers(),
            displays: [paths.display(), paths.legacy_display()],
        }
    }

    /// Create the signals directory so the button handler has somewhere
    /// to write.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.signals_dir).map_err(|e| Error::io(&self.signals_dir, e))
    }

    /// True if a snooze was requested since the last call. The marker is
    /// consumed.
    pub fn consume_snooze_request(&self) -> bool {
        self.consume(&self.snooze_markers, Request::Snooze)
    }

    /// True if a stop was requested since the last call. The marker is
    /// consumed.
    pub fn consume_stop_request(&self) -> bool {
        self.consume(&self.stop_markers, Request::Stop)
    }

    /// Best-effort update of the status display. Empty text clears it.
    pub fn write_display(&self, text: &str) {
        let display_path = &self.displays[0];
        if let Err(e) = fs::write(display_path, text) {
            debug!(path = %display_path.display(), error = %e, "Display update failed");
        }
    }

    /// Current display token, if the display file is readable.
    pub fn read_display(&self) -> Option<String> {
        fs::read_to_string(&self.displays[0])
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Drop pending snooze/stop requests without acting on them.
    pub fn discard_requests(&self) {
        for path in self.snooze_markers.iter().chain(&self.stop_markers) {
            if self.markers.take(path) {
                debug!(path = %path.display(), "Discarded pending request");
            }
        }
    }

    /// Remove every marker and display file. Idempotent.
    pub fn clear_all_markers(&self) {
        self.discard_requests();
        for display_path in &self.displays {
            match fs::remove_file(display_path) {
                Ok(()) => debug!(path = %display_path.display(), "Cleared display"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %display_path.display(), error = %e, "Could not clear display"),
            }
        }
    }

    fn consume(&self, markers: &[PathBuf], request: Request) -> bool {
        let mut found = false;
        for marker in markers {
            if self.markers.take(marker) {
                info!(%request, path = %marker.display(), "Button request received");
                found = true;
            }
        }
        found
    }

    #[cfg(test)]
    pub(crate) fn with_removal_strategies(mut self, strategies: &'static [Removal]) -> Self {
        self.markers = MarkerConsumer::with_strategies(strategies);
        self
    }
}
