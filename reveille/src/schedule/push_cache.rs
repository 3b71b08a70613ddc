//! Schedule cache written by the push receiver.
//!
//! The main household system pushes every schedule change to the receiver,
//! which persists the latest one as JSON. Reading it is cheap and works
//! when the network is down, so it is always consulted first.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeZone};
use serde::Deserialize;

use super::normalize::{parse_instant, resolve_time_of_day};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushState {
    #[serde(default)]
    has_alarm: bool,
    next_alarm: Option<String>,
    wake_up_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PushCache {
    path: PathBuf,
}

impl PushCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wake instant from the cache, `None` if it says no alarm is set.
    pub async fn read(&self, now: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::io(&self.path, e))?;
        parse_push_state(&bytes, now, &Local)
    }
}

/// `nextAlarm` (an absolute timestamp) wins; a bare `wakeUpTime` is
/// resolved against `now` when that is all the push carried.
fn parse_push_state<Tz: TimeZone>(
    bytes: &[u8],
    now: NaiveDateTime,
    tz: &Tz,
) -> Result<Option<NaiveDateTime>> {
    let state: PushState = serde_json::from_slice(bytes)?;
    if !state.has_alarm {
        return Ok(None);
    }

    match (state.next_alarm.as_deref(), state.wake_up_time.as_deref()) {
        (Some(next), _) if !next.is_empty() => parse_instant(next, tz).map(Some),
        (_, Some(time)) if !time.is_empty() => resolve_time_of_day(time, now).map(Some),
        _ => Ok(None),
    }
}
