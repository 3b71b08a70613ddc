//! Daemon configuration.
//!
//! Defaults match the bedroom install: files under `/home/pi/monty-alarm`,
//! a 5 s schedule poll and a gentle 10 s ramp from 10% to 35%. Every knob
//! can be overridden with a `REVEILLE_*` environment variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{DismissPolicy, RampConfig, TriggerWindow};
use crate::tracing::prelude::*;

const DEFAULT_HOME: &str = "/home/pi/monty-alarm";
const DEFAULT_STATUS_URL: &str = "http://192.168.0.15:3001";
const LEGACY_SIGNALS_DIR: &str = "/tmp";

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    /// Outer schedule poll. Coarse on purpose; the trigger window absorbs
    /// the jitter.
    pub poll_interval: Duration,

    /// Snooze/stop check cadence while the alarm is ringing or snoozed.
    pub button_interval: Duration,

    pub trigger_window: TriggerWindow,

    pub snooze: Duration,

    /// Ringing (including snoozes) is dismissed automatically after this
    /// long.
    pub max_duration: Duration,

    pub ramp: RampConfig,

    /// Output volume restored whenever playback stops, so the next start
    /// never blasts at the previous ramp peak.
    pub snooze_volume: u8,

    pub dismiss: DismissPolicy,

    pub paths: Paths,

    /// Status endpoints for the network fallback, tried in order.
    pub status_urls: Vec<String>,

    /// Per-request budget for the network fallback.
    pub fetch_timeout: Duration,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            button_interval: Duration::from_millis(200),
            trigger_window: TriggerWindow::default(),
            snooze: Duration::from_secs(9 * 60),
            max_duration: Duration::from_secs(60 * 60),
            ramp: RampConfig::default(),
            snooze_volume: 25,
            dismiss: DismissPolicy::default(),
            paths: Paths::under(DEFAULT_HOME),
            status_urls: vec![DEFAULT_STATUS_URL.to_string()],
            fetch_timeout: Duration::from_secs(3),
        }
    }
}

impl AlarmConfig {
    /// Defaults overridden by `REVEILLE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `REVEILLE_*` key. Values that fail to parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(home) = lookup("REVEILLE_HOME") {
            config.paths = Paths::under(home);
        }
        if let Some(urls) = lookup("REVEILLE_STATUS_URLS") {
            config.status_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| u.trim_end_matches('/').to_string())
                .collect();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REVEILLE_POLL_SECS") {
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(minutes) = parse_var::<u64>(&lookup, "REVEILLE_SNOOZE_MINUTES") {
            config.snooze = Duration::from_secs(minutes.saturating_mul(60));
        }
        if let Some(minutes) = parse_var::<u64>(&lookup, "REVEILLE_MAX_MINUTES") {
            config.max_duration = Duration::from_secs(minutes.saturating_mul(60));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REVEILLE_EARLY_SECS") {
            config.trigger_window.early = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REVEILLE_OVERSHOOT_SECS") {
            config.trigger_window.overshoot = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REVEILLE_RAMP_SECS") {
            config.ramp.duration = Duration::from_secs(secs);
        }
        if let Some(volume) = parse_var::<u8>(&lookup, "REVEILLE_MIN_VOLUME") {
            config.ramp.min_volume = volume.min(100);
        }
        if let Some(volume) = parse_var::<u8>(&lookup, "REVEILLE_MAX_VOLUME") {
            config.ramp.max_volume = volume.min(100);
        }
        if let Some(policy) = parse_var::<DismissPolicy>(&lookup, "REVEILLE_DISMISS") {
            config.dismiss = policy;
        }

        if config.ramp.min_volume > config.ramp.max_volume {
            warn!(
                min = config.ramp.min_volume,
                max = config.ramp.max_volume,
                "Ramp minimum above maximum; ramp will hold at the maximum"
            );
            config.ramp.min_volume = config.ramp.max_volume;
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

/// Well-known file locations shared with the button handler, the push
/// receiver and the display.
#[derive(Debug, Clone)]
pub struct Paths {
    pub home: PathBuf,
    pub signals_dir: PathBuf,
    /// Older button handlers dropped their markers in `/tmp`.
    pub legacy_signals_dir: PathBuf,
}

impl Paths {
    pub fn under(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            signals_dir: home.join("signals"),
            legacy_signals_dir: PathBuf::from(LEGACY_SIGNALS_DIR),
            home,
        }
    }

    /// Keep everything, legacy markers included, inside `home`. Used by
    /// tests and by the CLI when pointed at a scratch directory.
    pub fn isolated(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            signals_dir: home.join("signals"),
            legacy_signals_dir: home.join("legacy"),
            home,
        }
    }

    /// Schedule cache written by the push receiver.
    pub fn schedule_cache(&self) -> PathBuf {
        self.home.join("alarm_state.json")
    }

    pub fn trigger_state(&self) -> PathBuf {
        self.home.join("trigger_state.json")
    }

    pub fn reset_marker(&self) -> PathBuf {
        self.home.join("reset_alarm_state")
    }

    pub fn display(&self) -> PathBuf {
        self.signals_dir.join("alarm_display.txt")
    }

    pub fn legacy_display(&self) -> PathBuf {
        self.legacy_signals_dir.join("alarm_display.txt")
    }

    pub fn snooze_markers(&self) -> [PathBuf; 2] {
        self.markers("alarm_snooze")
    }

    pub fn stop_markers(&self) -> [PathBuf; 2] {
        self.markers("alarm_stop")
    }

    pub fn wakeup_config(&self) -> PathBuf {
        self.home.join("wakeup_config.json")
    }

    pub fn mp3_config(&self) -> PathBuf {
        self.home.join("mp3_config.json")
    }

    pub fn music_dir(&self) -> PathBuf {
        self.home.join("music")
    }

    fn markers(&self, name: &str) -> [PathBuf; 2] {
        [
            self.signals_dir.join(name),
            self.legacy_signals_dir.join(name),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AlarmConfig::from_lookup(|_| None);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.snooze, Duration::from_secs(540));
        assert_eq!(config.trigger_window.early, Duration::from_secs(10));
        assert_eq!(config.trigger_window.overshoot, Duration::from_secs(30));
        assert_eq!(config.ramp.min_volume, 10);
        assert_eq!(config.ramp.max_volume, 35);
        assert_eq!(config.dismiss, DismissPolicy::KeepGuard);
        assert_eq!(config.paths.home, PathBuf::from(DEFAULT_HOME));
    }

    #[test]
    fn overrides_from_environment() {
        let config = AlarmConfig::from_lookup(lookup(&[
            ("REVEILLE_HOME", "/srv/alarm"),
            ("REVEILLE_STATUS_URLS", "http://a:1/, http://b:2"),
            ("REVEILLE_SNOOZE_MINUTES", "5"),
            ("REVEILLE_OVERSHOOT_SECS", "45"),
            ("REVEILLE_DISMISS", "rearm"),
        ]));

        assert_eq!(config.paths.trigger_state(), PathBuf::from("/srv/alarm/trigger_state.json"));
        assert_eq!(config.status_urls, ["http://a:1", "http://b:2"]);
        assert_eq!(config.snooze, Duration::from_secs(300));
        assert_eq!(config.trigger_window.overshoot, Duration::from_secs(45));
        assert_eq!(config.dismiss, DismissPolicy::Rearm);
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let config = AlarmConfig::from_lookup(lookup(&[
            ("REVEILLE_POLL_SECS", "soon"),
            ("REVEILLE_DISMISS", "maybe"),
        ]));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.dismiss, DismissPolicy::KeepGuard);
    }

    #[test]
    fn huge_minute_values_saturate() {
        let config = AlarmConfig::from_lookup(lookup(&[
            ("REVEILLE_SNOOZE_MINUTES", "18446744073709551615"),
            ("REVEILLE_MAX_MINUTES", "18446744073709551615"),
        ]));
        assert_eq!(config.snooze, Duration::from_secs(u64::MAX));
        assert_eq!(config.max_duration, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn inverted_volume_range_is_collapsed() {
        let config = AlarmConfig::from_lookup(lookup(&[
            ("REVEILLE_MIN_VOLUME", "80"),
            ("REVEILLE_MAX_VOLUME", "40"),
        ]));
        assert_eq!(config.ramp.min_volume, 40);
        assert_eq!(config.ramp.max_volume, 40);
    }

    #[test]
    fn markers_cover_both_locations() {
        let paths = Paths::under("/home/pi/monty-alarm");
        assert_eq!(
            paths.stop_markers(),
            [
                PathBuf::from("/home/pi/monty-alarm/signals/alarm_stop"),
                PathBuf::from("/tmp/alarm_stop"),
            ]
        );
    }
}
