//! What to play when the alarm rings.
//!
//! The mode is chosen in `wakeup_config.json` by the mode manager; an MP3
//! selection may additionally live in `mp3_config.json`. Anything missing,
//! unreadable or not implemented falls back to the internet radio stream,
//! because an alarm that plays the wrong thing beats one that plays
//! nothing.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Paths;
use crate::tracing::prelude::*;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WakeupMode {
    /// Pandora via pianobar.
    #[default]
    Pianobar,
    Mp3,
    /// Selectable, but there is no tuner yet.
    Fm,
}

#[derive(Debug, Default, Deserialize)]
struct WakeupConfig {
    #[serde(default)]
    mode: WakeupMode,
    mp3_track: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Mp3Config {
    selected_track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Track {
    /// Internet radio stream.
    Stream,
    /// Local file, looped.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct TrackSelector {
    wakeup_config: PathBuf,
    mp3_config: PathBuf,
    music_dir: PathBuf,
}

impl TrackSelector {
    pub fn new(paths: &Paths) -> Self {
        Self {
            wakeup_config: paths.wakeup_config(),
            mp3_config: paths.mp3_config(),
            music_dir: paths.music_dir(),
        }
    }

    pub fn select(&self) -> Track {
        let config: WakeupConfig = read_json(&self.wakeup_config).unwrap_or_default();
        debug!(mode = %config.mode, "Wake-up mode");

        match config.mode {
            WakeupMode::Pianobar => Track::Stream,
            WakeupMode::Mp3 => match self.mp3_track(&config) {
                Some(path) => Track::File(path),
                None => {
                    warn!("No playable MP3 selected, falling back to the stream");
                    Track::Stream
                }
            },
            WakeupMode::Fm => {
                info!("FM radio is not available yet, falling back to the stream");
                Track::Stream
            }
        }
    }

    fn mp3_track(&self, config: &WakeupConfig) -> Option<PathBuf> {
        let selected = read_json::<Mp3Config>(&self.mp3_config).and_then(|c| c.selected_track);
        let name = selected.or_else(|| config.mp3_track.clone())?;

        // A bare file name inside the music directory, nothing else.
        if Path::new(&name).file_name() != Some(OsStr::new(&name)) {
            warn!(track = %name, "Ignoring MP3 selection outside the music directory");
            return None;
        }

        let path = self.music_dir.join(&name);
        if path.is_file() {
            Some(path)
        } else {
            warn!(path = %path.display(), "Selected MP3 not found");
            None
        }
    }
}

/// Missing files are normal here; only unreadable ones are worth a warning.
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            None
        }
    }
}
