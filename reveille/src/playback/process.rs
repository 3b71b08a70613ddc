//! Playback through external command-line players and PulseAudio.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::{Playback, Track};
use crate::config::Paths;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

const STREAM_PLAYER: &str = "pianobar";
const FILE_PLAYER: &str = "mpg123";
const PLAYERS: [&str; 2] = [FILE_PLAYER, STREAM_PLAYER];

/// Grace period after killing strays, before the audio device is reused.
const STRAY_SETTLE: Duration = Duration::from_millis(500);

/// Runs one player child at a time and drives `pactl` for volume.
#[derive(Debug)]
pub struct ProcessPlayback {
    child: Mutex<Option<Child>>,
    home: std::path::PathBuf,
}

impl ProcessPlayback {
    pub fn new(paths: &Paths) -> Self {
        Self {
            child: Mutex::new(None),
            home: paths.home.clone(),
        }
    }

    /// Kill every player process on the box, ours or not.
    async fn kill_players(&self) -> bool {
        let mut killed = false;
        for player in PLAYERS {
            // pkill exits 1 when nothing matched.
            match Command::new("pkill").args(["-9", "-x", player]).status().await {
                Ok(status) if status.success() => {
                    debug!(player, "Killed running player");
                    killed = true;
                }
                Ok(_) => {}
                Err(e) => warn!(player, error = %e, "pkill failed"),
            }
        }
        killed
    }
}

#[async_trait]
impl Playback for ProcessPlayback {
    async fn start(&self, track: &Track) -> Result<()> {
        let mut child = self.child.lock().await;
        if let Some(mut previous) = child.take() {
            let _ = previous.kill().await;
        }

        if self.kill_players().await {
            warn!("Stray player was still running, terminated it");
            tokio::time::sleep(STRAY_SETTLE).await;
        }

        let (program, args) = player_command(track);
        let spawned = Command::new(program)
            .args(&args)
            .current_dir(&self.home)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: program.into(),
                source,
            })?;

        info!(player = program, pid = ?spawned.id(), "Playback started");
        *child = Some(spawned);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Player already gone");
            }
        }
        // Players may fork; sweep by name as well.
        self.kill_players().await;
        info!("Playback stopped");
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        let args = volume_args(percent);
        let status = Command::new("pactl")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                command: "pactl".into(),
                source,
            })?;

        if !status.success() {
            return Err(Error::Process {
                command: format!("pactl {}", args.join(" ")),
                status,
            });
        }
        trace!(percent, "Volume set");
        Ok(())
    }
}

fn player_command(track: &Track) -> (&'static str, Vec<String>) {
    match track {
        Track::Stream => (STREAM_PLAYER, Vec::new()),
        Track::File(path) => (
            FILE_PLAYER,
            vec![
                "--loop".into(),
                "-1".into(),
                path.to_string_lossy().into_owned(),
            ],
        ),
    }
}

fn volume_args(percent: u8) -> [String; 3] {
    [
        "set-sink-volume".into(),
        "@DEFAULT_SINK@".into(),
        format!("{}%", percent.min(100)),
    ]
}
