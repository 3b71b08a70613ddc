//! Audio output: one external player process and the system volume.

mod process;
mod track;

use async_trait::async_trait;

pub use process::ProcessPlayback;
pub use track::{Track, TrackSelector, WakeupMode};

use crate::error::Result;

/// Control surface of the audio player.
///
/// Implementations treat the player as a singleton: `start` must leave
/// exactly one player running, terminating any stray instance first.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn start(&self, track: &Track) -> Result<()>;

    /// Stop playback. Stopping when nothing plays is not an error.
    async fn stop(&self) -> Result<()>;

    /// Set output volume, 0--100.
    async fn set_volume(&self, percent: u8) -> Result<()>;
}
