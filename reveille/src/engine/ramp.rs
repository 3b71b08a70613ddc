//! Gradual volume increase after playback starts.
//!
//! The ramp runs as its own task so the button loop stays responsive.
//! Whoever starts a ramp owns its [`VolumeRamp`] handle and must call
//! [`VolumeRamp::stop`] before touching the volume or starting another
//! ramp; `stop` returns only once the task has exited, so two ramps never
//! write the volume at the same time.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::playback::Playback;
use crate::tracing::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampConfig {
    pub min_volume: u8,
    pub max_volume: u8,
    /// Percentage points per step.
    pub step: u8,
    /// Time from the first to the last step.
    pub duration: Duration,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            min_volume: 10,
            max_volume: 35,
            step: 2,
            duration: Duration::from_secs(10),
        }
    }
}

impl RampConfig {
    /// Volume levels in the order they are applied, always ending at
    /// `max_volume`.
    pub fn levels(&self) -> Vec<u8> {
        let max = self.max_volume;
        let min = self.min_volume.min(max);
        let step = usize::from(self.step.max(1));

        let mut levels: Vec<u8> = (min..max).step_by(step).collect();
        levels.push(max);
        levels
    }

    /// Pause between consecutive levels.
    pub fn step_delay(&self) -> Duration {
        let gaps = self.levels().len().saturating_sub(1);
        match u32::try_from(gaps) {
            Ok(gaps) if gaps > 0 => self.duration / gaps,
            _ => Duration::ZERO,
        }
    }
}

/// Handle to a running ramp task.
#[derive(Debug)]
pub struct VolumeRamp {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl VolumeRamp {
    pub fn spawn(playback: Arc<dyn Playback>, config: RampConfig) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(playback, config, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel the ramp and wait for the task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Volume ramp task failed");
        }
    }
}

async fn run(playback: Arc<dyn Playback>, config: RampConfig, cancel: CancellationToken) {
    let levels = config.levels();
    let delay = config.step_delay();
    debug!(
        from = config.min_volume,
        to = config.max_volume,
        steps = levels.len(),
        "Volume ramp started"
    );

    for (i, level) in levels.iter().copied().enumerate() {
        if cancel.is_cancelled() {
            debug!(level, "Volume ramp cancelled");
            return;
        }
        if let Err(e) = playback.set_volume(level).await {
            warn!(level, error = %e, "Could not set volume");
        }
        if i + 1 == levels.len() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(level, "Volume ramp cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(volume = config.max_volume, "Volume ramp complete");
}
