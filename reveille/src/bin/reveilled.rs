//! Alarm daemon: polls the wake-up schedule and rings the alarm.
//!
//! Configured entirely through `REVEILLE_*` environment variables; see
//! [`reveille::config::AlarmConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use reveille::config::AlarmConfig;
use reveille::engine::AlarmEngine;
use reveille::playback::ProcessPlayback;
use reveille::schedule::ChainedSchedule;
use reveille::tracing::{self, prelude::*};
use reveille::types::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config = AlarmConfig::from_env();
    info!(
        home = %config.paths.home.display(),
        status_urls = ?config.status_urls,
        "Starting alarm daemon"
    );

    let schedule =
        ChainedSchedule::from_config(&config).context("failed to set up schedule sources")?;
    let playback = ProcessPlayback::new(&config.paths);
    let engine = AlarmEngine::new(
        config,
        Arc::new(SystemClock),
        Arc::new(schedule),
        Arc::new(playback),
    );

    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));

    wait_for_shutdown().await;
    info!("Shutdown signal received");
    shutdown.cancel();

    engine_task.await.context("alarm engine task failed")?;
    info!("Alarm daemon stopped");
    Ok(())
}

/// SIGINT or SIGTERM, whichever comes first.
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!(error = %e, "Could not install SIGTERM handler, only Ctrl+C will stop");
            None
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            match terminate.as_mut() {
                Some(sig) => {
                    sig.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        } => {}
    }
}
