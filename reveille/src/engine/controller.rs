use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::phase::{DismissPolicy, DismissReason, Phase, PollOutcome};
use super::ramp::VolumeRamp;
use super::window::WindowPosition;
use crate::config::AlarmConfig;
use crate::playback::{Playback, TrackSelector};
use crate::schedule::ScheduleSource;
use crate::signals::{DISPLAY_WAKE, SignalStore};
use crate::state::{StateStore, TriggerState};
use crate::tracing::prelude::*;
use crate::types::Clock;

/// Progress log cadence while the sequence runs.
const HEARTBEAT_SECS: i64 = 30;

/// Polls closer than this to the wake instant log their arithmetic.
const APPROACH_LOG_SECS: i64 = 120;

pub struct AlarmEngine {
    config: AlarmConfig,
    clock: Arc<dyn Clock>,
    schedule: Arc<dyn ScheduleSource>,
    playback: Arc<dyn Playback>,
    tracks: TrackSelector,
    signals: SignalStore,
    store: StateStore,
    state: TriggerState,
    phase: Phase,
    ramp: Option<VolumeRamp>,
    /// Wake instant the current or most recent sequence rang for. Keeps a
    /// re-armed guard from ringing twice for the same wake-up.
    rang_for: Option<NaiveDateTime>,
    last_heartbeat: Option<NaiveDateTime>,
}

impl AlarmEngine {
    /// Clears leftover markers from a previous run and loads the daily
    /// guard.
    pub fn new(
        config: AlarmConfig,
        clock: Arc<dyn Clock>,
        schedule: Arc<dyn ScheduleSource>,
        playback: Arc<dyn Playback>,
    ) -> Self {
        let signals = SignalStore::new(&config.paths);
        if let Err(e) = signals.ensure_dir() {
            warn!(error = %e, "Could not create signals directory");
        }
        signals.clear_all_markers();

        let store = StateStore::new(&config.paths);
        let state = store.load(clock.now());

        Self {
            tracks: TrackSelector::new(&config.paths),
            config,
            clock,
            schedule,
            playback,
            signals,
            store,
            state,
            phase: Phase::Idle,
            ramp: None,
            rang_for: None,
            last_heartbeat: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trigger_state(&self) -> &TriggerState {
        &self.state
    }

    /// Poll the schedule until `shutdown` fires, ringing whenever a poll
    /// lands in the trigger window. Cleans up on the way out.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            poll = ?self.config.poll_interval,
            early = ?self.config.trigger_window.early,
            overshoot = ?self.config.trigger_window.overshoot,
            dismiss = %self.config.dismiss,
            "Alarm engine started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    let now = self.clock.now();
                    if self.poll(now).await == PollOutcome::Triggered {
                        self.ring(&shutdown).await;
                        interval.reset();
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Button loop for one alarm sequence.
    async fn ring(&mut self, shutdown: &CancellationToken) {
        let mut buttons = tokio::time::interval(self.config.button_interval);
        buttons.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.phase.is_active() {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    return;
                }
                _ = buttons.tick() => {
                    let now = self.clock.now();
                    self.tick(now).await;
                }
            }
        }
    }

    /// One schedule poll while idle.
    pub async fn poll(&mut self, now: NaiveDateTime) -> PollOutcome {
        if self.store.take_reset_request() {
            self.state.clear();
            self.rang_for = None;
            self.store.save(&self.state);
        }
        if self.state.refresh(now) {
            info!(date = %now.date(), "New day, alarm re-armed");
        }

        if self.phase.is_active() {
            return PollOutcome::Busy;
        }
        self.discard_idle_requests();

        let Some(wake) = self.schedule.fetch(now).await else {
            trace!("No wake-up scheduled");
            return PollOutcome::NoSchedule;
        };

        let delta = wake - now;
        log_approach(wake, now, delta);
        let handled = self.state.triggered_today || self.rang_for == Some(wake);

        match self.config.trigger_window.classify(delta) {
            WindowPosition::Ahead => PollOutcome::Pending { wake, delta },
            WindowPosition::Inside if handled => {
                debug!(wake = %wake, "Inside window but alarm already handled");
                PollOutcome::Guarded
            }
            WindowPosition::Inside => {
                self.trigger(wake, now).await;
                PollOutcome::Triggered
            }
            WindowPosition::Missed if wake.date() < now.date() => {
                debug!(wake = %wake, "Ignoring wake-up from an earlier day");
                PollOutcome::Stale
            }
            WindowPosition::Missed if handled => PollOutcome::Guarded,
            WindowPosition::Missed => {
                warn!(
                    wake = %wake,
                    late_by = %describe(-delta),
                    "Wake-up passed without ringing, skipping today"
                );
                self.state.mark_missed(now);
                self.store.save(&self.state);
                PollOutcome::Missed
            }
        }
    }

    /// One button check while the sequence runs. Returns the resulting
    /// phase.
    pub async fn tick(&mut self, now: NaiveDateTime) -> Phase {
        if !self.phase.is_active() {
            return self.phase;
        }

        if self.signals.consume_stop_request() {
            self.dismiss(now, DismissReason::StopRequested).await;
            return self.phase;
        }
        if self.signals.consume_snooze_request() {
            self.snooze(now).await;
        }

        if let Phase::Snoozed { since, until } = self.phase {
            if now >= until {
                self.resume(since).await;
            }
        }

        if let Some(since) = self.phase.since() {
            let limit = TimeDelta::from_std(self.config.max_duration).unwrap_or(TimeDelta::MAX);
            if now - since >= limit {
                warn!(limit = ?self.config.max_duration, "Alarm ran too long, dismissing");
                self.dismiss(now, DismissReason::TimedOut).await;
                return self.phase;
            }
            self.heartbeat(now, since);
        }

        self.phase
    }

    /// Stop everything and clear the signal files.
    pub async fn shutdown(&mut self) {
        info!("Alarm engine shutting down");
        self.cancel_ramp().await;
        if let Err(e) = self.playback.stop().await {
            warn!(error = %e, "Could not stop playback");
        }
        self.phase = Phase::Idle;
        self.signals.clear_all_markers();
    }

    async fn trigger(&mut self, wake: NaiveDateTime, now: NaiveDateTime) {
        info!(
            wake = %wake.format("%H:%M:%S"),
            at = %now.format("%H:%M:%S"),
            "Alarm triggered"
        );

        self.state.record_trigger(now);
        self.store.save(&self.state);
        self.rang_for = Some(wake);
        self.phase = Phase::Active { since: now };
        self.last_heartbeat = Some(now);

        self.signals.write_display(DISPLAY_WAKE);
        self.start_music().await;
    }

    async fn snooze(&mut self, now: NaiveDateTime) {
        let Some(since) = self.phase.since() else {
            return;
        };
        let until = TimeDelta::from_std(self.config.snooze)
            .ok()
            .and_then(|snooze| now.checked_add_signed(snooze))
            .unwrap_or(NaiveDateTime::MAX);

        if let Phase::Active { .. } = self.phase {
            self.stop_music().await;
        }
        self.phase = Phase::Snoozed { since, until };
        self.signals
            .write_display(&format!("SNZ {}", until.format("%H:%M")));
        info!(until = %until.format("%H:%M:%S"), "Snoozed");
    }

    async fn resume(&mut self, since: NaiveDateTime) {
        info!("Snooze over, ringing again");
        self.phase = Phase::Active { since };
        self.signals.write_display(DISPLAY_WAKE);
        self.start_music().await;
    }

    async fn dismiss(&mut self, now: NaiveDateTime, reason: DismissReason) {
        let ran_for = self.phase.since().map(|since| now - since).unwrap_or_default();

        self.stop_music().await;
        self.phase = Phase::Idle;
        self.last_heartbeat = None;
        self.signals.write_display("");
        self.signals.discard_requests();

        if self.config.dismiss == DismissPolicy::Rearm {
            self.state.clear();
            info!("Daily guard cleared, later wake-ups today will ring");
        }
        self.store.save(&self.state);

        info!(%reason, ran_for = %describe(ran_for), "Alarm dismissed");
    }

    fn heartbeat(&mut self, now: NaiveDateTime, since: NaiveDateTime) {
        let due = self
            .last_heartbeat
            .is_none_or(|last| now - last >= TimeDelta::seconds(HEARTBEAT_SECS));
        if due {
            self.last_heartbeat = Some(now);
            info!(
                phase = ?self.phase,
                running_for = %describe(now - since),
                "Alarm still running"
            );
        }
    }

    /// Button presses while idle have nothing to act on.
    fn discard_idle_requests(&self) {
        if self.signals.consume_snooze_request() {
            info!("Snooze pressed but alarm not active");
        }
        if self.signals.consume_stop_request() {
            info!("Stop pressed but alarm not active");
        }
    }

    async fn start_music(&mut self) {
        self.cancel_ramp().await;

        let track = self.tracks.select();
        if let Err(e) = self.playback.set_volume(self.config.ramp.min_volume).await {
            warn!(error = %e, "Could not set starting volume");
        }
        match self.playback.start(&track).await {
            Ok(()) => {
                self.ramp = Some(VolumeRamp::spawn(
                    self.playback.clone(),
                    self.config.ramp.clone(),
                ));
            }
            Err(e) => error!(?track, error = %e, "Could not start playback"),
        }
    }

    async fn stop_music(&mut self) {
        self.cancel_ramp().await;
        if let Err(e) = self.playback.stop().await {
            warn!(error = %e, "Could not stop playback");
        }
        if let Err(e) = self.playback.set_volume(self.config.snooze_volume).await {
            warn!(error = %e, "Could not reset volume");
        }
    }

    async fn cancel_ramp(&mut self) {
        if let Some(ramp) = self.ramp.take() {
            ramp.stop().await;
        }
    }
}

fn log_approach(wake: NaiveDateTime, now: NaiveDateTime, delta: TimeDelta) {
    if delta.num_seconds().abs() <= APPROACH_LOG_SECS {
        debug!(
            wake = %wake.format("%H:%M:%S"),
            now = %now.format("%H:%M:%S"),
            delta_secs = delta.num_seconds(),
            "Approaching wake-up"
        );
    } else if delta > TimeDelta::zero() {
        trace!(wake = %wake, remaining = %describe(delta), "Next wake-up");
    }
}

/// Compact human duration: `2h 05m`, `4m 10s`, `12s`.
fn describe(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{sign}{h}h {m:02}m")
    } else if m > 0 {
        format!("{sign}{m}m {s:02}s")
    } else {
        format!("{sign}{s}s")
    }
}
