//! The alarm trigger engine.
//!
//! Polls the schedule, decides when the wake-up instant has arrived, and
//! runs the ringing sequence until someone presses stop or it times out.
//!
//! # State Machine
//!
//! ```text
//!            poll: Δ inside window,
//!            not yet rung today
//!  Idle ─────────────────────────────► Active ◄──────────────┐
//!   ▲                                   │  │                  │
//!   │        stop / timeout             │  │ snooze           │ now >= until
//!   ├───────────────────────────────────┘  ▼                  │
//!   │                                    Snoozed ─────────────┘
//!   │        stop / timeout                │  ▲
//!   └──────────────────────────────────────┘  └── snooze (re-arm)
//! ```
//!
//! - **Idle:** Polling the schedule every few seconds. Button presses are
//!   discarded.
//! - **Active:** Music playing, volume ramping up, display shows `WAKE!`.
//! - **Snoozed:** Music stopped, display shows `SNZ HH:MM`.
//!
//! Stop beats snooze when both are pressed between two ticks.
//!
//! # Daily guard
//!
//! Independently of the phase, the engine keeps a durable record of the
//! day the alarm last rang (see [`crate::state`]). While set, no schedule
//! response can ring the alarm again that day. A poll that finds the
//! window already passed by more than the overshoot sets the guard
//! without ringing, so a late start never produces a surprise alarm at
//! 09:00 for a 07:00 wake-up.

mod controller;
mod phase;
mod ramp;
mod window;

pub use controller::AlarmEngine;
pub use phase::{DismissPolicy, DismissReason, Phase, PollOutcome};
pub use ramp::{RampConfig, VolumeRamp};
pub use window::{TriggerWindow, WindowPosition};
