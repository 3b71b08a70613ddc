//! Wake-up alarm controller.
//!
//! Polls a schedule source for the next wake instant, rings the alarm
//! through an external player when the instant arrives, and reacts to
//! snooze/stop requests surfaced as marker files.

pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod schedule;
pub mod signals;
pub mod state;
pub mod tracing;
pub mod types;
