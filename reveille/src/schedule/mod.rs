//! Where the next wake-up comes from.
//!
//! The engine only ever asks one question: "when is the next wake-up?".
//! [`ChainedSchedule`] answers it by asking the push cache first and the
//! scheduler's status endpoints after that, in order, settling for the
//! first channel that reports an alarm. Every failure mode (missing file,
//! bad JSON, refused connection, hung server) collapses to `None` so the
//! polling loop never has to care.

mod normalize;
mod push_cache;
mod status_api;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

pub use normalize::{parse_instant, resolve_time_of_day};
pub use push_cache::PushCache;
pub use status_api::StatusClient;

use crate::config::AlarmConfig;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::types::first_success_async;

/// Slack on top of one request timeout for the whole chain.
const CHAIN_BUDGET_SLACK: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Next wake instant in local wall-clock time, or `None` when no alarm
    /// is configured or nothing could be reached.
    async fn fetch(&self, now: NaiveDateTime) -> Option<NaiveDateTime>;
}

/// One way of learning the schedule.
#[derive(Debug, Clone)]
pub enum Channel {
    PushCache(PushCache),
    StatusApi(StatusClient),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::PushCache(cache) => write!(f, "push cache {}", cache.path().display()),
            Channel::StatusApi(client) => write!(f, "status api {}", client.base_url()),
        }
    }
}

impl Channel {
    async fn lookup(&self, now: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        match self {
            Channel::PushCache(cache) => cache.read(now).await,
            Channel::StatusApi(client) => client.fetch(now).await,
        }
    }
}

/// Why a channel did not produce a wake instant.
#[derive(Debug)]
enum Miss {
    NoAlarm,
    Failed(Error),
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::NoAlarm => write!(f, "no alarm set"),
            Miss::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Channels tried in order under one overall time budget.
#[derive(Debug, Clone)]
pub struct ChainedSchedule {
    channels: Vec<Channel>,
    budget: Duration,
}

impl ChainedSchedule {
    pub fn new(channels: Vec<Channel>, budget: Duration) -> Self {
        Self { channels, budget }
    }

    /// Push cache first, then each configured status URL.
    pub fn from_config(config: &AlarmConfig) -> Result<Self> {
        let mut channels = vec![Channel::PushCache(PushCache::new(
            config.paths.schedule_cache(),
        ))];
        for url in &config.status_urls {
            channels.push(Channel::StatusApi(StatusClient::with_base_url(
                url.as_str(),
                config.fetch_timeout,
            )?));
        }
        Ok(Self::new(channels, config.fetch_timeout + CHAIN_BUDGET_SLACK))
    }
}

#[async_trait]
impl ScheduleSource for ChainedSchedule {
    async fn fetch(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let lookup = first_success_async(&self.channels, |channel| async move {
            match channel.lookup(now).await {
                Ok(Some(wake)) => Ok((channel, wake)),
                Ok(None) => Err(Miss::NoAlarm),
                Err(e) => Err(Miss::Failed(e)),
            }
        });

        match tokio::time::timeout(self.budget, lookup).await {
            Ok(Ok((channel, wake))) => {
                trace!(%channel, wake = %wake, "Schedule lookup");
                Some(wake)
            }
            Ok(Err(exhausted)) => {
                for (channel, miss) in &exhausted.failures {
                    match miss {
                        Miss::Failed(e @ (Error::Json(_) | Error::Schedule(_))) => {
                            warn!(%channel, error = %e, "Unusable schedule data");
                        }
                        _ => debug!(%channel, reason = %miss, "No wake time from channel"),
                    }
                }
                debug!("No alarm set or schedule unreachable");
                None
            }
            Err(_) => {
                warn!(budget = ?self.budget, "Schedule lookup timed out");
                None
            }
        }
    }
}
