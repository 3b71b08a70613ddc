use chrono::{NaiveDateTime, TimeDelta};

/// Runtime phase of the alarm. Not persisted; a restart always comes back
/// [`Idle`](Phase::Idle) and relies on the daily guard instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,

    /// Ringing. `since` is when the alarm first went off this morning and
    /// does not move on snooze/resume.
    Active { since: NaiveDateTime },

    /// Silenced until `until`, after which ringing resumes.
    Snoozed {
        since: NaiveDateTime,
        until: NaiveDateTime,
    },
}

impl Phase {
    /// True while the alarm sequence is running, ringing or snoozed.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle)
    }

    pub fn snooze_until(&self) -> Option<NaiveDateTime> {
        match self {
            Phase::Snoozed { until, .. } => Some(*until),
            _ => None,
        }
    }

    /// When the current alarm sequence started.
    pub fn since(&self) -> Option<NaiveDateTime> {
        match self {
            Phase::Idle => None,
            Phase::Active { since } | Phase::Snoozed { since, .. } => Some(*since),
        }
    }
}

/// What a schedule poll concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The alarm sequence is already running; nothing was fetched.
    Busy,
    /// No source reported a wake-up.
    NoSchedule,
    /// Wake instant is beyond the lookahead.
    Pending { wake: NaiveDateTime, delta: TimeDelta },
    /// Inside the window: the alarm started ringing.
    Triggered,
    /// Inside the window but the alarm already went off today.
    Guarded,
    /// Passed without ringing; today is written off.
    Missed,
    /// Wake instant from an earlier day, ignored.
    Stale,
}

/// What a full dismissal does to the daily guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DismissPolicy {
    /// The alarm stays done for the rest of the day.
    #[default]
    #[strum(to_string = "keep", serialize = "keep-guard")]
    KeepGuard,

    /// Clear the guard so a later wake-up the same day can still ring.
    #[strum(to_string = "rearm")]
    Rearm,
}

/// Why a sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DismissReason {
    StopRequested,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn phase_accessors() {
        assert!(!Phase::Idle.is_active());
        assert_eq!(Phase::Idle.since(), None);

        let snoozed = Phase::Snoozed {
            since: at(7, 0),
            until: at(7, 9),
        };
        assert!(snoozed.is_active());
        assert_eq!(snoozed.since(), Some(at(7, 0)));
        assert_eq!(snoozed.snooze_until(), Some(at(7, 9)));
        assert_eq!(Phase::Active { since: at(7, 0) }.snooze_until(), None);
    }

    #[test]
    fn dismiss_policy_names() {
        assert_eq!(DismissPolicy::from_str("keep").unwrap(), DismissPolicy::KeepGuard);
        assert_eq!(DismissPolicy::from_str("keep-guard").unwrap(), DismissPolicy::KeepGuard);
        assert_eq!(DismissPolicy::from_str("ReArm").unwrap(), DismissPolicy::Rearm);
        assert!(DismissPolicy::from_str("maybe").is_err());
        assert_eq!(DismissPolicy::KeepGuard.to_string(), "keep");
    }
}
