use std::time::Duration;

use chrono::TimeDelta;

/// Tolerance around the wake instant inside which a poll rings the alarm.
///
/// With Δ = wake − now, a poll triggers when `-overshoot <= Δ <= early`.
/// The window is lopsided: a poll slightly early is fine, and a poll that
/// lands late (slow network, suspended Pi) still rings, but only for so
/// long before the morning is written off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerWindow {
    pub early: Duration,
    pub overshoot: Duration,
}

impl Default for TriggerWindow {
    fn default() -> Self {
        Self {
            early: Duration::from_secs(10),
            overshoot: Duration::from_secs(30),
        }
    }
}

/// Where a wake instant sits relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Still in the future beyond the lookahead.
    Ahead,
    Inside,
    /// Passed by more than the overshoot.
    Missed,
}

impl TriggerWindow {
    /// Classify `delta = wake - now`.
    pub fn classify(&self, delta: TimeDelta) -> WindowPosition {
        let early = TimeDelta::from_std(self.early).unwrap_or(TimeDelta::MAX);
        let overshoot = TimeDelta::from_std(self.overshoot).unwrap_or(TimeDelta::MAX);

        if delta > early {
            WindowPosition::Ahead
        } else if delta < -overshoot {
            WindowPosition::Missed
        } else {
            WindowPosition::Inside
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(3600 => WindowPosition::Ahead ; "an hour out")]
    #[test_case(11 => WindowPosition::Ahead ; "just before lookahead")]
    #[test_case(10 => WindowPosition::Inside ; "lookahead edge")]
    #[test_case(0 => WindowPosition::Inside ; "on time")]
    #[test_case(-30 => WindowPosition::Inside ; "overshoot edge")]
    #[test_case(-31 => WindowPosition::Missed ; "past overshoot")]
    #[test_case(-7200 => WindowPosition::Missed ; "hours late")]
    fn default_window(delta_secs: i64) -> WindowPosition {
        TriggerWindow::default().classify(TimeDelta::seconds(delta_secs))
    }

    #[test]
    fn zero_width_window_only_fires_on_the_second() {
        let window = TriggerWindow {
            early: Duration::ZERO,
            overshoot: Duration::ZERO,
        };
        assert_eq!(window.classify(TimeDelta::seconds(1)), WindowPosition::Ahead);
        assert_eq!(window.classify(TimeDelta::zero()), WindowPosition::Inside);
        assert_eq!(window.classify(TimeDelta::seconds(-1)), WindowPosition::Missed);
    }
}
