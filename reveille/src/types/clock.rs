use chrono::{Local, NaiveDateTime};

/// Source of local wall-clock time.
///
/// Alarm decisions are made against the local calendar (the wake time is
/// "7:00 in this house"), so everything downstream works with
/// [`NaiveDateTime`] in local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
