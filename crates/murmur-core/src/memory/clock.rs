//! Wall-clock abstraction.
//!
//! Archive timestamps, the summary day boundary, and the summary window all
//! read time through [`Clock`] so they can be driven deterministically.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Utc};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A manually-driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Last millisecond of the local day before `now`.
///
/// Everything created strictly after this instant was created "today".
pub fn end_of_yesterday(now: DateTime<FixedOffset>) -> DateTime<Utc> {
    let midnight = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*now.offset())
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc));
    midnight - Duration::milliseconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn shanghai() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_end_of_yesterday_uses_local_midnight() {
        let now = shanghai().with_ymd_and_hms(2026, 4, 2, 3, 30, 0).unwrap();
        let boundary = end_of_yesterday(now);
        // Local midnight 2026-04-02 00:00 +08:00 is 2026-04-01 16:00 UTC.
        let expected = Utc.with_ymd_and_hms(2026, 4, 1, 16, 0, 0).unwrap()
            - Duration::milliseconds(1);
        assert_eq!(boundary, expected);
    }

    #[test]
    fn test_fixed_clock_advances() {
        let start = shanghai().with_ymd_and_hms(2026, 4, 2, 23, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now().date_naive().to_string(), "2026-04-03");
        assert_eq!(clock.now_utc(), start.with_timezone(&Utc) + Duration::hours(2));
    }
}
