use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

/// Source of "now" for every time-dependent rule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Offset that places the local midnight for day buckets.
    fn utc_offset(&self) -> FixedOffset;

    fn now_bson(&self) -> mongodb::bson::DateTime {
        mongodb::bson::DateTime::from_chrono(self.now())
    }

    /// Local calendar day of `now`, as `YYYY-MM-DD`.
    fn today(&self) -> String {
        day_key(self.now(), self.utc_offset())
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        SystemClock { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn utc_offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Day bucket of an instant: the local date in `[midnight, next midnight)`.
pub fn day_key(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
        offset: FixedOffset,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            ManualClock {
                now: Mutex::new(now),
                offset: FixedOffset::east_opt(0).unwrap(),
            }
        }

        pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
            ManualClock {
                now: Mutex::new(now),
                offset,
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn utc_offset(&self) -> FixedOffset {
            self.offset
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn day_key_uses_local_midnight() {
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        // 19:00 UTC is 00:30 the next day in IST.
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap();
        assert_eq!(day_key(late, ist), "2024-05-02");
        assert_eq!(day_key(late, FixedOffset::east_opt(0).unwrap()), "2024-05-01");
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.today(), "2024-05-01");
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
        assert_eq!(clock.today(), "2024-05-02");
    }
}
