use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

/// Wall-clock source. Cache keys embed `today_utc()`, so swapping the clock
/// is how day rollover is exercised.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    fn today_utc(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut g = self.now.lock();
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_rolls_over_utc_day() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 30).unwrap());
        let d1 = clock.today_utc();

        clock.advance(chrono::Duration::seconds(45));

        assert_eq!(clock.today_utc(), d1.succ_opt().unwrap());
    }
}
