//! Periodic snapshot trigger.
//!
//! `Idle` until armed; once armed, `tick()` resolves every `interval` and
//! the scheduler stays armed. A deadline that was missed entirely (the
//! foreground was busy) is skipped rather than fired in a burst.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RefreshInterval;

/// Why a snapshot refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Scheduled,
    Manual,
}

#[derive(Debug)]
pub struct RefreshScheduler {
    interval: RefreshInterval,
    /// `None` while idle.
    deadline: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(interval: RefreshInterval) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> RefreshInterval {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Start the timer; the first tick fires one `interval` from now.
    pub fn arm(&mut self, interval: RefreshInterval) {
        self.interval = interval;
        self.deadline = Some(Instant::now() + interval.as_duration());
        info!(every = %interval, "refresh scheduler armed");
    }

    /// Replace the pending timer. Stays armed if it was armed; an idle
    /// scheduler only records the new interval.
    pub fn set_interval(&mut self, interval: RefreshInterval) {
        self.interval = interval;
        if self.deadline.is_some() {
            self.deadline = Some(Instant::now() + interval.as_duration());
        }
        debug!(every = %interval, armed = self.is_armed(), "refresh interval changed");
    }

    /// Manual refresh. The timer phase is left alone.
    pub fn trigger_now(&self) -> RefreshReason {
        RefreshReason::Manual
    }

    /// Wait for the next scheduled refresh. Never resolves while idle.
    ///
    /// Cancel-safe: the deadline only advances after the sleep completes,
    /// so dropping this future inside `select!` loses nothing.
    pub async fn tick(&mut self) -> RefreshReason {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(deadline).await;

        let period = self.interval.as_duration();
        let now = Instant::now();
        let mut next = deadline + period;
        if next <= now {
            debug!(missed_ms = (now - deadline).as_millis() as u64, "refresh tick missed; skipping");
            next = now + period;
        }
        self.deadline = Some(next);

        RefreshReason::Scheduled
    }
}
