//! Explicit timer state machines driven by the caller's clock.
//!
//! Nothing here spawns tasks; the owner calls `fire_due`/`due` from its own
//! tick so that timing stays deterministic and testable.

use chrono::{DateTime, Duration, Utc};

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or_else(|_| Duration::zero())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    Armed { deadline: DateTime<Utc> },
}

/// Trailing-edge debouncer. Each trigger cancels the pending deadline and
/// schedules a new one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay: to_chrono(delay),
            state: DebounceState::Idle,
        }
    }

    /// (Re)arm the debouncer relative to `now`.
    pub fn trigger(&mut self, now: DateTime<Utc>) {
        self.state = DebounceState::Armed {
            deadline: now + self.delay,
        };
    }

    /// Returns `true` exactly once per quiet period, when the deadline passed.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            DebounceState::Armed { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DebounceState::Armed { .. })
    }
}

/// Fixed-period ticker.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next_due: Option<DateTime<Utc>>,
}

impl Ticker {
    pub fn new(period: std::time::Duration) -> Self {
        Self {
            period: to_chrono(period).max(Duration::milliseconds(1)),
            next_due: None,
        }
    }

    /// Start ticking; the first tick is one period after `now`.
    /// Starting a running ticker keeps its schedule.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.period);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns `true` if a tick is due at `now`. Missed ticks collapse into one.
    pub fn due(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_due {
            Some(next) if now >= next => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_debouncer_fires_once_after_quiet_period() {
        let mut debounce = Debouncer::new(StdDuration::from_millis(200));
        let t0 = Utc::now();

        debounce.trigger(t0);
        assert!(!debounce.fire_due(t0 + Duration::milliseconds(199)));
        assert!(debounce.fire_due(t0 + Duration::milliseconds(200)));
        assert!(!debounce.fire_due(t0 + Duration::milliseconds(400)));
    }

    #[test]
    fn test_retrigger_pushes_deadline_out() {
        let mut debounce = Debouncer::new(StdDuration::from_millis(200));
        let t0 = Utc::now();

        debounce.trigger(t0);
        debounce.trigger(t0 + Duration::milliseconds(150));
        assert!(!debounce.fire_due(t0 + Duration::milliseconds(250)));
        assert!(debounce.fire_due(t0 + Duration::milliseconds(350)));
    }

    #[test]
    fn test_cancel_disarms() {
        let mut debounce = Debouncer::new(StdDuration::from_millis(10));
        let t0 = Utc::now();
        debounce.trigger(t0);
        debounce.cancel();
        assert!(!debounce.is_armed());
        assert!(!debounce.fire_due(t0 + Duration::seconds(1)));
    }

    #[test]
    fn test_ticker_schedule() {
        let mut ticker = Ticker::new(StdDuration::from_millis(150));
        let t0 = Utc::now();

        assert!(!ticker.due(t0));
        ticker.start(t0);
        ticker.start(t0 + Duration::milliseconds(100));
        assert!(!ticker.due(t0 + Duration::milliseconds(149)));
        assert!(ticker.due(t0 + Duration::milliseconds(150)));
        assert!(!ticker.due(t0 + Duration::milliseconds(200)));
        // a long stall yields a single tick
        assert!(ticker.due(t0 + Duration::seconds(5)));
        assert!(!ticker.due(t0 + Duration::seconds(5)));

        ticker.stop();
        assert!(!ticker.is_running());
    }
}
