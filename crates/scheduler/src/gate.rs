use std::time::Duration;

use crate::{TimerHost, TimerToken};

/// Collapses bursts of triggers into one firing after a quiet period.
///
/// Every trigger clears the previous timer and arms a new one; only the token
/// of the most recent timer is accepted by [`Debouncer::fire`].
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<TimerToken>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn trigger<T: TimerHost + ?Sized>(&mut self, host: &mut T) -> TimerToken {
        if let Some(previous) = self.pending.take() {
            host.clear_timeout(previous);
        }
        let token = host.set_timeout(self.delay);
        self.pending = Some(token);
        token
    }

    /// Returns true when `token` is the armed timer; the debouncer is then idle.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn cancel<T: TimerHost + ?Sized>(&mut self, host: &mut T) {
        if let Some(token) = self.pending.take() {
            host.clear_timeout(token);
        }
    }
}

/// Accepts at most one event per interval and drops the rest.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval_ms: f64,
    last_accepted_ms: Option<f64>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_nanos() as f64 / 1_000_000.0,
            last_accepted_ms: None,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn last_accepted_ms(&self) -> Option<f64> {
        self.last_accepted_ms
    }

    pub fn admit(&mut self, now_ms: f64) -> bool {
        match self.last_accepted_ms {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Default)]
    struct FakeTimers {
        next: u64,
        armed: BTreeMap<TimerToken, Duration>,
    }

    impl TimerHost for FakeTimers {
        fn set_timeout(&mut self, delay: Duration) -> TimerToken {
            self.next += 1;
            let token = TimerToken(self.next);
            self.armed.insert(token, delay);
            token
        }

        fn clear_timeout(&mut self, token: TimerToken) {
            self.armed.remove(&token);
        }
    }

    #[test]
    fn retriggering_replaces_the_armed_timer() {
        let mut host = FakeTimers::default();
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        let first = debounce.trigger(&mut host);
        let second = debounce.trigger(&mut host);
        assert_eq!(host.armed.len(), 1);
        assert!(!debounce.fire(first));
        assert!(debounce.fire(second));
        assert!(!debounce.is_pending());
        assert!(!debounce.fire(second));
    }

    #[test]
    fn cancel_without_trigger_is_a_no_op() {
        let mut host = FakeTimers::default();
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        debounce.cancel(&mut host);
        debounce.trigger(&mut host);
        debounce.cancel(&mut host);
        debounce.cancel(&mut host);
        assert!(host.armed.is_empty());
    }

    #[test]
    fn throttle_drops_events_inside_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        assert!(throttle.admit(0.0));
        assert!(!throttle.admit(10.0));
        assert!(throttle.admit(60.0));
        assert!(!throttle.admit(100.0));
        assert!(throttle.admit(110.0));
    }
}
