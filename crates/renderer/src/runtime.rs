use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use scheduler::{FrameToken, TimerToken};

/// Fallback display refresh rate when the monitor does not report one.
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

fn refresh_interval_ms(hz: f64) -> f64 {
    let hz = if hz.is_finite() && hz > 0.0 {
        hz
    } else {
        DEFAULT_REFRESH_HZ
    };
    1000.0 / hz
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Pending animation frames and timers of a host, keyed by token.
///
/// Frames emulate vsync: a frame requested at `t` is due on the first refresh
/// boundary strictly after `t`. Timers are due at `t + delay`. All times are
/// host milliseconds.
#[derive(Debug, Clone)]
pub struct DeadlineQueue {
    refresh_interval_ms: f64,
    next_token: u64,
    frames: BTreeMap<FrameToken, f64>,
    timers: BTreeMap<TimerToken, f64>,
}

impl DeadlineQueue {
    pub fn new(refresh_hz: f64) -> Self {
        Self {
            refresh_interval_ms: refresh_interval_ms(refresh_hz),
            next_token: 0,
            frames: BTreeMap::new(),
            timers: BTreeMap::new(),
        }
    }

    pub fn refresh_interval_ms(&self) -> f64 {
        self.refresh_interval_ms
    }

    /// Applies to frames requested from now on.
    pub fn set_refresh_rate(&mut self, hz: f64) {
        self.refresh_interval_ms = refresh_interval_ms(hz);
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn next_refresh_after(&self, at_ms: f64) -> f64 {
        let interval = self.refresh_interval_ms;
        let mut due = ((at_ms / interval).floor() + 1.0) * interval;
        if due <= at_ms {
            due += interval;
        }
        due
    }

    pub fn request_frame(&mut self, now_ms: f64) -> FrameToken {
        let token = FrameToken(self.next_token());
        let due = self.next_refresh_after(now_ms);
        self.frames.insert(token, due);
        token
    }

    pub fn cancel_frame(&mut self, token: FrameToken) -> bool {
        self.frames.remove(&token).is_some()
    }

    pub fn set_timer(&mut self, now_ms: f64, delay: Duration) -> TimerToken {
        let token = TimerToken(self.next_token());
        self.timers.insert(token, now_ms + duration_ms(delay));
        token
    }

    pub fn clear_timer(&mut self, token: TimerToken) -> bool {
        self.timers.remove(&token).is_some()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.timers.is_empty()
    }

    /// Earliest frame or timer deadline.
    pub fn next_deadline(&self) -> Option<f64> {
        self.frames
            .values()
            .chain(self.timers.values())
            .copied()
            .reduce(f64::min)
    }

    /// Removes the timers due at `now_ms`, earliest deadline first.
    pub fn take_due_timers(&mut self, now_ms: f64) -> Vec<TimerToken> {
        let mut due: Vec<(f64, TimerToken)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now_ms)
            .map(|(token, deadline)| (*deadline, *token))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, token) in &due {
            self.timers.remove(token);
        }
        due.into_iter().map(|(_, token)| token).collect()
    }

    /// Removes the frames due at `now_ms` together with their refresh timestamp.
    pub fn take_due_frames(&mut self, now_ms: f64) -> Vec<(FrameToken, f64)> {
        let due: Vec<(FrameToken, f64)> = self
            .frames
            .iter()
            .filter(|(_, at)| **at <= now_ms)
            .map(|(token, at)| (*token, *at))
            .collect();
        for (token, _) in &due {
            self.frames.remove(token);
        }
        due
    }

    /// Removes the oldest pending frame whether or not it is due.
    pub fn take_oldest_frame(&mut self) -> Option<FrameToken> {
        let token = *self.frames.keys().next()?;
        self.frames.remove(&token);
        Some(token)
    }
}

impl Default for DeadlineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}

/// Wall-clock milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> f64 {
        duration_ms(self.origin.elapsed())
    }

    /// The instant a host-millisecond deadline corresponds to.
    pub fn instant_at(&self, at_ms: f64) -> Instant {
        let offset = Duration::from_secs_f64((at_ms / 1000.0).max(0.0));
        self.origin + offset
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_land_on_refresh_boundaries() {
        let mut queue = DeadlineQueue::new(50.0);
        let first = queue.request_frame(0.0);
        let second = queue.request_frame(20.0);
        let third = queue.request_frame(25.0);
        assert_eq!(queue.take_due_frames(19.0), vec![]);
        assert_eq!(queue.take_due_frames(20.0), vec![(first, 20.0)]);
        assert_eq!(queue.take_due_frames(40.0), vec![(second, 40.0), (third, 40.0)]);
    }

    #[test]
    fn invalid_refresh_rate_falls_back() {
        let queue = DeadlineQueue::new(0.0);
        assert!((queue.refresh_interval_ms() - 1000.0 / 60.0).abs() < 1e-9);
        assert!(queue.next_refresh_after(16.0) > 16.0);
    }

    #[test]
    fn next_deadline_spans_frames_and_timers() {
        let mut queue = DeadlineQueue::new(10.0);
        assert_eq!(queue.next_deadline(), None);
        let frame = queue.request_frame(0.0);
        queue.set_timer(0.0, Duration::from_millis(40));
        assert_eq!(queue.next_deadline(), Some(40.0));
        queue.cancel_frame(frame);
        queue.set_timer(0.0, Duration::from_millis(70));
        assert_eq!(queue.next_deadline(), Some(40.0));
    }

    #[test]
    fn timers_come_out_in_deadline_order() {
        let mut queue = DeadlineQueue::default();
        let late = queue.set_timer(0.0, Duration::from_millis(30));
        let early = queue.set_timer(0.0, Duration::from_millis(10));
        let cleared = queue.set_timer(0.0, Duration::from_millis(5));
        assert!(queue.clear_timer(cleared));
        assert!(!queue.clear_timer(cleared));
        assert_eq!(queue.take_due_timers(50.0), vec![early, late]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clock_maps_deadlines_back_to_instants() {
        let clock = MonotonicClock::new();
        let at = clock.instant_at(250.0);
        assert_eq!(at.duration_since(clock.origin), Duration::from_millis(250));
    }
}
