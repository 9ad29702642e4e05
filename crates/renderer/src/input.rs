use scheduler::Throttle;
use tracing::{debug, trace};

use crate::host::{ContainerId, Host, ListenerId, ListenerKind, ListenerTarget};
use crate::types::{ContainerRect, PointerEvent, Tuning};

/// Tracked pointer position in surface space (`[0, 1]²`, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    current: [f32; 2],
    target: [f32; 2],
    last_sample_ms: Option<f64>,
}

impl PointerState {
    pub fn new(initial: [f32; 2]) -> Self {
        Self {
            current: initial,
            target: initial,
            last_sample_ms: None,
        }
    }

    pub fn current(&self) -> [f32; 2] {
        self.current
    }

    pub fn target(&self) -> [f32; 2] {
        self.target
    }

    pub fn last_sample_ms(&self) -> Option<f64> {
        self.last_sample_ms
    }

    /// One step of the first-order filter: `current += (target - current) * factor`.
    pub fn smooth(&mut self, factor: f32) {
        for axis in 0..2 {
            self.current[axis] += (self.target[axis] - self.current[axis]) * factor;
        }
    }

    fn retarget(&mut self, target: [f32; 2], timestamp_ms: f64) {
        self.target = target;
        self.last_sample_ms = Some(timestamp_ms);
    }
}

impl Default for PointerState {
    fn default() -> Self {
        Self::new([0.5, 0.5])
    }
}

/// Maps client coordinates into the container, flipping Y so the origin sits
/// at the bottom-left like the surface. `None` for a container without area.
pub fn normalize_pointer(event: PointerEvent, rect: ContainerRect) -> Option<[f32; 2]> {
    if !rect.has_area() {
        return None;
    }
    let x = (event.client_x - rect.left) / rect.width;
    let y = 1.0 - (event.client_y - rect.top) / rect.height;
    Some([x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)])
}

/// Throttled pointer listener scoped to one container.
pub struct InputTracker {
    container: ContainerId,
    listener: Option<ListenerId>,
    throttle: Throttle,
}

impl InputTracker {
    pub fn attach<H: Host + ?Sized>(host: &mut H, container: ContainerId, tuning: &Tuning) -> Self {
        let listener = host.add_listener(
            ListenerTarget::Container(container),
            ListenerKind::PointerMove,
        );
        debug!(?container, "pointer tracking attached");
        Self {
            container,
            listener: Some(listener),
            throttle: Throttle::new(tuning.pointer_throttle),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Updates `pointer.target` unless the event falls inside the throttle
    /// window. Dropped events are not queued. Returns whether it was accepted.
    ///
    /// Events that cannot be normalized (zero-area container) are dropped
    /// without opening a throttle window.
    pub fn on_pointer_move<H: Host + ?Sized>(
        &mut self,
        host: &H,
        pointer: &mut PointerState,
        event: PointerEvent,
    ) -> bool {
        if self.listener.is_none() {
            return false;
        }
        let now = host.now_ms();
        let Some(target) = normalize_pointer(event, host.container_rect(self.container)) else {
            return false;
        };
        if !self.throttle.admit(now) {
            return false;
        }
        pointer.retarget(target, now);
        trace!(x = target[0], y = target[1], "pointer target updated");
        true
    }

    pub fn detach<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let Some(listener) = self.listener.take() {
            host.remove_listener(listener);
            debug!(container = ?self.container, "pointer tracking detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    fn steps_to_converge(start: f32, target: f32, factor: f32, epsilon: f32) -> usize {
        let mut state = PointerState::new([start, start]);
        state.retarget([target, target], 0.0);
        let mut steps = 0;
        let mut previous_gap = (target - start).abs();
        while (state.current()[0] - target).abs() > epsilon {
            state.smooth(factor);
            let gap = (state.current()[0] - target).abs();
            assert!(gap <= previous_gap, "filter moved away from target");
            if target >= start {
                assert!(state.current()[0] <= target, "filter overshot");
            } else {
                assert!(state.current()[0] >= target, "filter overshot");
            }
            previous_gap = gap;
            steps += 1;
            assert!(steps < 10_000, "filter did not converge");
        }
        steps
    }

    #[test]
    fn smoothing_converges_without_overshoot() {
        let epsilon = 0.001_f32;
        let bound = ((epsilon.ln()) / (0.9_f32.ln())).ceil() as usize + 1;
        assert!(steps_to_converge(0.0, 1.0, 0.1, epsilon) <= bound);
        assert!(steps_to_converge(1.0, 0.0, 0.1, epsilon) <= bound);
        assert!(steps_to_converge(0.5, 0.25, 0.1, epsilon) <= bound);
    }

    #[test]
    fn normalizes_with_y_flip() {
        let rect = ContainerRect::new(100.0, 50.0, 800.0, 600.0);
        let point = normalize_pointer(PointerEvent::new(300.0, 500.0), rect).unwrap();
        assert_eq!(point, [0.25, 0.25]);
        assert_eq!(
            normalize_pointer(PointerEvent::new(0.0, 0.0), ContainerRect::sized(0.0, 10.0)),
            None
        );
        assert_eq!(
            normalize_pointer(
                PointerEvent::new(-50.0, 9000.0),
                ContainerRect::sized(100.0, 100.0)
            ),
            Some([0.0, 0.0])
        );
    }

    fn assert_close(actual: [f32; 2], expected: [f32; 2]) {
        for axis in 0..2 {
            assert!(
                (actual[axis] - expected[axis]).abs() < 1e-6,
                "{actual:?} != {expected:?}"
            );
        }
    }

    #[test]
    fn throttles_events_inside_window() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(100.0, 100.0));
        let mut tracker = InputTracker::attach(&mut host, id, &Tuning::default());
        let mut pointer = PointerState::default();

        assert!(tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(10.0, 10.0)));
        host.advance(10.0);
        assert!(!tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(90.0, 90.0)));
        assert_close(pointer.target(), [0.1, 0.9]);

        host.advance(50.0);
        assert!(tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(90.0, 90.0)));
        assert_close(pointer.target(), [0.9, 0.1]);
        assert_eq!(pointer.current(), [0.5, 0.5]);
    }

    #[test]
    fn dropped_zero_area_event_does_not_open_window() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(0.0, 0.0));
        let mut tracker = InputTracker::attach(&mut host, id, &Tuning::default());
        let mut pointer = PointerState::default();

        assert!(!tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(5.0, 5.0)));
        assert_eq!(pointer.target(), [0.5, 0.5]);

        host.set_container_rect(id, ContainerRect::sized(100.0, 100.0));
        host.advance(10.0);
        assert!(tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(25.0, 75.0)));
        assert_close(pointer.target(), [0.25, 0.25]);
    }

    #[test]
    fn detach_is_safe_twice() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(100.0, 100.0));
        let mut tracker = InputTracker::attach(&mut host, id, &Tuning::default());
        assert_eq!(host.active_listeners(), 1);
        tracker.detach(&mut host);
        tracker.detach(&mut host);
        assert_eq!(host.active_listeners(), 0);
        let mut pointer = PointerState::default();
        assert!(!tracker.on_pointer_move(&host, &mut pointer, PointerEvent::new(1.0, 1.0)));
    }
}
