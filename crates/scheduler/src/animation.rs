use crate::{FrameClock, FrameRequester, FrameToken, SchedulerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// Terminal. A stopped scheduler is never resumed; build a new one.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Callback did not belong to this scheduler (stale token or not running).
    Ignored,
    /// Callback arrived inside the current frame interval; nothing was drawn.
    Skipped,
    Rendered,
}

/// Information handed to the frame body of an admitted callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmittedFrame {
    pub timestamp_ms: f64,
    pub index: u64,
}

impl AdmittedFrame {
    pub fn seconds(&self) -> f32 {
        (self.timestamp_ms / 1000.0) as f32
    }
}

/// Cooperative render loop over a host's animation-frame primitive.
///
/// The scheduler owns at most one pending frame token. Each callback either
/// gets skipped by the [`FrameClock`] or runs the frame body; in both cases the
/// next callback is requested before control returns to the host.
#[derive(Debug)]
pub struct AnimationScheduler {
    state: SchedulerState,
    clock: FrameClock,
    pending: Option<FrameToken>,
    admitted: u64,
    skipped: u64,
}

impl AnimationScheduler {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            state: SchedulerState::Idle,
            clock,
            pending: None,
            admitted: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn admitted_frames(&self) -> u64 {
        self.admitted
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn start<R: FrameRequester + ?Sized>(
        &mut self,
        host: &mut R,
    ) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::InvalidTransition(self.state));
        }
        self.state = SchedulerState::Running;
        self.pending = Some(host.request_animation_frame());
        tracing::debug!(
            interval_ms = self.clock.frame_interval_ms(),
            "animation scheduler started"
        );
        Ok(())
    }

    /// Handles one animation callback.
    ///
    /// `render` runs only for admitted frames. When it fails the scheduler
    /// stops without requesting another callback and the error is returned.
    pub fn on_frame<R, F, E>(
        &mut self,
        host: &mut R,
        token: FrameToken,
        timestamp_ms: f64,
        render: F,
    ) -> Result<FrameOutcome, E>
    where
        R: FrameRequester + ?Sized,
        F: FnOnce(AdmittedFrame) -> Result<(), E>,
    {
        if self.state != SchedulerState::Running || self.pending != Some(token) {
            return Ok(FrameOutcome::Ignored);
        }
        self.pending = None;

        if !self.clock.admit(timestamp_ms) {
            self.skipped += 1;
            self.pending = Some(host.request_animation_frame());
            return Ok(FrameOutcome::Skipped);
        }

        let frame = AdmittedFrame {
            timestamp_ms,
            index: self.admitted,
        };
        self.admitted += 1;
        if let Err(err) = render(frame) {
            self.state = SchedulerState::Stopped;
            tracing::debug!(frame = frame.index, "frame body failed; scheduler stopped");
            return Err(err);
        }

        self.pending = Some(host.request_animation_frame());
        tracing::trace!(frame = frame.index, timestamp_ms, "frame rendered");
        Ok(FrameOutcome::Rendered)
    }

    /// Cancels the pending callback. Calling it again, or on a scheduler that
    /// never started, does nothing beyond marking it stopped.
    pub fn stop<R: FrameRequester + ?Sized>(&mut self, host: &mut R) {
        if let Some(token) = self.pending.take() {
            host.cancel_animation_frame(token);
        }
        if self.state != SchedulerState::Stopped {
            tracing::debug!(
                admitted = self.admitted,
                skipped = self.skipped,
                "animation scheduler stopped"
            );
        }
        self.state = SchedulerState::Stopped;
    }
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new(FrameClock::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[derive(Default)]
    struct FakeFrames {
        next: u64,
        outstanding: BTreeSet<FrameToken>,
        cancelled: usize,
    }

    impl FrameRequester for FakeFrames {
        fn request_animation_frame(&mut self) -> FrameToken {
            self.next += 1;
            let token = FrameToken(self.next);
            self.outstanding.insert(token);
            token
        }

        fn cancel_animation_frame(&mut self, token: FrameToken) {
            if self.outstanding.remove(&token) {
                self.cancelled += 1;
            }
        }
    }

    impl FakeFrames {
        fn fire(&mut self) -> FrameToken {
            let token = *self.outstanding.iter().next().expect("pending frame");
            self.outstanding.remove(&token);
            token
        }
    }

    fn ok(_: AdmittedFrame) -> Result<(), ()> {
        Ok(())
    }

    #[test]
    fn start_requests_first_frame() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::new(FrameClock::new(30.0));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.start(&mut host).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(host.outstanding.len(), 1);
    }

    #[test]
    fn skipped_and_rendered_frames_both_reschedule() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::new(FrameClock::with_interval(33.33));
        scheduler.start(&mut host).unwrap();

        let mut outcomes = Vec::new();
        for t in [0.0, 10.0, 20.0, 30.0, 40.0] {
            let token = host.fire();
            outcomes.push(scheduler.on_frame(&mut host, token, t, ok).unwrap());
            assert_eq!(host.outstanding.len(), 1);
        }
        assert_eq!(
            outcomes,
            vec![
                FrameOutcome::Rendered,
                FrameOutcome::Skipped,
                FrameOutcome::Skipped,
                FrameOutcome::Skipped,
                FrameOutcome::Rendered,
            ]
        );
        assert_eq!(scheduler.admitted_frames(), 2);
        assert_eq!(scheduler.skipped_frames(), 3);
    }

    #[test]
    fn stale_tokens_are_ignored() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::default();
        scheduler.start(&mut host).unwrap();
        let outcome = scheduler
            .on_frame(&mut host, FrameToken(999), 0.0, ok)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Ignored);
        assert_eq!(scheduler.admitted_frames(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_cancels_pending() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::default();
        scheduler.start(&mut host).unwrap();
        scheduler.stop(&mut host);
        scheduler.stop(&mut host);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(host.outstanding.is_empty());
        assert_eq!(host.cancelled, 1);
    }

    #[test]
    fn stopped_scheduler_cannot_restart() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::default();
        scheduler.start(&mut host).unwrap();
        scheduler.stop(&mut host);
        let err = scheduler.start(&mut host).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidTransition(SchedulerState::Stopped));
        assert!(host.outstanding.is_empty());
    }

    #[test]
    fn failing_frame_body_stops_without_rescheduling() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::default();
        scheduler.start(&mut host).unwrap();
        let token = host.fire();
        let result = scheduler.on_frame(&mut host, token, 0.0, |_| Err("lost"));
        assert_eq!(result, Err("lost"));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(host.outstanding.is_empty());
        assert_eq!(scheduler.pending(), None);
    }

    #[test]
    fn frame_body_sees_seconds() {
        let mut host = FakeFrames::default();
        let mut scheduler = AnimationScheduler::default();
        scheduler.start(&mut host).unwrap();
        let token = host.fire();
        let mut seen = None;
        scheduler
            .on_frame(&mut host, token, 1000.0, |frame| {
                seen = Some(frame.seconds());
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(seen, Some(1.0));
    }
}
