//! Timing primitives shared by the render session.
//!
//! Everything here is host-agnostic: the host hands out opaque frame and timer
//! tokens, and the types in this crate decide what to do when those tokens
//! come back. Nothing blocks and nothing spawns threads.

mod animation;
mod frame_clock;
mod gate;

use std::time::Duration;

pub use animation::{AdmittedFrame, AnimationScheduler, FrameOutcome, SchedulerState};
pub use frame_clock::{FrameClock, DEFAULT_TARGET_FPS};
pub use gate::{Debouncer, Throttle};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("cannot start animation scheduler from the {0:?} state")]
    InvalidTransition(SchedulerState),
}

/// Handle for one pending animation-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// Handle for one pending one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

/// Host primitive that invokes a callback once, on the next display refresh.
pub trait FrameRequester {
    fn request_animation_frame(&mut self) -> FrameToken;
    fn cancel_animation_frame(&mut self, token: FrameToken);
}

/// Host primitive for one-shot timers.
pub trait TimerHost {
    fn set_timeout(&mut self, delay: Duration) -> TimerToken;
    fn clear_timeout(&mut self, token: TimerToken);
}
