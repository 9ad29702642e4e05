pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Decides which animation callbacks become rendered frames.
///
/// Admission keeps the phase of the frame grid: after admitting a callback
/// the reference point is moved back by the overshoot (`elapsed mod
/// interval`), so late callbacks do not push every later frame back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    last_admitted_ms: Option<f64>,
    frame_interval_ms: f64,
}

fn normalize_fps(fps: f64) -> Option<f64> {
    if fps.is_finite() && fps > 0.0 {
        Some(fps)
    } else {
        None
    }
}

impl FrameClock {
    /// A clock admitting at most `target_fps` frames per second. Zero,
    /// negative or non-finite rates mean uncapped.
    pub fn new(target_fps: f64) -> Self {
        let frame_interval_ms = normalize_fps(target_fps)
            .map(|fps| 1000.0 / fps)
            .unwrap_or(0.0);
        Self::with_interval(frame_interval_ms)
    }

    pub fn with_interval(frame_interval_ms: f64) -> Self {
        Self {
            last_admitted_ms: None,
            frame_interval_ms: frame_interval_ms.max(0.0),
        }
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    pub fn last_admitted_ms(&self) -> Option<f64> {
        self.last_admitted_ms
    }

    pub fn is_uncapped(&self) -> bool {
        self.frame_interval_ms <= 0.0
    }

    /// Returns true when the callback at `timestamp_ms` should render.
    pub fn admit(&mut self, timestamp_ms: f64) -> bool {
        let Some(last) = self.last_admitted_ms else {
            self.last_admitted_ms = Some(timestamp_ms);
            return true;
        };

        if self.is_uncapped() {
            self.last_admitted_ms = Some(timestamp_ms.max(last));
            return true;
        }

        let elapsed = timestamp_ms - last;
        if elapsed < self.frame_interval_ms {
            return false;
        }

        self.last_admitted_ms = Some(timestamp_ms - elapsed % self.frame_interval_ms);
        true
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FPS)
    }
}
