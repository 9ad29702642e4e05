use std::collections::BTreeMap;
use std::time::Duration;

/// Fraction of the container size the shader is evaluated at.
pub const RENDER_SCALE: f32 = 0.5;
/// Upper bound applied to the host's device pixel ratio.
pub const PIXEL_RATIO_CAP: f32 = 1.5;
pub const TARGET_FPS: f32 = 30.0;
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);
pub const POINTER_THROTTLE: Duration = Duration::from_millis(50);
/// Per-frame factor of the exponential pointer filter.
pub const POINTER_SMOOTHING: f32 = 0.1;

/// Box of the host container in host (CSS-like, logical) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect anchored at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Raw pointer sample in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub client_x: f32,
    pub client_y: f32,
}

impl PointerEvent {
    pub fn new(client_x: f32, client_y: f32) -> Self {
        Self { client_x, client_y }
    }
}

/// Scheduling and scaling knobs of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Frames admitted per second; `0` renders on every callback.
    pub target_fps: f32,
    pub render_scale: f32,
    pub pixel_ratio_cap: f32,
    pub resize_debounce: Duration,
    pub pointer_throttle: Duration,
    pub pointer_smoothing: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            target_fps: TARGET_FPS,
            render_scale: RENDER_SCALE,
            pixel_ratio_cap: PIXEL_RATIO_CAP,
            resize_debounce: RESIZE_DEBOUNCE,
            pointer_throttle: POINTER_THROTTLE,
            pointer_smoothing: POINTER_SMOOTHING,
        }
    }
}

/// Options a session is mounted with.
///
/// Any change to the appearance fields or the tuning rebuilds the whole
/// session; `attributes` are forwarded to the container untouched and can be
/// re-applied in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub color: [f32; 3],
    pub speed: f32,
    pub amplitude: f32,
    pub mouse_reactive: bool,
    pub attributes: BTreeMap<String, String>,
    pub tuning: Tuning,
}

impl SessionConfig {
    /// True when switching to `other` requires a fresh session.
    pub fn requires_remount(&self, other: &SessionConfig) -> bool {
        self.color != other.color
            || self.speed != other.speed
            || self.amplitude != other.amplitude
            || self.mouse_reactive != other.mouse_reactive
            || self.tuning != other.tuning
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            speed: 1.0,
            amplitude: 0.1,
            mouse_reactive: true,
            attributes: BTreeMap::new(),
            tuning: Tuning::default(),
        }
    }
}
