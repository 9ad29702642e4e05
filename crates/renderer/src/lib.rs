//! Renderer crate for Iridescence, an animated shader background.
//!
//! A [`Session`] mounts one background into a host container and keeps it
//! alive until teardown. The host drives everything through tokens:
//!
//! ```text
//!   host loop ── frame token ──▶ Session::on_animation_frame ──▶ AnimationScheduler
//!       │                                                          │ admitted
//!       │                                                          ▼
//!       │                              smoothing ─▶ UniformState ─▶ GraphicsBackend::draw
//!       ├─ timer token ─▶ Session::on_timer ─▶ ResizeController ─▶ resolution + surface
//!       └─ pointer ─────▶ Session::on_pointer_move ─▶ InputTracker ─▶ pointer target
//! ```
//!
//! Two hosts ship with the crate: [`headless::HeadlessHost`], a manual-clock
//! host used by tests and simulations, and the winit preview window started
//! by [`run_preview`], which renders through the wgpu backend in [`gpu`].

pub mod backend;
pub mod gpu;
pub mod headless;
pub mod host;
mod input;
mod resize;
pub mod runtime;
mod session;
pub mod shader;
mod surface;
mod types;
mod uniforms;
mod window;

pub use backend::{
    BackendError, ContextFactory, ContextOptions, GraphicsBackend, PowerPreference, ProgramHandle,
};
pub use host::{ContainerId, Host, HostError, ListenerId, ListenerKind, ListenerTarget, NodeId};
pub use input::{normalize_pointer, InputTracker, PointerState};
pub use resize::{compute_resolution, ResizeController};
pub use session::{Session, SessionError};
pub use surface::{clamp_pixel_ratio, RenderSurfaceManager, SurfaceSize};
pub use types::{
    ContainerRect, PointerEvent, SessionConfig, Tuning, PIXEL_RATIO_CAP, POINTER_SMOOTHING,
    POINTER_THROTTLE, RENDER_SCALE, RESIZE_DEBOUNCE, TARGET_FPS,
};
pub use uniforms::{Resolution, Uniform, UniformState};
pub use window::{run_preview, ConfigReloader, PreviewOptions, PREVIEW_CONTAINER};

pub use scheduler::{FrameOutcome, FrameToken, SchedulerState, TimerToken};
