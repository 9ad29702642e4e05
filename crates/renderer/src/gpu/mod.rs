//! wgpu backend for the preview window.
//!
//! - `context` owns the wgpu instance, device and swapchain and turns device
//!   loss into a flag the session can poll.
//! - `pipeline` builds the iridescence program from GLSL, the offscreen target
//!   it renders into and the blit that stretches it over the window.
//! - `uniforms` mirrors the std140 parameter block.
//! - `state` glues these together behind [`crate::backend::GraphicsBackend`].

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use state::{GpuBackend, WgpuContextFactory};
