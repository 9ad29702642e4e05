//! Capability interface between the session and a graphics API.
//!
//! The session only ever sees [`GraphicsBackend`]: compile a program, set its
//! uniforms, draw, and release everything. Concrete adapters (`gpu` for wgpu,
//! `headless` for tests) are created through a [`ContextFactory`] tied to the
//! host they render into.

use crate::host::{Host, NodeId};
use crate::surface::SurfaceSize;
use crate::uniforms::Uniform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    LowPower,
    HighPerformance,
}

/// Context attributes requested when a drawable surface is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub antialias: bool,
    pub power_preference: PowerPreference,
    pub size: SurfaceSize,
}

impl ContextOptions {
    /// The attributes a decorative background asks for: no MSAA, low power.
    pub fn background(size: SurfaceSize) -> Self {
        Self {
            antialias: false,
            power_preference: PowerPreference::LowPower,
            size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("shader program failed to compile: {0}")]
    Compile(String),
    #[error("unknown shader program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("graphics context lost")]
    ContextLost,
}

pub trait GraphicsBackend {
    fn compile(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, BackendError>;

    fn set_uniform(&mut self, program: ProgramHandle, uniform: Uniform)
        -> Result<(), BackendError>;

    /// Resizes the backing buffer of the drawable.
    fn resize(&mut self, size: &SurfaceSize);

    fn draw(&mut self, program: ProgramHandle) -> Result<(), BackendError>;

    fn is_context_lost(&self) -> bool;

    /// Releases the context and its GPU memory now. Safe to call repeatedly.
    fn destroy(&mut self);
}

pub trait ContextFactory<H: Host + ?Sized> {
    type Backend: GraphicsBackend;

    fn create_context(
        &mut self,
        host: &mut H,
        node: NodeId,
        options: &ContextOptions,
    ) -> Result<Self::Backend, BackendError>;
}
