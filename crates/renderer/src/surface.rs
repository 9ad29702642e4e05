use tracing::debug;

use crate::backend::{ContextFactory, ContextOptions, GraphicsBackend};
use crate::host::{ContainerId, Host, NodeId};
use crate::session::SessionError;
use crate::types::{ContainerRect, Tuning};

/// Geometry of a drawable: the container box it is presented at, the scaled
/// logical size the shader sees, and the backing buffer in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub container_width: f32,
    pub container_height: f32,
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    pub backing_width: u32,
    pub backing_height: u32,
}

impl SurfaceSize {
    pub fn for_container(rect: ContainerRect, render_scale: f32, pixel_ratio: f32) -> Self {
        let container_width = rect.width.max(0.0);
        let container_height = rect.height.max(0.0);
        let width = container_width * render_scale;
        let height = container_height * render_scale;
        Self {
            container_width,
            container_height,
            width,
            height,
            pixel_ratio,
            backing_width: ((width * pixel_ratio).floor() as u32).max(1),
            backing_height: ((height * pixel_ratio).floor() as u32).max(1),
        }
    }
}

/// Caps the host's device pixel ratio to bound fill-rate cost.
pub fn clamp_pixel_ratio(device_pixel_ratio: f32, cap: f32) -> f32 {
    if !device_pixel_ratio.is_finite() || device_pixel_ratio <= 0.0 {
        return 1.0_f32.min(cap);
    }
    device_pixel_ratio.min(cap)
}

struct DrawableSurface<B> {
    node: NodeId,
    backend: B,
    size: SurfaceSize,
}

/// Owns the one drawable node and graphics context of a session.
pub struct RenderSurfaceManager<B> {
    container: ContainerId,
    render_scale: f32,
    pixel_ratio_cap: f32,
    surface: Option<DrawableSurface<B>>,
}

impl<B: GraphicsBackend> RenderSurfaceManager<B> {
    /// Appends a drawable to `container` and creates its context.
    ///
    /// If the context cannot be created the node is removed again before the
    /// error is returned, so a failed create leaves the container untouched.
    pub fn create<H, F>(
        host: &mut H,
        factory: &mut F,
        container: ContainerId,
        tuning: &Tuning,
    ) -> Result<Self, SessionError>
    where
        H: Host + ?Sized,
        F: ContextFactory<H, Backend = B> + ?Sized,
    {
        let pixel_ratio = clamp_pixel_ratio(host.device_pixel_ratio(), tuning.pixel_ratio_cap);
        let rect = host.container_rect(container);
        let size = SurfaceSize::for_container(rect, tuning.render_scale, pixel_ratio);
        let node = host.append_drawable(container, &size)?;

        let options = ContextOptions::background(size);
        let backend = match factory.create_context(host, node, &options) {
            Ok(backend) => backend,
            Err(err) => {
                host.remove_drawable(node);
                return Err(err.into());
            }
        };

        debug!(
            ?container,
            ?node,
            pixel_ratio,
            backing_width = size.backing_width,
            backing_height = size.backing_height,
            "drawable surface created"
        );

        Ok(Self {
            container,
            render_scale: tuning.render_scale,
            pixel_ratio_cap: tuning.pixel_ratio_cap,
            surface: Some(DrawableSurface {
                node,
                backend,
                size,
            }),
        })
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    pub fn node(&self) -> Option<NodeId> {
        self.surface.as_ref().map(|surface| surface.node)
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.surface.as_ref().map(|surface| surface.size)
    }

    pub fn backend(&self) -> Option<&B> {
        self.surface.as_ref().map(|surface| &surface.backend)
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.surface.as_mut().map(|surface| &mut surface.backend)
    }

    /// Recomputes the drawable size for a new container box and pixel ratio.
    pub fn resize<H: Host + ?Sized>(
        &mut self,
        host: &H,
        rect: ContainerRect,
    ) -> Option<SurfaceSize> {
        let pixel_ratio = clamp_pixel_ratio(host.device_pixel_ratio(), self.pixel_ratio_cap);
        let size = SurfaceSize::for_container(rect, self.render_scale, pixel_ratio);
        let surface = self.surface.as_mut()?;
        if surface.size != size {
            surface.backend.resize(&size);
            surface.size = size;
        }
        Some(size)
    }

    /// Releases the context, then detaches the node. Later calls do nothing.
    pub fn destroy<H: Host + ?Sized>(&mut self, host: &mut H) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        surface.backend.destroy();
        host.remove_drawable(surface.node);
        debug!(container = ?self.container, node = ?surface.node, "drawable surface destroyed");
    }
}
