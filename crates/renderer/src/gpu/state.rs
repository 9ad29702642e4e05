use std::sync::Arc;

use winit::window::Window;

use crate::backend::{
    BackendError, ContextFactory, ContextOptions, GraphicsBackend, ProgramHandle,
};
use crate::host::{Host, NodeId};
use crate::surface::SurfaceSize;
use crate::uniforms::Uniform;

use super::context::GpuContext;
use super::pipeline::{BlitPipeline, IridescencePipeline, OffscreenTarget};
use super::uniforms::IridescenceUniforms;

/// wgpu implementation of [`GraphicsBackend`] presenting into a winit window.
///
/// Programs render into an offscreen texture at the backing size of the
/// drawable; the result is then stretched over the whole swapchain.
pub struct GpuBackend {
    window: Arc<Window>,
    context: GpuContext,
    programs: Vec<IridescencePipeline>,
    uniforms: IridescenceUniforms,
    offscreen: OffscreenTarget,
    blit: BlitPipeline,
    blit_bind_group: wgpu::BindGroup,
    released: bool,
}

impl GpuBackend {
    pub fn new(window: Arc<Window>, options: &ContextOptions) -> anyhow::Result<Self> {
        let context = GpuContext::new(Arc::clone(&window), options.power_preference)?;
        if options.antialias {
            tracing::debug!("antialiasing requested; the offscreen target stays single-sampled");
        }

        let (width, height) =
            context.clamp_extent(options.size.backing_width, options.size.backing_height);
        let offscreen =
            OffscreenTarget::new(&context.device, context.surface_format, width, height);
        let blit = BlitPipeline::new(&context.device, context.surface_format);
        let blit_bind_group = blit.bind(&context.device, &offscreen);

        tracing::debug!(width, height, "offscreen target created");

        Ok(Self {
            window,
            context,
            programs: Vec::new(),
            uniforms: IridescenceUniforms::default(),
            offscreen,
            blit,
            blit_bind_group,
            released: false,
        })
    }

    fn program(&self, handle: ProgramHandle) -> Result<&IridescencePipeline, BackendError> {
        (handle.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.programs.get(index))
            .ok_or(BackendError::UnknownProgram(handle))
    }

    fn acquire_frame(&mut self) -> Result<Option<wgpu::SurfaceTexture>, BackendError> {
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.resize_swapchain(self.window.inner_size());
                tracing::debug!("swapchain reconfigured; frame skipped");
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::trace!("surface timeout; frame skipped");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.context.mark_lost();
                Err(BackendError::ContextLost)
            }
            Err(other) => {
                tracing::warn!(error = %other, "surface error; frame skipped");
                self.context.reconfigure();
                Ok(None)
            }
        }
    }
}

impl GraphicsBackend for GpuBackend {
    fn compile(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, BackendError> {
        if self.released {
            return Err(BackendError::ContextLost);
        }
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = IridescencePipeline::new(
            device,
            self.context.surface_format,
            vertex,
            fragment,
            self.uniforms.as_bytes(),
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Compile(err.to_string()));
        }
        self.programs.push(pipeline);
        Ok(ProgramHandle(self.programs.len() as u32))
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        uniform: Uniform,
    ) -> Result<(), BackendError> {
        self.program(program)?;
        self.uniforms.apply(uniform);
        Ok(())
    }

    fn resize(&mut self, size: &SurfaceSize) {
        if self.released {
            return;
        }
        self.context.resize_swapchain(self.window.inner_size());
        let (width, height) = self
            .context
            .clamp_extent(size.backing_width, size.backing_height);
        if (width, height) == (self.offscreen.width, self.offscreen.height) {
            return;
        }
        self.offscreen.texture.destroy();
        self.offscreen =
            OffscreenTarget::new(&self.context.device, self.context.surface_format, width, height);
        self.blit_bind_group = self.blit.bind(&self.context.device, &self.offscreen);
        tracing::debug!(width, height, "offscreen target resized");
    }

    fn draw(&mut self, program: ProgramHandle) -> Result<(), BackendError> {
        if self.released || self.context.is_lost() {
            return Err(BackendError::ContextLost);
        }
        self.program(program)?;
        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };
        let pipeline = self.program(program)?;
        let device = &self.context.device;
        let queue = &self.context.queue;

        queue.write_buffer(&pipeline.uniform_buffer, 0, self.uniforms.as_bytes());

        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("iridescence frame"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("iridescence pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &pipeline.bind_group, &[]);
            pass.set_vertex_buffer(0, pipeline.vertex_buffer.slice(..));
            pass.draw(0..3, 0..1);
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.blit.pipeline);
            pass.set_bind_group(0, &self.blit_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    fn is_context_lost(&self) -> bool {
        self.context.is_lost()
    }

    fn destroy(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.programs.clear();
        self.offscreen.texture.destroy();
        self.context.device.destroy();
        tracing::debug!("GPU device released");
    }
}

/// Creates [`GpuBackend`]s for the preview window. The window is the only
/// drawable, so the node handed out by the host is not consulted.
pub struct WgpuContextFactory {
    window: Arc<Window>,
}

impl WgpuContextFactory {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl<H: Host + ?Sized> ContextFactory<H> for WgpuContextFactory {
    type Backend = GpuBackend;

    fn create_context(
        &mut self,
        _host: &mut H,
        node: NodeId,
        options: &ContextOptions,
    ) -> Result<GpuBackend, BackendError> {
        GpuBackend::new(Arc::clone(&self.window), options).map_err(|err| {
            tracing::error!(node = node.0, "failed to create GPU context: {err:#}");
            BackendError::ContextUnavailable(format!("{err:#}"))
        })
    }
}
