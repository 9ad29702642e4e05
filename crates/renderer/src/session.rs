//! Composition root of one mounted background.
//!
//! A [`Session`] owns every resource it acquires from the host: the drawable
//! and its context, the window resize listener with its debounce timer, the
//! pending animation frame and, when the pointer is tracked, the container
//! pointer listener. Mount acquires them in that order and [`Session::teardown`]
//! releases them in reverse.

use scheduler::{
    AnimationScheduler, FrameClock, FrameOutcome, FrameToken, SchedulerError, SchedulerState,
    TimerToken,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, ContextFactory, GraphicsBackend, ProgramHandle};
use crate::host::{ContainerId, Host, HostError};
use crate::input::{InputTracker, PointerState};
use crate::resize::ResizeController;
use crate::shader::{FRAGMENT_SHADER, VERTEX_SHADER};
use crate::surface::{RenderSurfaceManager, SurfaceSize};
use crate::types::{ContainerRect, PointerEvent, SessionConfig};
use crate::uniforms::UniformState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Backend(BackendError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("graphics context lost while rendering")]
    ContextLost,
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ContextLost => SessionError::ContextLost,
            other => SessionError::Backend(other),
        }
    }
}

pub struct Session<B> {
    container: ContainerId,
    config: SessionConfig,
    surface: RenderSurfaceManager<B>,
    program: ProgramHandle,
    uniforms: UniformState,
    pointer: PointerState,
    scheduler: AnimationScheduler,
    resize: ResizeController,
    input: Option<InputTracker>,
    torn_down: bool,
}

impl<B: GraphicsBackend> Session<B> {
    /// Mounts a background into `container`.
    ///
    /// Either every resource is acquired or none is: on failure whatever was
    /// already attached is released before the error is returned.
    pub fn mount<H, F>(
        host: &mut H,
        factory: &mut F,
        container: ContainerId,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        H: Host + ?Sized,
        F: ContextFactory<H, Backend = B> + ?Sized,
    {
        apply_attributes(host, container, &config);

        let tuning = config.tuning;
        let mut surface = RenderSurfaceManager::create(host, factory, container, &tuning)?;
        let program = match compile_program(&mut surface) {
            Ok(program) => program,
            Err(err) => {
                surface.destroy(host);
                return Err(err);
            }
        };

        let mut uniforms = UniformState::from_config(&config);
        let (mut resize, rect) = ResizeController::attach(host, container, &tuning);
        let resolution = resize.resolution_for(rect);
        uniforms.set_resolution(resolution.width(), resolution.height());
        surface.resize(host, rect);

        let mut scheduler = AnimationScheduler::new(FrameClock::new(f64::from(tuning.target_fps)));
        if let Err(err) = scheduler.start(host) {
            resize.detach(host);
            surface.destroy(host);
            return Err(err.into());
        }

        let input = config
            .mouse_reactive
            .then(|| InputTracker::attach(host, container, &tuning));

        info!(
            ?container,
            width = resolution.width(),
            height = resolution.height(),
            fps = tuning.target_fps,
            mouse_reactive = config.mouse_reactive,
            "background mounted"
        );

        Ok(Self {
            container,
            config,
            surface,
            program,
            uniforms,
            pointer: PointerState::default(),
            scheduler,
            resize,
            input,
            torn_down: false,
        })
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn uniforms(&self) -> &UniformState {
        &self.uniforms
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn admitted_frames(&self) -> u64 {
        self.scheduler.admitted_frames()
    }

    pub fn skipped_frames(&self) -> u64 {
        self.scheduler.skipped_frames()
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.surface.size()
    }

    pub fn backend(&self) -> Option<&B> {
        self.surface.backend()
    }

    pub fn is_tracking_pointer(&self) -> bool {
        self.input.as_ref().is_some_and(InputTracker::is_attached)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Animation-frame callback. Admitted frames run the smoothing step,
    /// write pointer and time, push every uniform and draw once.
    pub fn on_animation_frame<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        token: FrameToken,
        timestamp_ms: f64,
    ) -> Result<FrameOutcome, SessionError> {
        let Self {
            config,
            surface,
            program,
            uniforms,
            pointer,
            scheduler,
            ..
        } = self;
        let smoothing = config.tuning.pointer_smoothing;
        let program = *program;

        let result = scheduler.on_frame(host, token, timestamp_ms, |frame| {
            pointer.smooth(smoothing);
            uniforms.set_pointer(pointer.current());
            uniforms.set_time(frame.seconds());
            draw_frame(surface, program, uniforms)
        });

        if let Err(SessionError::ContextLost) = &result {
            warn!(container = ?self.container, "graphics context lost; animation stopped");
        }
        result
    }

    /// Timer callback. Returns true when it completed a debounced resize.
    pub fn on_timer<H: Host + ?Sized>(&mut self, host: &mut H, token: TimerToken) -> bool {
        let Some(rect) = self.resize.on_timer(host, token) else {
            return false;
        };
        self.apply_resize(host, rect);
        true
    }

    pub fn on_window_resize<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.resize.on_resize_event(host);
    }

    /// Pointer-move callback. Returns true when the pointer target moved.
    pub fn on_pointer_move<H: Host + ?Sized>(&mut self, host: &H, event: PointerEvent) -> bool {
        match self.input.as_mut() {
            Some(input) => input.on_pointer_move(host, &mut self.pointer, event),
            None => false,
        }
    }

    fn apply_resize<H: Host + ?Sized>(&mut self, host: &H, rect: ContainerRect) {
        let resolution = self.resize.resolution_for(rect);
        self.uniforms
            .set_resolution(resolution.width(), resolution.height());
        let size = self.surface.resize(host, rect);
        debug!(
            container = ?self.container,
            width = resolution.width(),
            height = resolution.height(),
            backing = ?size.map(|size| (size.backing_width, size.backing_height)),
            "surface resized"
        );
    }

    /// Releases everything mount acquired. Safe to call more than once.
    pub fn teardown<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.torn_down {
            return;
        }
        if let Some(input) = self.input.as_mut() {
            input.detach(host);
        }
        self.scheduler.stop(host);
        self.resize.detach(host);
        self.surface.destroy(host);
        self.torn_down = true;
        info!(
            container = ?self.container,
            frames = self.scheduler.admitted_frames(),
            "background unmounted"
        );
    }

    /// Switches to `config`.
    ///
    /// Unchanged options keep the session. A change limited to pass-through
    /// attributes re-applies them in place. Anything else tears this session
    /// down and mounts a fresh one into the same container.
    pub fn reconfigure<H, F>(
        mut self,
        host: &mut H,
        factory: &mut F,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        H: Host + ?Sized,
        F: ContextFactory<H, Backend = B> + ?Sized,
    {
        if self.config == config && !self.torn_down {
            return Ok(self);
        }
        if !self.torn_down && !self.config.requires_remount(&config) {
            apply_attributes(host, self.container, &config);
            self.config = config;
            debug!(container = ?self.container, "attributes re-applied");
            return Ok(self);
        }

        self.teardown(host);
        Session::mount(host, factory, self.container, config)
    }
}

impl<B> Drop for Session<B> {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!(
                container = ?self.container,
                "session dropped without teardown; host registrations leaked"
            );
        }
    }
}

fn apply_attributes<H: Host + ?Sized>(
    host: &mut H,
    container: ContainerId,
    config: &SessionConfig,
) {
    for (name, value) in &config.attributes {
        host.set_container_attribute(container, name, value);
    }
}

fn compile_program<B: GraphicsBackend>(
    surface: &mut RenderSurfaceManager<B>,
) -> Result<ProgramHandle, SessionError> {
    let backend = surface.backend_mut().ok_or(SessionError::ContextLost)?;
    Ok(backend.compile(VERTEX_SHADER, FRAGMENT_SHADER)?)
}

fn draw_frame<B: GraphicsBackend>(
    surface: &mut RenderSurfaceManager<B>,
    program: ProgramHandle,
    uniforms: &UniformState,
) -> Result<(), SessionError> {
    let backend = surface.backend_mut().ok_or(SessionError::ContextLost)?;
    if backend.is_context_lost() {
        return Err(SessionError::ContextLost);
    }
    for uniform in uniforms.uniforms() {
        backend.set_uniform(program, uniform)?;
    }
    backend.draw(program)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, RecordingFactory};

    fn mounted(
        config: SessionConfig,
    ) -> (HeadlessHost, RecordingFactory, ContainerId, Session<crate::headless::RecordingBackend>) {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(800.0, 600.0));
        let mut factory = RecordingFactory::default();
        let session = Session::mount(&mut host, &mut factory, id, config).expect("mount");
        (host, factory, id, session)
    }

    #[test]
    fn mount_writes_initial_resolution() {
        let (mut host, _factory, _id, mut session) = mounted(SessionConfig::default());
        let resolution = session.uniforms().resolution();
        assert_eq!((resolution.width(), resolution.height()), (400.0, 300.0));
        assert_eq!(session.scheduler_state(), SchedulerState::Running);
        assert_eq!(host.pending_frames(), 1);
        assert_eq!(host.active_listeners(), 2);
        session.teardown(&mut host);
    }

    #[test]
    fn static_sessions_skip_pointer_listener() {
        let config = SessionConfig {
            mouse_reactive: false,
            ..SessionConfig::default()
        };
        let (mut host, _factory, _id, mut session) = mounted(config);
        assert!(!session.is_tracking_pointer());
        assert_eq!(host.active_listeners(), 1);
        assert!(!session.on_pointer_move(&host, PointerEvent::new(10.0, 10.0)));
        session.teardown(&mut host);
        assert!(host.is_quiescent());
    }

    #[test]
    fn compile_failure_releases_surface() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(800.0, 600.0));
        let mut factory = RecordingFactory::default().failing_compile();
        let result = Session::mount(&mut host, &mut factory, id, SessionConfig::default());
        assert!(matches!(
            result,
            Err(SessionError::Backend(BackendError::Compile(_)))
        ));
        assert_eq!(host.drawables_in(id), 0);
        assert!(host.is_quiescent());
        let log = factory.last_log().expect("context was created");
        assert_eq!(log.borrow().destroyed, 1);
    }

    #[test]
    fn attribute_only_change_keeps_session() {
        let (mut host, mut factory, id, session) = mounted(SessionConfig::default());
        let mut config = session.config().clone();
        config.attributes.insert("role".into(), "presentation".into());
        let mut session = session
            .reconfigure(&mut host, &mut factory, config)
            .expect("reconfigure");
        assert_eq!(factory.contexts_created(), 1);
        assert_eq!(host.attribute(id, "role"), Some("presentation"));
        session.teardown(&mut host);
    }
}
