use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use scheduler::{FrameRequester, FrameToken, TimerHost, TimerToken};
use tracing::{debug, error, info, warn};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{GpuBackend, WgpuContextFactory};
use crate::host::{
    ContainerId, Host, HostError, ListenerId, ListenerKind, ListenerTarget, NodeId,
};
use crate::runtime::{DeadlineQueue, MonotonicClock, DEFAULT_REFRESH_HZ};
use crate::session::{Session, SessionError};
use crate::surface::SurfaceSize;
use crate::types::{ContainerRect, PointerEvent, SessionConfig};

/// The preview window's client area is the only container.
pub const PREVIEW_CONTAINER: ContainerId = ContainerId(1);

/// Produces a fresh configuration when the user asks for a reload.
pub type ConfigReloader = Box<dyn FnMut() -> Result<SessionConfig>>;

pub struct PreviewOptions {
    pub config: SessionConfig,
    /// Initial client size in logical pixels.
    pub size: (u32, u32),
    pub title: String,
    pub reload: Option<ConfigReloader>,
}

/// [`Host`] backed by a winit window and wall-clock deadlines.
struct WindowHost {
    window: Arc<Window>,
    clock: MonotonicClock,
    deadlines: DeadlineQueue,
    next_id: u64,
    listeners: BTreeMap<ListenerId, (ListenerTarget, ListenerKind)>,
    drawable: Option<NodeId>,
}

impl WindowHost {
    fn new(window: Arc<Window>, refresh_hz: f64) -> Self {
        Self {
            window,
            clock: MonotonicClock::new(),
            deadlines: DeadlineQueue::new(refresh_hz),
            next_id: 0,
            listeners: BTreeMap::new(),
            drawable: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_listener(&self, target: ListenerTarget, kind: ListenerKind) -> bool {
        self.listeners.values().any(|entry| *entry == (target, kind))
    }

    fn take_due_timers(&mut self) -> Vec<TimerToken> {
        let now = self.clock.now_ms();
        self.deadlines.take_due_timers(now)
    }

    fn take_due_frames(&mut self) -> Vec<(FrameToken, f64)> {
        let now = self.clock.now_ms();
        self.deadlines.take_due_frames(now)
    }

    fn frame_due(&self) -> bool {
        let now = self.clock.now_ms();
        self.deadlines
            .next_deadline()
            .is_some_and(|deadline| deadline <= now)
    }

    /// Converts a physical cursor position into client (logical) coordinates.
    fn pointer_event(&self, position: PhysicalPosition<f64>) -> PointerEvent {
        let logical = position.to_logical::<f64>(self.window.scale_factor());
        PointerEvent::new(logical.x as f32, logical.y as f32)
    }
}

impl FrameRequester for WindowHost {
    fn request_animation_frame(&mut self) -> FrameToken {
        let now = self.clock.now_ms();
        self.deadlines.request_frame(now)
    }

    fn cancel_animation_frame(&mut self, token: FrameToken) {
        self.deadlines.cancel_frame(token);
    }
}

impl TimerHost for WindowHost {
    fn set_timeout(&mut self, delay: Duration) -> TimerToken {
        let now = self.clock.now_ms();
        self.deadlines.set_timer(now, delay)
    }

    fn clear_timeout(&mut self, token: TimerToken) {
        self.deadlines.clear_timer(token);
    }
}

impl Host for WindowHost {
    fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn container_rect(&self, container: ContainerId) -> ContainerRect {
        if container != PREVIEW_CONTAINER {
            return ContainerRect::sized(0.0, 0.0);
        }
        let size = self
            .window
            .inner_size()
            .to_logical::<f64>(self.window.scale_factor());
        ContainerRect::sized(size.width as f32, size.height as f32)
    }

    fn add_listener(&mut self, target: ListenerTarget, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.insert(id, (target, kind));
        id
    }

    fn remove_listener(&mut self, listener: ListenerId) {
        self.listeners.remove(&listener);
    }

    fn append_drawable(
        &mut self,
        container: ContainerId,
        size: &SurfaceSize,
    ) -> Result<NodeId, HostError> {
        if container != PREVIEW_CONTAINER {
            return Err(HostError::UnknownContainer(container));
        }
        if self.drawable.is_some() {
            return Err(HostError::DrawableExists(container));
        }
        let node = NodeId(self.next_id());
        self.drawable = Some(node);
        debug!(
            backing_width = size.backing_width,
            backing_height = size.backing_height,
            "drawable attached to preview window"
        );
        Ok(node)
    }

    fn remove_drawable(&mut self, node: NodeId) {
        if self.drawable == Some(node) {
            self.drawable = None;
        }
    }

    fn set_container_attribute(&mut self, container: ContainerId, name: &str, value: &str) {
        if container == PREVIEW_CONTAINER && name == "title" {
            self.window.set_title(value);
        } else {
            debug!(
                ?container,
                name,
                value,
                "container attribute has no effect on the preview window"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    ToggleMouse,
    Reload,
}

fn key_action(event: &KeyEvent) -> Option<KeyAction> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    action_for_key(&event.logical_key)
}

fn action_for_key(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(value) => match value.as_str() {
            "q" | "Q" => Some(KeyAction::Quit),
            "m" | "M" => Some(KeyAction::ToggleMouse),
            "r" | "R" => Some(KeyAction::Reload),
            _ => None,
        },
        _ => None,
    }
}

struct Preview {
    host: WindowHost,
    factory: WgpuContextFactory,
    session: Option<Session<GpuBackend>>,
    config: SessionConfig,
    reload: Option<ConfigReloader>,
    failure: Option<anyhow::Error>,
}

impl Preview {
    fn switch_config(&mut self, config: SessionConfig) -> Result<()> {
        self.config = config.clone();
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.session = Some(session.reconfigure(&mut self.host, &mut self.factory, config)?);
        Ok(())
    }

    fn remount(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.teardown(&mut self.host);
        }
        let session = Session::mount(
            &mut self.host,
            &mut self.factory,
            PREVIEW_CONTAINER,
            self.config.clone(),
        )?;
        self.session = Some(session);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.teardown(&mut self.host);
        }
    }

    fn fail(&mut self, err: anyhow::Error, elwt: &EventLoopWindowTarget<()>) {
        error!("preview stopped: {err:#}");
        self.failure = Some(err);
        self.shutdown();
        elwt.exit();
    }

    fn handle_key(&mut self, action: KeyAction, elwt: &EventLoopWindowTarget<()>) {
        let result = match action {
            KeyAction::Quit => {
                self.shutdown();
                elwt.exit();
                return;
            }
            KeyAction::ToggleMouse => {
                let mut config = self.config.clone();
                config.mouse_reactive = !config.mouse_reactive;
                info!(mouse_reactive = config.mouse_reactive, "toggled pointer reactivity");
                self.switch_config(config)
            }
            KeyAction::Reload => match self.reload.as_mut() {
                Some(reload) => match reload() {
                    Ok(config) => {
                        info!("configuration reloaded");
                        self.switch_config(config)
                    }
                    Err(err) => {
                        warn!("failed to reload configuration: {err:#}");
                        Ok(())
                    }
                },
                None => {
                    debug!("no configuration source to reload");
                    Ok(())
                }
            },
        };
        if let Err(err) = result {
            self.fail(err, elwt);
        }
    }

    fn deliver_timers(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for token in self.host.take_due_timers() {
            session.on_timer(&mut self.host, token);
        }
    }

    fn deliver_frames(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut lost = false;
        for (token, timestamp_ms) in self.host.take_due_frames() {
            match session.on_animation_frame(&mut self.host, token, timestamp_ms) {
                Ok(_) => {}
                Err(SessionError::ContextLost) => lost = true,
                Err(err) => {
                    self.fail(err.into(), elwt);
                    return;
                }
            }
        }
        if lost {
            warn!("graphics context lost; remounting");
            if let Err(err) = self.remount() {
                self.fail(err, elwt);
            }
        }
    }

    fn schedule(&self, elwt: &EventLoopWindowTarget<()>) {
        if self.host.frame_due() {
            self.host.window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        } else if let Some(deadline) = self.host.deadlines.next_deadline() {
            elwt.set_control_flow(ControlFlow::WaitUntil(self.host.clock.instant_at(deadline)));
        } else {
            elwt.set_control_flow(ControlFlow::Wait);
        }
    }
}

/// Opens the preview window and renders into it until the user closes it.
pub fn run_preview(options: PreviewOptions) -> Result<()> {
    let PreviewOptions {
        config,
        size,
        title,
        reload,
    } = options;

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(size.0.max(1), size.1.max(1)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let refresh_hz = window
        .current_monitor()
        .and_then(|monitor| monitor.refresh_rate_millihertz())
        .map(|millihertz| f64::from(millihertz) / 1000.0)
        .unwrap_or(DEFAULT_REFRESH_HZ);
    info!(refresh_hz, "preview window opened");

    let mut host = WindowHost::new(Arc::clone(&window), refresh_hz);
    let mut factory = WgpuContextFactory::new(Arc::clone(&window));
    let session = Session::mount(&mut host, &mut factory, PREVIEW_CONTAINER, config.clone())?;

    let mut preview = Preview {
        host,
        factory,
        session: Some(session),
        config,
        reload,
        failure: None,
    };

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                preview.shutdown();
                elwt.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if preview
                    .host
                    .has_listener(ListenerTarget::Window, ListenerKind::Resize)
                {
                    if let Some(session) = preview.session.as_mut() {
                        session.on_window_resize(&mut preview.host);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let target = ListenerTarget::Container(PREVIEW_CONTAINER);
                if preview.host.has_listener(target, ListenerKind::PointerMove) {
                    let pointer = preview.host.pointer_event(position);
                    if let Some(session) = preview.session.as_mut() {
                        session.on_pointer_move(&preview.host, pointer);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(action) = key_action(&event) {
                    preview.handle_key(action, elwt);
                }
            }
            WindowEvent::RedrawRequested => preview.deliver_frames(elwt),
            _ => {}
        },
        Event::AboutToWait => {
            preview.deliver_timers();
            preview.schedule(elwt);
        }
        Event::LoopExiting => preview.shutdown(),
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match preview.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
