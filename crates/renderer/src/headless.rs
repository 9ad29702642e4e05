//! Deterministic host and backend.
//!
//! [`HeadlessHost`] runs on a manual clock: frames become due on refresh
//! boundaries, timers on their deadlines, and nothing happens until the
//! caller advances time or calls [`HeadlessHost::drive`]. [`RecordingBackend`]
//! keeps a log of everything the session asked the graphics layer to do.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use scheduler::{FrameOutcome, FrameRequester, FrameToken, TimerHost, TimerToken};
use tracing::trace;

use crate::backend::{
    BackendError, ContextFactory, ContextOptions, GraphicsBackend, ProgramHandle,
};
use crate::host::{
    ContainerId, Host, HostError, ListenerId, ListenerKind, ListenerTarget, NodeId,
};
use crate::runtime::{DeadlineQueue, DEFAULT_REFRESH_HZ};
use crate::session::{Session, SessionError};
use crate::surface::SurfaceSize;
use crate::types::ContainerRect;
use crate::uniforms::Uniform;

#[derive(Debug, Clone)]
struct Container {
    rect: ContainerRect,
    attributes: BTreeMap<String, String>,
    drawable: Option<NodeId>,
}

#[derive(Debug)]
pub struct HeadlessHost {
    now_ms: f64,
    device_pixel_ratio: f32,
    next_id: u64,
    deadlines: DeadlineQueue,
    containers: BTreeMap<ContainerId, Container>,
    listeners: BTreeMap<ListenerId, (ListenerTarget, ListenerKind)>,
    drawables: BTreeMap<NodeId, (ContainerId, SurfaceSize)>,
}

/// Counts of what [`HeadlessHost::drive`] delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveReport {
    pub callbacks: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub ignored: u64,
    pub timers_fired: u64,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            device_pixel_ratio: 1.0,
            next_id: 0,
            deadlines: DeadlineQueue::new(DEFAULT_REFRESH_HZ),
            containers: BTreeMap::new(),
            listeners: BTreeMap::new(),
            drawables: BTreeMap::new(),
        }
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Sets the simulated display refresh rate. Invalid rates fall back to 60 Hz.
    pub fn with_refresh_rate(mut self, hz: f64) -> Self {
        self.deadlines.set_refresh_rate(hz);
        self
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_container(&mut self, rect: ContainerRect) -> ContainerId {
        let id = ContainerId(self.next_id());
        self.containers.insert(
            id,
            Container {
                rect,
                attributes: BTreeMap::new(),
                drawable: None,
            },
        );
        id
    }

    /// Changes the box of a container. Resize listeners are not notified;
    /// the caller delivers the event to whoever owns them.
    pub fn set_container_rect(&mut self, container: ContainerId, rect: ContainerRect) {
        if let Some(entry) = self.containers.get_mut(&container) {
            entry.rect = rect;
        }
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = ratio;
    }

    pub fn set_now(&mut self, now_ms: f64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Moves the clock forward and returns the timers that came due, in
    /// deadline order. Frames stay pending until taken.
    pub fn advance(&mut self, delta_ms: f64) -> Vec<TimerToken> {
        self.now_ms += delta_ms.max(0.0);
        self.take_due_timers()
    }

    fn take_due_timers(&mut self) -> Vec<TimerToken> {
        self.deadlines.take_due_timers(self.now_ms)
    }

    /// Removes the frames due at the current time, with their timestamps.
    pub fn take_due_frames(&mut self) -> Vec<(FrameToken, f64)> {
        self.deadlines.take_due_frames(self.now_ms)
    }

    /// Removes the oldest pending frame regardless of when it is due.
    pub fn take_frame(&mut self) -> Option<FrameToken> {
        self.deadlines.take_oldest_frame()
    }

    pub fn pending_frames(&self) -> usize {
        self.deadlines.pending_frames()
    }

    pub fn pending_timers(&self) -> usize {
        self.deadlines.pending_timers()
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listener(&self, target: ListenerTarget, kind: ListenerKind) -> bool {
        self.listeners.values().any(|entry| *entry == (target, kind))
    }

    pub fn drawables_in(&self, container: ContainerId) -> usize {
        self.drawables
            .values()
            .filter(|(owner, _)| *owner == container)
            .count()
    }

    pub fn drawable_size(&self, container: ContainerId) -> Option<SurfaceSize> {
        self.drawables
            .values()
            .find(|(owner, _)| *owner == container)
            .map(|(_, size)| *size)
    }

    pub fn attribute(&self, container: ContainerId, name: &str) -> Option<&str> {
        self.containers
            .get(&container)?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    /// True when nothing is registered with the host any more.
    pub fn is_quiescent(&self) -> bool {
        self.deadlines.is_empty()
            && self.listeners.is_empty()
            && self.drawables.is_empty()
    }

    /// Delivers every timer and frame callback up to `until_ms` to `session`,
    /// in time order, then leaves the clock at `until_ms`.
    pub fn drive<B: GraphicsBackend>(
        &mut self,
        session: &mut Session<B>,
        until_ms: f64,
    ) -> Result<DriveReport, SessionError> {
        let mut report = DriveReport::default();
        loop {
            let Some(next) = self.deadlines.next_deadline() else {
                break;
            };
            if next > until_ms {
                break;
            }
            self.set_now(next);

            for token in self.take_due_timers() {
                report.timers_fired += 1;
                session.on_timer(self, token);
            }
            for (token, at) in self.take_due_frames() {
                report.callbacks += 1;
                match session.on_animation_frame(self, token, at)? {
                    FrameOutcome::Rendered => report.rendered += 1,
                    FrameOutcome::Skipped => report.skipped += 1,
                    FrameOutcome::Ignored => report.ignored += 1,
                }
            }
        }
        self.set_now(until_ms);
        Ok(report)
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRequester for HeadlessHost {
    fn request_animation_frame(&mut self) -> FrameToken {
        self.deadlines.request_frame(self.now_ms)
    }

    fn cancel_animation_frame(&mut self, token: FrameToken) {
        self.deadlines.cancel_frame(token);
    }
}

impl TimerHost for HeadlessHost {
    fn set_timeout(&mut self, delay: Duration) -> TimerToken {
        self.deadlines.set_timer(self.now_ms, delay)
    }

    fn clear_timeout(&mut self, token: TimerToken) {
        self.deadlines.clear_timer(token);
    }
}

impl Host for HeadlessHost {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn container_rect(&self, container: ContainerId) -> ContainerRect {
        self.containers
            .get(&container)
            .map(|entry| entry.rect)
            .unwrap_or(ContainerRect::sized(0.0, 0.0))
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
        let id = NodeId(self.next_id + 1);
        let entry = self
            .containers
            .get_mut(&container)
            .ok_or(HostError::UnknownContainer(container))?;
        if entry.drawable.is_some() {
            return Err(HostError::DrawableExists(container));
        }
        entry.drawable = Some(id);
        self.next_id += 1;
        self.drawables.insert(id, (container, *size));
        Ok(id)
    }

    fn remove_drawable(&mut self, node: NodeId) {
        let Some((container, _)) = self.drawables.remove(&node) else {
            return;
        };
        if let Some(entry) = self.containers.get_mut(&container) {
            if entry.drawable == Some(node) {
                entry.drawable = None;
            }
        }
    }

    fn set_container_attribute(&mut self, container: ContainerId, name: &str, value: &str) {
        if let Some(entry) = self.containers.get_mut(&container) {
            entry.attributes.insert(name.to_owned(), value.to_owned());
        }
    }
}

/// One recorded draw with the uniform values bound at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub uniforms: Vec<Uniform>,
}

impl DrawRecord {
    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.uniforms
            .iter()
            .copied()
            .find(|uniform| uniform.name() == name)
    }
}

/// Shared log of one recording context.
#[derive(Debug, Default)]
pub struct BackendLog {
    pub options: Option<ContextOptions>,
    pub programs: Vec<(String, String)>,
    pub uniform_writes: usize,
    pub draws: Vec<DrawRecord>,
    pub resizes: Vec<SurfaceSize>,
    pub destroyed: usize,
    pub context_lost: bool,
}

impl BackendLog {
    /// Simulates the platform dropping the context.
    pub fn lose_context(&mut self) {
        self.context_lost = true;
    }

    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }
}

pub struct RecordingBackend {
    log: Rc<RefCell<BackendLog>>,
    bound: BTreeMap<&'static str, Uniform>,
    fail_compile: bool,
    released: bool,
}

impl RecordingBackend {
    pub fn log(&self) -> Rc<RefCell<BackendLog>> {
        Rc::clone(&self.log)
    }

    fn check_program(&self, program: ProgramHandle) -> Result<(), BackendError> {
        let known = self.log.borrow().programs.len() as u32;
        if program.0 == 0 || program.0 > known {
            return Err(BackendError::UnknownProgram(program));
        }
        Ok(())
    }
}

impl GraphicsBackend for RecordingBackend {
    fn compile(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, BackendError> {
        if self.fail_compile {
            return Err(BackendError::Compile("injected compile failure".into()));
        }
        let mut log = self.log.borrow_mut();
        log.programs.push((vertex.to_owned(), fragment.to_owned()));
        Ok(ProgramHandle(log.programs.len() as u32))
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        uniform: Uniform,
    ) -> Result<(), BackendError> {
        self.check_program(program)?;
        self.bound.insert(uniform.name(), uniform);
        self.log.borrow_mut().uniform_writes += 1;
        Ok(())
    }

    fn resize(&mut self, size: &SurfaceSize) {
        self.log.borrow_mut().resizes.push(*size);
    }

    fn draw(&mut self, program: ProgramHandle) -> Result<(), BackendError> {
        if self.released || self.is_context_lost() {
            return Err(BackendError::ContextLost);
        }
        self.check_program(program)?;
        let record = DrawRecord {
            program,
            uniforms: self.bound.values().copied().collect(),
        };
        trace!(draws = self.log.borrow().draws.len() + 1, "recorded draw");
        self.log.borrow_mut().draws.push(record);
        Ok(())
    }

    fn is_context_lost(&self) -> bool {
        self.log.borrow().context_lost
    }

    fn destroy(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.log.borrow_mut().destroyed += 1;
    }
}

/// Hands out [`RecordingBackend`]s, optionally failing on purpose.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    fail_context: bool,
    fail_compile: bool,
    logs: Vec<Rc<RefCell<BackendLog>>>,
}

impl RecordingFactory {
    /// Every context request fails as if the platform had none to give.
    pub fn failing_context(mut self) -> Self {
        self.fail_context = true;
        self
    }

    /// Contexts are created but refuse to compile programs.
    pub fn failing_compile(mut self) -> Self {
        self.fail_compile = true;
        self
    }

    pub fn contexts_created(&self) -> usize {
        self.logs.len()
    }

    pub fn last_log(&self) -> Option<Rc<RefCell<BackendLog>>> {
        self.logs.last().cloned()
    }

    pub fn last_options(&self) -> Option<ContextOptions> {
        self.logs.last()?.borrow().options.clone()
    }
}

impl<H: Host + ?Sized> ContextFactory<H> for RecordingFactory {
    type Backend = RecordingBackend;

    fn create_context(
        &mut self,
        _host: &mut H,
        node: NodeId,
        options: &ContextOptions,
    ) -> Result<RecordingBackend, BackendError> {
        if self.fail_context {
            return Err(BackendError::ContextUnavailable(format!(
                "no context for node {}",
                node.0
            )));
        }
        let log = Rc::new(RefCell::new(BackendLog {
            options: Some(options.clone()),
            ..BackendLog::default()
        }));
        self.logs.push(Rc::clone(&log));
        Ok(RecordingBackend {
            log,
            bound: BTreeMap::new(),
            fail_compile: self.fail_compile,
            released: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_become_due_on_refresh_boundaries() {
        let mut host = HeadlessHost::new().with_refresh_rate(50.0);
        let token = host.request_animation_frame();
        assert!(host.take_due_frames().is_empty());
        host.advance(20.0);
        assert_eq!(host.take_due_frames(), vec![(token, 20.0)]);

        let next = host.request_animation_frame();
        host.advance(19.0);
        assert!(host.take_due_frames().is_empty());
        host.advance(1.0);
        assert_eq!(host.take_due_frames(), vec![(next, 40.0)]);
    }

    #[test]
    fn one_drawable_per_container() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(10.0, 10.0));
        let size = SurfaceSize::for_container(ContainerRect::sized(10.0, 10.0), 0.5, 1.0);
        let node = host.append_drawable(id, &size).expect("first drawable");
        assert_eq!(
            host.append_drawable(id, &size),
            Err(HostError::DrawableExists(id))
        );
        host.remove_drawable(node);
        assert!(host.append_drawable(id, &size).is_ok());
        assert_eq!(
            host.append_drawable(ContainerId(999), &size),
            Err(HostError::UnknownContainer(ContainerId(999)))
        );
    }

    #[test]
    fn recording_backend_rejects_unknown_programs() {
        let mut host = HeadlessHost::new();
        let mut factory = RecordingFactory::default();
        let size = SurfaceSize::for_container(ContainerRect::sized(10.0, 10.0), 0.5, 1.0);
        let mut backend = factory
            .create_context(&mut host, NodeId(1), &ContextOptions::background(size))
            .expect("context");
        assert!(matches!(
            backend.draw(ProgramHandle(7)),
            Err(BackendError::UnknownProgram(ProgramHandle(7)))
        ));
        let program = backend.compile("v", "f").expect("compile");
        backend.set_uniform(program, Uniform::Time(1.5)).expect("uniform");
        backend.draw(program).expect("draw");
        let log = backend.log();
        let log = log.borrow();
        assert_eq!(
            log.last_draw().and_then(|draw| draw.uniform("uTime")),
            Some(Uniform::Time(1.5))
        );
    }
}
