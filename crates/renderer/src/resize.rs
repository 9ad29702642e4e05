use scheduler::{Debouncer, TimerToken};
use tracing::{debug, trace};

use crate::host::{ContainerId, Host, ListenerId, ListenerKind, ListenerTarget};
use crate::types::{ContainerRect, Tuning};
use crate::uniforms::Resolution;

/// Shader resolution for a container box: the scaled size plus its aspect.
pub fn compute_resolution(rect: ContainerRect, render_scale: f32) -> Resolution {
    Resolution::new(rect.width * render_scale, rect.height * render_scale)
}

/// Watches window resizes and reports the container box once they settle.
pub struct ResizeController {
    container: ContainerId,
    listener: Option<ListenerId>,
    debounce: Debouncer,
    render_scale: f32,
}

impl ResizeController {
    /// Registers the window resize listener and measures the container once,
    /// synchronously, so the first frame already has real dimensions.
    pub fn attach<H: Host + ?Sized>(
        host: &mut H,
        container: ContainerId,
        tuning: &Tuning,
    ) -> (Self, ContainerRect) {
        let listener = host.add_listener(ListenerTarget::Window, ListenerKind::Resize);
        let controller = Self {
            container,
            listener: Some(listener),
            debounce: Debouncer::new(tuning.resize_debounce),
            render_scale: tuning.render_scale,
        };
        let rect = host.container_rect(container);
        debug!(?container, width = rect.width, height = rect.height, "resize controller attached");
        (controller, rect)
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    pub fn has_pending_resize(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn resolution_for(&self, rect: ContainerRect) -> Resolution {
        compute_resolution(rect, self.render_scale)
    }

    /// Handles a raw resize event by (re)arming the quiet-period timer.
    pub fn on_resize_event<H: Host + ?Sized>(&mut self, host: &mut H) {
        if self.listener.is_none() {
            return;
        }
        let token = self.debounce.trigger(host);
        trace!(?token, "resize debounce armed");
    }

    /// Returns the settled container box when `token` is the armed timer.
    pub fn on_timer<H: Host + ?Sized>(
        &mut self,
        host: &H,
        token: TimerToken,
    ) -> Option<ContainerRect> {
        if !self.debounce.fire(token) {
            return None;
        }
        Some(host.container_rect(self.container))
    }

    /// Clears the pending timer and removes the listener. Idempotent.
    pub fn detach<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.debounce.cancel(host);
        if let Some(listener) = self.listener.take() {
            host.remove_listener(listener);
            debug!(container = ?self.container, "resize controller detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    #[test]
    fn computes_scaled_resolution() {
        let resolution = compute_resolution(ContainerRect::sized(800.0, 600.0), 0.5);
        assert_eq!(resolution.width(), 400.0);
        assert_eq!(resolution.height(), 300.0);
        assert!((resolution.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn resize_computation_is_idempotent() {
        let rect = ContainerRect::new(12.0, 40.0, 1280.0, 720.0);
        assert_eq!(compute_resolution(rect, 0.5), compute_resolution(rect, 0.5));
    }

    #[test]
    fn burst_of_events_fires_once_after_quiet_period() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(800.0, 600.0));
        let (mut controller, initial) = ResizeController::attach(&mut host, id, &Tuning::default());
        assert_eq!(initial.width, 800.0);

        host.set_container_rect(id, ContainerRect::sized(1024.0, 768.0));
        for _ in 0..5 {
            controller.on_resize_event(&mut host);
            host.advance(20.0);
        }
        assert_eq!(host.pending_timers(), 1);

        let fired = host.advance(100.0);
        assert_eq!(fired.len(), 1);
        let rect = controller.on_timer(&host, fired[0]).expect("settled resize");
        assert_eq!(rect.width, 1024.0);
        assert!(!controller.has_pending_resize());
    }

    #[test]
    fn detach_is_safe_without_any_resize() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(100.0, 100.0));
        let (mut controller, _) = ResizeController::attach(&mut host, id, &Tuning::default());
        controller.detach(&mut host);
        controller.detach(&mut host);
        assert_eq!(host.active_listeners(), 0);
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn detach_clears_pending_debounce() {
        let mut host = HeadlessHost::new();
        let id = host.add_container(ContainerRect::sized(100.0, 100.0));
        let (mut controller, _) = ResizeController::attach(&mut host, id, &Tuning::default());
        controller.on_resize_event(&mut host);
        controller.detach(&mut host);
        assert_eq!(host.pending_timers(), 0);
        controller.on_resize_event(&mut host);
        assert_eq!(host.pending_timers(), 0);
    }
}
