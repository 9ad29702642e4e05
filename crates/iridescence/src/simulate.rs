use std::fmt;

use anyhow::{ensure, Context, Result};
use renderer::headless::{HeadlessHost, RecordingFactory};
use renderer::{ContainerRect, Session, SessionConfig};

pub const DEFAULT_CONTAINER_SIZE: (u32, u32) = (800, 600);

/// What a headless run rendered, and the uniform values of the last draw.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub seconds: f64,
    pub refresh_hz: f64,
    pub target_fps: f32,
    pub callbacks: u64,
    pub admitted: u64,
    pub skipped: u64,
    pub draws: usize,
    pub time: f32,
    pub resolution: [f32; 3],
    pub pointer: [f32; 2],
    pub color: [f32; 3],
}

/// Mounts a session into a headless container, drives it for `seconds` of
/// simulated time and tears it down again.
pub fn run_simulation(
    config: SessionConfig,
    size: (u32, u32),
    seconds: f64,
    refresh_hz: f64,
) -> Result<SimulationReport> {
    let mut host = HeadlessHost::new().with_refresh_rate(refresh_hz);
    let container = host.add_container(ContainerRect::sized(size.0 as f32, size.1 as f32));
    let mut factory = RecordingFactory::default();
    let target_fps = config.tuning.target_fps;

    let mut session =
        Session::mount(&mut host, &mut factory, container, config).context("mount failed")?;
    let drive = host.drive(&mut session, seconds * 1000.0);
    let uniforms = session.uniforms().clone();
    let admitted = session.admitted_frames();
    session.teardown(&mut host);
    let drive = drive.context("simulation stopped early")?;

    ensure!(
        host.is_quiescent(),
        "session left listeners, timers or drawables behind"
    );

    let draws = factory
        .last_log()
        .map(|log| log.borrow().draws.len())
        .unwrap_or_default();

    tracing::debug!(
        callbacks = drive.callbacks,
        rendered = drive.rendered,
        timers = drive.timers_fired,
        "simulation finished"
    );

    Ok(SimulationReport {
        seconds,
        refresh_hz,
        target_fps,
        callbacks: drive.callbacks,
        admitted,
        skipped: drive.skipped,
        draws,
        time: uniforms.time(),
        resolution: uniforms.resolution().as_vec3(),
        pointer: uniforms.pointer(),
        color: uniforms.base_color(),
    })
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulated {:.3}s at {} Hz (target {} fps)",
            self.seconds, self.refresh_hz, self.target_fps
        )?;
        writeln!(f, "  frame callbacks: {}", self.callbacks)?;
        writeln!(f, "  admitted frames: {}", self.admitted)?;
        writeln!(f, "  skipped frames:  {}", self.skipped)?;
        writeln!(f, "  draw calls:      {}", self.draws)?;
        writeln!(f, "Final uniforms:")?;
        writeln!(f, "  uTime       = {:.4}", self.time)?;
        writeln!(
            f,
            "  uResolution = ({}, {}, {:.4})",
            self.resolution[0], self.resolution[1], self.resolution[2]
        )?;
        writeln!(
            f,
            "  uMouse      = ({:.4}, {:.4})",
            self.pointer[0], self.pointer[1]
        )?;
        writeln!(
            f,
            "  uColor      = ({:.4}, {:.4}, {:.4})",
            self.color[0], self.color[1], self.color[2]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_at_default_rate() {
        let report = run_simulation(SessionConfig::default(), (800, 600), 1.0, 60.0).unwrap();
        assert!(
            (28..=31).contains(&report.admitted),
            "admitted {} frames",
            report.admitted
        );
        assert_eq!(report.draws as u64, report.admitted);
        assert_eq!(&report.resolution[..2], &[400.0, 300.0]);
        assert_eq!(report.pointer, [0.5, 0.5]);
        assert!(report.time > 0.9 && report.time <= 1.0);
    }

    #[test]
    fn uncapped_renders_every_callback() {
        let mut config = SessionConfig::default();
        config.tuning.target_fps = 0.0;
        let report = run_simulation(config, (320, 200), 0.5, 50.0).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.admitted, report.callbacks);
    }

    #[test]
    fn zero_duration_renders_nothing() {
        let report = run_simulation(SessionConfig::default(), (800, 600), 0.0, 60.0).unwrap();
        assert_eq!(report.draws, 0);
        assert_eq!(report.time, 0.0);
        assert!(report.to_string().contains("admitted frames: 0"));
    }
}
