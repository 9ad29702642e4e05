use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use renderer::{run_preview, PreviewOptions, SessionConfig, Tuning};
use surfaceconfig::BackdropConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{RunArgs, SimulateArgs};
use crate::paths::{AppPaths, ConfigLocation};
use crate::simulate;

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);
const DEFAULT_TITLE: &str = "Iridescence";

pub fn run(args: RunArgs) -> Result<()> {
    let (location, config) = load_config(&args)?;
    let session = session_config(&config);
    let title = config
        .attributes
        .get("title")
        .cloned()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    tracing::info!(
        config = %location.path().display(),
        fps = session.tuning.target_fps,
        mouse_reactive = session.mouse_reactive,
        "starting preview"
    );

    let reload_args = args.clone();
    run_preview(PreviewOptions {
        config: session,
        size: args.size.unwrap_or(DEFAULT_WINDOW_SIZE),
        title,
        reload: Some(Box::new(move || {
            let (_, config) = load_config(&reload_args)?;
            Ok(session_config(&config))
        })),
    })
}

pub fn simulate(args: &RunArgs, simulate_args: SimulateArgs) -> Result<()> {
    let (_, config) = load_config(args)?;
    let size = args.size.unwrap_or(simulate::DEFAULT_CONTAINER_SIZE);
    let report = simulate::run_simulation(
        session_config(&config),
        size,
        simulate_args.seconds,
        simulate_args.refresh_hz,
    )?;
    print!("{report}");
    Ok(())
}

pub fn print_config(args: &RunArgs) -> Result<()> {
    let (_, config) = load_config(args)?;
    let text = config
        .to_toml_string()
        .context("failed to serialize effective configuration")?;
    print!("{text}");
    Ok(())
}

pub fn print_where(args: &RunArgs) -> Result<()> {
    let location = ConfigLocation::resolve(args.config.as_deref())?;
    let status = if location.path().is_file() {
        "present"
    } else if location.is_explicit() {
        "missing"
    } else {
        "missing, built-in defaults apply"
    };
    println!("Configuration file:");
    println!("  {} ({status})", location.path().display());
    if !location.is_explicit() {
        let paths = AppPaths::discover()?;
        println!("Configuration directory:");
        println!("  {}", paths.config_dir().display());
    }
    Ok(())
}

/// Reads the configuration file (if any) and applies command-line overrides.
pub fn load_config(args: &RunArgs) -> Result<(ConfigLocation, BackdropConfig)> {
    let location = ConfigLocation::resolve(args.config.as_deref())?;
    let mut config = read_config(&location)?;
    apply_overrides(&mut config, args);
    config
        .validate()
        .context("command-line overrides produced an invalid configuration")?;
    Ok((location, config))
}

fn read_config(location: &ConfigLocation) -> Result<BackdropConfig> {
    let path = location.path();
    match fs::read_to_string(path) {
        Ok(contents) => {
            let config = BackdropConfig::from_toml_str(&contents)
                .with_context(|| format!("failed to load config file at {}", path.display()))?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        Err(err) if err.kind() == ErrorKind::NotFound && !location.is_explicit() => {
            tracing::debug!(path = %path.display(), "no configuration file; using defaults");
            Ok(BackdropConfig::default())
        }
        Err(err) => Err(err)
            .with_context(|| format!("failed to read config file at {}", path.display())),
    }
}

pub fn apply_overrides(config: &mut BackdropConfig, args: &RunArgs) {
    let appearance = &mut config.appearance;
    if let Some(color) = args.color {
        appearance.color = color;
    }
    if let Some(speed) = args.speed {
        appearance.speed = speed;
    }
    if let Some(amplitude) = args.amplitude {
        appearance.amplitude = amplitude;
    }
    if args.no_mouse_react {
        appearance.mouse_reactive = false;
    }

    let timing = &mut config.timing;
    if let Some(fps) = args.fps {
        timing.target_fps = fps;
    }
    if let Some(scale) = args.render_scale {
        timing.render_scale = scale;
    }
}

pub fn session_config(config: &BackdropConfig) -> SessionConfig {
    let appearance = &config.appearance;
    let timing = &config.timing;
    SessionConfig {
        color: appearance.color,
        speed: appearance.speed,
        amplitude: appearance.amplitude,
        mouse_reactive: appearance.mouse_reactive,
        attributes: config.attributes.clone(),
        tuning: Tuning {
            target_fps: timing.target_fps,
            render_scale: timing.render_scale,
            pixel_ratio_cap: timing.pixel_ratio_cap,
            resize_debounce: timing.resize_debounce,
            pointer_throttle: timing.pointer_throttle,
            pointer_smoothing: timing.pointer_smoothing,
        },
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_maps_to_default_session() {
        assert_eq!(
            session_config(&BackdropConfig::default()),
            SessionConfig::default()
        );
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = BackdropConfig::default();
        config.timing.resize_debounce = Duration::from_millis(250);
        let args = RunArgs {
            color: Some([0.2, 0.4, 0.6]),
            speed: Some(2.0),
            no_mouse_react: true,
            fps: Some(0.0),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args);

        let session = session_config(&config);
        assert_eq!(session.color, [0.2, 0.4, 0.6]);
        assert_eq!(session.speed, 2.0);
        assert_eq!(session.amplitude, 0.1);
        assert!(!session.mouse_reactive);
        assert_eq!(session.tuning.target_fps, 0.0);
        assert_eq!(session.tuning.resize_debounce, Duration::from_millis(250));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[appearance]\nspeed = 0.5\n").unwrap();
        let args = RunArgs {
            config: Some(path.clone()),
            render_scale: Some(1.5),
            ..RunArgs::default()
        };
        assert!(load_config(&args).is_err());

        let args = RunArgs {
            config: Some(path),
            ..RunArgs::default()
        };
        let (location, config) = load_config(&args).unwrap();
        assert!(location.is_explicit());
        assert_eq!(config.appearance.speed, 0.5);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = RunArgs {
            config: Some(dir.path().join("absent.toml")),
            ..RunArgs::default()
        };
        let err = load_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
