use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "iridescence",
    author,
    version,
    about = "Animated iridescent shader background",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (TOML). Defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Base tint as `r,g,b` floats or `#rrggbb`.
    #[arg(long, value_name = "R,G,B|#RRGGBB", value_parser = parse_color_arg, global = true)]
    pub color: Option<[f32; 3]>,

    /// Animation speed multiplier.
    #[arg(long, value_name = "FACTOR", allow_negative_numbers = true, global = true)]
    pub speed: Option<f32>,

    /// Strength of the pointer displacement.
    #[arg(long, value_name = "AMOUNT", allow_negative_numbers = true, global = true)]
    pub amplitude: Option<f32>,

    /// Ignore pointer movement.
    #[arg(long, global = true)]
    pub no_mouse_react: bool,

    /// Frame cap (0=uncapped).
    #[arg(long, value_name = "FPS", global = true)]
    pub fps: Option<f32>,

    /// Fraction of the container size the shader is evaluated at (0-1].
    #[arg(long, value_name = "SCALE", global = true)]
    pub render_scale: Option<f32>,

    /// Window (or simulated container) size, e.g. `1280x720`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, global = true)]
    pub size: Option<(u32, u32)>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a session against the headless host and report what was rendered.
    Simulate(SimulateArgs),
    /// Print the effective configuration as TOML.
    PrintConfig,
    /// Print the resolved configuration path.
    Where,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Simulated wall-clock duration.
    #[arg(long, value_name = "SECONDS", default_value_t = 5.0, value_parser = parse_seconds)]
    pub seconds: f64,

    /// Refresh rate of the simulated display.
    #[arg(long, value_name = "HZ", default_value_t = 60.0, value_parser = parse_refresh_hz)]
    pub refresh_hz: f64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_color_arg(value: &str) -> Result<[f32; 3], String> {
    surfaceconfig::parse_color(value)
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("duration must be a non-negative number of seconds".into());
    }
    Ok(seconds)
}

fn parse_refresh_hz(value: &str) -> Result<f64, String> {
    let hz: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid refresh rate '{value}'"))?;
    if !hz.is_finite() || hz <= 0.0 {
        return Err("refresh rate must be greater than zero".into());
    }
    Ok(hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_variants() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 800 X 600 ").unwrap(), (800, 600));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn overrides_apply_after_subcommand() {
        let cli = Cli::try_parse_from([
            "iridescence",
            "simulate",
            "--seconds",
            "2",
            "--fps",
            "60",
            "--color",
            "#ff0000",
            "--no-mouse-react",
        ])
        .expect("parse args");
        assert_eq!(cli.run.fps, Some(60.0));
        assert_eq!(cli.run.color, Some([1.0, 0.0, 0.0]));
        assert!(cli.run.no_mouse_react);
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert_eq!(args.seconds, 2.0);
                assert_eq!(args.refresh_hz, 60.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_simulation_arguments() {
        assert!(Cli::try_parse_from(["iridescence", "simulate", "--refresh-hz", "0"]).is_err());
        assert!(Cli::try_parse_from(["iridescence", "simulate", "--seconds", "-1"]).is_err());
        assert!(Cli::try_parse_from(["iridescence", "--color", "1,2"]).is_err());
    }

    #[test]
    fn no_subcommand_runs_preview() {
        let cli = Cli::try_parse_from(["iridescence", "--speed", "-0.5", "--size", "640x480"])
            .expect("parse args");
        assert!(cli.command.is_none());
        assert_eq!(cli.run.speed, Some(-0.5));
        assert_eq!(cli.run.size, Some((640, 480)));
    }
}
