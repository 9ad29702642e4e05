use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn iridescence(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_iridescence"));
    command
        .env("IRIDESCENCE_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn print_config_merges_file_and_flags() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("config.toml"),
        "[appearance]\nspeed = 2.5\n\n[timing]\nresize_debounce = \"250ms\"\n",
    )
    .unwrap();

    let output = iridescence(root.path())
        .args(["print-config", "--amplitude", "0.25"])
        .output()
        .expect("failed to run iridescence print-config");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("speed = 2.5"), "{stdout}");
    assert!(stdout.contains("amplitude = 0.25"), "{stdout}");
    assert!(stdout.contains("resize_debounce = \"250ms\""), "{stdout}");
}

#[test]
fn simulate_reports_rendered_frames() {
    let root = TempDir::new().unwrap();

    let output = iridescence(root.path())
        .args(["simulate", "--seconds", "1", "--size", "800x600"])
        .output()
        .expect("failed to run iridescence simulate");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("admitted frames:"), "{stdout}");
    assert!(stdout.contains("uResolution = (400, 300, 1.3333)"), "{stdout}");
}

#[test]
fn invalid_config_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "version = 7\n").unwrap();

    let status = iridescence(root.path())
        .arg("print-config")
        .status()
        .expect("failed to run iridescence print-config");

    assert!(!status.success());
}

#[test]
fn where_reports_missing_default_file() {
    let root = TempDir::new().unwrap();

    let output = iridescence(root.path())
        .arg("where")
        .output()
        .expect("failed to run iridescence where");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("config.toml"), "{stdout}");
    assert!(stdout.contains("built-in defaults"), "{stdout}");
}
