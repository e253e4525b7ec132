//! Smoke tests for the `corebridge-monitor` binary.

use std::process::Command;

fn monitor() -> Command {
    Command::new(env!("CARGO_BIN_EXE_corebridge-monitor"))
}

#[test]
fn binary_responds_to_help() {
    let output = monitor().arg("--help").output().expect("failed to execute monitor");
    assert!(output.status.success(), "--help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--pipe"));
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--config"));
}

#[test]
fn missing_pipe_fails_cleanly() {
    let home = tempfile::tempdir().unwrap();
    let output = monitor()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("APPDATA", home.path())
        .output()
        .expect("failed to execute monitor");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pipe"), "error should mention the pipe: {stderr}");
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = monitor()
        .args(["--pipe", "log", "--config"])
        .arg(dir.path().join("absent.toml"))
        .output()
        .expect("failed to execute monitor");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.toml"), "{stderr}");
}

#[test]
fn unknown_format_exits_nonzero() {
    let output = monitor()
        .args(["--pipe", "log", "--format", "xml"])
        .output()
        .expect("failed to execute monitor");
    assert!(!output.status.success());
}
