//! CLI config commands: show, check and schema.

use backup_harness_config::KNOWN_ENV_VARS;
use std::io::{self, Write as _};
use std::path::Path;
use std::process::{Command, Output};

fn bh(args: &[&str], env: &[(&str, &str)]) -> io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bh"));
    for name in KNOWN_ENV_VARS {
        command.env_remove(name);
    }
    command
        .env_remove("BH_LOG")
        .env_remove("RUST_LOG")
        .envs(env.iter().copied())
        .args(args)
        .output()
}

fn json(output: &Output) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_slice(&output.stdout)
}

fn path_str(path: &Path) -> io::Result<&str> {
    path.to_str()
        .ok_or_else(|| io::Error::other("temp path is not UTF-8"))
}

#[test]
fn schema_is_valid_json() -> Result<(), Box<dyn std::error::Error>> {
    let output = bh(&["config", "schema"], &[])?;
    assert!(output.status.success());
    let schema = json(&output)?;
    assert!(schema["properties"]["backupService"].is_object());
    Ok(())
}

#[test]
fn show_layers_file_then_env_then_flags() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        "version = 1\n[paths]\nbackupRoot = \"/from/file\"\n[logging]\nlevel = \"warn\""
    )?;
    let config = path_str(file.path())?;

    let output = bh(
        &["config", "show", "--config", config, "--output", "json"],
        &[("BH_LOG_LEVEL", "error")],
    )?;
    assert!(output.status.success());
    let value = json(&output)?;
    assert_eq!(value["effectiveConfig"]["paths"]["backupRoot"], "/from/file");
    assert_eq!(value["effectiveConfig"]["logging"]["level"], "error");

    let output = bh(
        &[
            "config", "show", "--config", config, "--output", "json", "--log-level", "debug",
        ],
        &[("BH_LOG_LEVEL", "error")],
    )?;
    assert_eq!(json(&output)?["effectiveConfig"]["logging"]["level"], "debug");
    Ok(())
}

#[test]
fn env_file_fills_missing_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let mut env_file = tempfile::NamedTempFile::new()?;
    writeln!(env_file, "# harness\nexport BH_BACKUP_ROOT=\"/from/env-file\"\nBACKUP_PARALLEL=3")?;
    let path = path_str(env_file.path())?;

    let output = bh(
        &["config", "show", "--env-file", path, "--output", "json"],
        &[("BACKUP_PARALLEL", "6")],
    )?;
    assert!(output.status.success());
    let value = json(&output)?;
    assert_eq!(value["effectiveConfig"]["paths"]["backupRoot"], "/from/env-file");
    assert_eq!(value["effectiveConfig"]["commands"]["backupParallel"], 6);
    Ok(())
}

#[test]
fn check_reports_invalid_files() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(file, "version = 1\n[paths]\nunknownKey = true")?;
    let output = bh(
        &["config", "check", "--config", path_str(file.path())?, "--output", "json"],
        &[],
    )?;
    assert_eq!(output.status.code(), Some(2));
    let value = json(&output)?;
    assert_eq!(value["status"], "error");
    Ok(())
}

#[test]
fn check_accepts_defaults() -> io::Result<()> {
    let output = bh(&["config", "check", "--no-progress"], &[])?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "status: ok\nconfig: ok\n");
    Ok(())
}
