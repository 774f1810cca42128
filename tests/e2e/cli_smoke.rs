//! CLI smoke tests: help, version, env and dry runs.

use backup_harness_config::KNOWN_ENV_VARS;
use std::io;
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

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn help_lists_every_command() -> io::Result<()> {
    let output = bh(&["--help"], &[])?;
    assert!(output.status.success());
    let help = stdout(&output);
    for command in [
        "backup", "restore", "estimate", "validate", "parse", "scenario", "config", "env", "jobs",
    ] {
        assert!(help.contains(command), "missing {command} in\n{help}");
    }
    Ok(())
}

#[test]
fn version_is_printed() -> io::Result<()> {
    let output = bh(&["--version"], &[])?;
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("bh "));
    Ok(())
}

#[test]
fn env_output_is_deterministic_and_redacted() -> Result<(), Box<dyn std::error::Error>> {
    let env = [
        ("IS_RUNNING_ON_LOCAL_3_NODES_ENV", "true"),
        ("ASDB_USER", "admin"),
        ("ASDB_PASSWORD", "hunter2"),
    ];
    let first = bh(&["env", "--output", "json", "--no-progress"], &env)?;
    let second = bh(&["env", "--output", "json", "--no-progress"], &env)?;
    assert!(first.status.success());
    assert_eq!(stdout(&first), stdout(&second));

    let text = stdout(&first);
    assert!(!text.contains("hunter2"), "{text}");
    let value: serde_json::Value = serde_json::from_str(text.trim())?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["kind"], "env");
    let set = value["result"]["parametersSet"]
        .as_array()
        .ok_or("parametersSet missing")?;
    assert!(set.iter().any(|name| name == "ASDB_PASSWORD"));
    Ok(())
}

#[test]
fn dry_run_backup_plans_without_running() -> io::Result<()> {
    let output = bh(
        &[
            "backup",
            "--namespace",
            "test",
            "--dir",
            "smoke",
            "--set",
            "users",
            "--dry-run",
            "--no-progress",
        ],
        &[("BH_BACKUP_ROOT", "/srv/backups"), ("ASDB_PASSWORD", "hunter2")],
    )?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("status: planned\nkind: backup\n"), "{text}");
    assert!(text.contains("--directory /srv/backups/smoke"), "{text}");
    assert!(text.contains("--set users"));
    assert!(!text.contains("hunter2"));
    Ok(())
}

#[test]
fn dry_run_restore_as_ndjson_is_one_line() -> Result<(), Box<dyn std::error::Error>> {
    let output = bh(
        &[
            "restore",
            "--namespace",
            "test",
            "--dir",
            "smoke",
            "--flag",
            "records-per-second=100",
            "--dry-run",
            "--output",
            "ndjson",
        ],
        &[],
    )?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert_eq!(text.lines().count(), 1, "{text}");
    let value: serde_json::Value = serde_json::from_str(text.trim())?;
    assert_eq!(value["type"], "summary");
    assert_eq!(value["status"], "planned");
    let command = value["result"]["command"].as_str().ok_or("command missing")?;
    assert!(command.contains("--records-per-second 100"), "{command}");
    Ok(())
}
