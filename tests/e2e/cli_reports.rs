//! `bh parse` against saved tool output.

use backup_harness_config::KNOWN_ENV_VARS;
use backup_harness_testkit::fixtures;
use std::io::{self, Write as _};
use std::process::{Command, Output, Stdio};

fn bh_command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bh"));
    for name in KNOWN_ENV_VARS {
        command.env_remove(name);
    }
    command
        .env_remove("BH_LOG")
        .env_remove("RUST_LOG")
        .args(args);
    command
}

fn parse_file(kind: &str, text: &str, extra: &[&str]) -> io::Result<Output> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(text.as_bytes())?;
    let path = file
        .path()
        .to_str()
        .ok_or_else(|| io::Error::other("temp path is not UTF-8"))?
        .to_string();
    let mut args = vec!["parse", kind, path.as_str(), "--output", "json"];
    args.extend_from_slice(extra);
    bh_command(&args).output()
}

fn json(output: &Output) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_slice(&output.stdout)
}

#[test]
fn backup_report_parses() -> Result<(), Box<dyn std::error::Error>> {
    let output = parse_file("backup", &fixtures::backup_report(1_000), &[])?;
    assert!(output.status.success());
    let value = json(&output)?;
    assert_eq!(value["result"]["kind"], "backup");
    let report = &value["result"]["report"];
    assert_eq!(report["recordsRead"], 1_000);
    assert_eq!(report["exitCode"], 0);
    Ok(())
}

#[test]
fn restore_report_parses_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let mut child = bh_command(&["parse", "restore", "-", "--output", "json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    child
        .stdin
        .take()
        .ok_or("stdin not piped")?
        .write_all(fixtures::restore_report(90, 10).as_bytes())?;
    let output = child.wait_with_output()?;
    assert!(output.status.success());
    let report = &json(&output)?["result"]["report"];
    assert_eq!(report["insertedRecords"], 90);
    assert_eq!(report["existedRecords"], 10);
    Ok(())
}

#[test]
fn error_marker_fails_unless_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let text = format!(
        "{}level=ERROR msg=\"failed to write record\"\n",
        fixtures::backup_report(5)
    );

    let failed = parse_file("backup", &text, &[])?;
    assert_eq!(failed.status.code(), Some(4));
    assert_eq!(json(&failed)?["error"]["code"], "report:backup_process");

    let ignored = parse_file("backup", &text, &["--ignore-errors"])?;
    assert!(ignored.status.success());
    assert_eq!(json(&ignored)?["result"]["report"]["recordsRead"], 5);
    Ok(())
}

#[test]
fn missing_field_is_a_report_failure() -> Result<(), Box<dyn std::error::Error>> {
    let text = fixtures::backup_report(5).replace("Records Read: 5\n", "");
    let output = parse_file("backup", &text, &[])?;
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(json(&output)?["error"]["code"], "report:missing_field");
    Ok(())
}

#[test]
fn estimate_and_validation_reports_parse() -> Result<(), Box<dyn std::error::Error>> {
    let estimate = parse_file("estimate", &fixtures::estimate_report(4_096), &[])?;
    assert!(estimate.status.success());
    assert_eq!(json(&estimate)?["result"]["kind"], "estimate");

    let validation = parse_file("validation", &fixtures::validation_report(12), &[])?;
    assert!(validation.status.success());
    let report = &json(&validation)?["result"]["report"];
    assert_eq!(report["recordsRead"], 12);
    assert_eq!(report["filesFound"], 1);
    Ok(())
}

#[test]
fn unreadable_input_is_an_io_error() -> io::Result<()> {
    let output = bh_command(&["parse", "backup", "/nonexistent/bh/report.txt"]).output()?;
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read report from"), "{stderr}");
    Ok(())
}
