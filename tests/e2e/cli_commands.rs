//! CLI commands that reach tools or the backup service.

use backup_harness_config::KNOWN_ENV_VARS;
use serde_json::json;
use std::io;
use std::process::{Command, Output};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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

#[test]
fn missing_tool_directory_is_an_io_failure() -> Result<(), Box<dyn std::error::Error>> {
    let output = bh(
        &["backup", "--namespace", "test", "--output", "json"],
        &[("BH_ASBACKUP_DIR", "/nonexistent/bh-tools")],
    )?;
    assert_eq!(output.status.code(), Some(3));
    let value = json(&output)?;
    assert_eq!(value["error"]["code"], "process:spawn");
    Ok(())
}

#[test]
fn scenario_needs_records() -> Result<(), Box<dyn std::error::Error>> {
    let output = bh(
        &[
            "scenario", "run", "--namespace", "test", "--set", "users", "--records", "0",
            "--output", "json",
        ],
        &[],
    )?;
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(json(&output)?["error"]["code"], "core:invalid_input");
    Ok(())
}

#[test]
fn validate_without_target_is_a_usage_error() -> io::Result<()> {
    let output = bh(&["validate"], &[])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn jobs_need_a_service_url() -> Result<(), Box<dyn std::error::Error>> {
    let output = bh(&["jobs", "status", "job-1", "--output", "json"], &[])?;
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        json(&output)?["error"]["code"],
        "config:backup_service_unconfigured"
    );
    Ok(())
}

async fn run_bh(args: Vec<String>, url: String) -> Result<Output, Box<dyn std::error::Error>> {
    let output = tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        bh(&args, &[("BH_BACKUP_SERVICE_URL", url.as_str())])
    })
    .await??;
    Ok(output)
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_status_and_cancel_use_the_service() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/job/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "status": "JobStatusCancelled",
            "jobType": "backup"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/job/cancel/42"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let status = run_bh(args(&["jobs", "status", "42", "--output", "json"]), server.uri()).await?;
    assert!(status.status.success());
    let value = json(&status)?;
    assert_eq!(value["kind"], "job");
    assert_eq!(value["result"]["status"], "CANCELLED");

    let cancel = run_bh(args(&["jobs", "cancel", "42", "--output", "json"]), server.uri()).await?;
    assert!(cancel.status.success());
    assert_eq!(json(&cancel)?["result"]["id"], "42");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_restore_returns_counts() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/restore/status/r-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "DONE",
            "readRecords": 10,
            "insertedRecords": 10
        })))
        .mount(&server)
        .await;

    let output = run_bh(
        args(&["jobs", "wait-restore", "r-9", "--output", "json"]),
        server.uri(),
    )
    .await?;
    assert!(output.status.success());
    let value = json(&output)?;
    assert_eq!(value["result"]["status"], "DONE");
    assert_eq!(value["result"]["insertedRecords"], 10);
    Ok(())
}
