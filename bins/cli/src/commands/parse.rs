//! `bh parse`: typed reports from saved tool output.

use crate::ParseKind;
use crate::error::{CliError, ExitCode, infra_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, success_output};
use anyhow::Context as _;
use backup_harness_infra::{HarnessRuntime, ParsedReport, ReportKind, parse_report};
use std::io::Read as _;
use std::path::Path;

#[derive(Debug)]
pub struct ParseCommandInput<'a> {
    pub kind: ParseKind,
    pub input: Option<&'a Path>,
    pub ignore_errors: bool,
}

pub fn run_parse(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    input: &ParseCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let text = read_input(input.input)?;
    let kind = match input.kind {
        ParseKind::Backup => ReportKind::Backup,
        ParseKind::Restore => ReportKind::Restore,
        ParseKind::Estimate => ReportKind::Estimate,
        ParseKind::Validation => ReportKind::Validation,
    };
    match parse_report(runtime, kind, &text, input.ignore_errors) {
        Ok(report) => {
            let failed = matches!(&report, ParsedReport::Validation(validation) if validation.has_errors);
            if failed {
                success_output(mode, "report", "failed", &report, ExitCode::Failure)
            } else {
                success_output(mode, "report", "ok", &report, ExitCode::Ok)
            }
        },
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}

/// Read `path`, or stdin when it is absent or `-`.
fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read report from stdin")?;
            Ok(text)
        },
    }
}
