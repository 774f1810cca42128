//! `bh scenario run`.

use crate::error::{CliError, ExitCode, infra_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, success_output};
use backup_harness_domain::MutationMode;
use backup_harness_infra::{HarnessRuntime, ScenarioRequest, run_scenario_local};

/// Run one scenario. A failed stage or count mismatch exits with the failure code.
pub fn run_scenario(
    mode: OutputMode,
    runtime: &HarnessRuntime,
    namespace: &str,
    set: &str,
    records: u64,
    mutation: MutationMode,
) -> Result<CliOutput, CliError> {
    let request = ScenarioRequest {
        namespace: namespace.to_string(),
        set: set.to_string(),
        records,
        mode: mutation,
    };
    match run_scenario_local(runtime, &request) {
        Ok(report) if report.passed() => {
            success_output(mode, "scenario", "passed", &report, ExitCode::Ok)
        },
        Ok(report) => success_output(mode, "scenario", "failed", &report, ExitCode::Failure),
        Err(error) => Ok(format_error_output(mode, &error, infra_exit_code(&error))),
    }
}
