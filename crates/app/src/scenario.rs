//! Backup/restore round trip against one set.
//!
//! Stages run in a fixed order: seed the set, back it up, truncate or
//! overwrite it, restore it, then compare counts and sampled record values.
//! Each stage is logged as
//! `scenario.<stage>.start`, `.completed` or `.failed` and timed; the first
//! failing stage ends the run.

use crate::cli_backup::{BackupRunOptions, CliBackup};
use crate::cli_restore::CliRestore;
use crate::tools::{ToolDeps, ToolSettings};
use backup_harness_domain::{
    MutationMode, ScenarioOutcome, ScenarioReport, ScenarioStage, StageTiming,
};
use backup_harness_ports::{
    ClusterPort, LogFields, LoggerPort, RecordBins, SeedRequest, log_fields,
};
use backup_harness_shared::{
    CorrelationId, ErrorCode, ErrorEnvelope, PollPolicy, RequestContext, Result, poll_until,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioInput {
    /// Namespace under test.
    pub namespace: String,
    /// Set under test.
    pub set: String,
    /// Records to seed.
    pub records: u64,
    /// How data is disturbed between backup and restore.
    pub mode: MutationMode,
    /// Backup directory, relative to the backup root.
    pub backup_dir: String,
}

impl ScenarioInput {
    /// Truncate scenario writing into `<backup_root>/<set>-backup`.
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, records: u64) -> Self {
        let set = set.into();
        Self {
            backup_dir: format!("{set}-backup"),
            namespace: namespace.into(),
            set,
            records,
            mode: MutationMode::default(),
        }
    }

    /// Set count expected once the restore has finished.
    ///
    /// Mutating overwrites the seeded keys, so both modes end with the
    /// seeded count.
    pub const fn expected_final_count(&self) -> u64 {
        self.records
    }
}

/// Object size of the records written over the seeded ones when mutating.
pub const MUTATION_OBJECT_SIZE: u32 = 64;

/// Keys whose bins are captured after seeding and compared after restore.
fn sample_keys(records: u64) -> Vec<u64> {
    let mut keys = Vec::new();
    if records == 0 {
        return keys;
    }
    for key in [0, records / 2, records - 1] {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Polling schedules of the waiting stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioPolicies {
    /// Wait for seeded records to become visible.
    pub seed: PollPolicy,
    /// Wait for a truncate to empty the set.
    pub truncate: PollPolicy,
    /// Wait for restored records to become visible.
    pub restore: PollPolicy,
}

impl Default for ScenarioPolicies {
    fn default() -> Self {
        Self {
            seed: PollPolicy::new(Duration::ZERO, Duration::from_secs(1), Duration::from_secs(60)),
            truncate: PollPolicy::set_truncate(),
            restore: PollPolicy::new(
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(60),
            ),
        }
    }
}

/// Dependencies of a scenario run.
#[derive(Clone)]
pub struct ScenarioDeps {
    /// Cluster under test.
    pub cluster: Arc<dyn ClusterPort>,
    /// Runner (and logger) for the CLI tools.
    pub tools: ToolDeps,
    /// Tool locations and connection profile.
    pub settings: ToolSettings,
    /// Polling schedules.
    pub policies: ScenarioPolicies,
    /// Optional logger for stage events.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Scenario-level failures that do not come from a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// An observed count did not match the expected one.
    AssertionFailed {
        /// Name of the check.
        check: &'static str,
        /// Expected value.
        expected: u64,
        /// Observed value.
        actual: u64,
    },
    /// The backup tool reported a non-zero exit code.
    BackupExit {
        /// Reported exit code.
        exit_code: i32,
    },
    /// A sampled record was absent.
    RecordMissing {
        /// Key of the record.
        key: u64,
    },
    /// A sampled record came back with different bins than were seeded.
    ValueMismatch {
        /// Key of the record.
        key: u64,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssertionFailed {
                check,
                expected,
                actual,
            } => write!(formatter, "{check}: expected {expected}, got {actual}"),
            Self::BackupExit { exit_code } => {
                write!(formatter, "asbackup exited with code {exit_code}")
            },
            Self::RecordMissing { key } => write!(formatter, "record {key} not found"),
            Self::ValueMismatch { key } => {
                write!(formatter, "record {key} differs from the seeded bins")
            },
        }
    }
}

impl std::error::Error for ScenarioError {}

impl From<ScenarioError> for ErrorEnvelope {
    fn from(error: ScenarioError) -> Self {
        let message = error.to_string();
        match error {
            ScenarioError::AssertionFailed {
                check,
                expected,
                actual,
            } => Self::expected(ErrorCode::assertion_failed(), message)
                .with_metadata("check", check)
                .with_metadata("expected", expected.to_string())
                .with_metadata("actual", actual.to_string()),
            ScenarioError::BackupExit { exit_code } => {
                Self::expected(ErrorCode::new("scenario", "backup_exit"), message)
                    .with_metadata("exit_code", exit_code.to_string())
            },
            ScenarioError::RecordMissing { key } | ScenarioError::ValueMismatch { key } => {
                Self::expected(ErrorCode::assertion_failed(), message)
                    .with_metadata("check", "restored bin values")
                    .with_metadata("key", key.to_string())
            },
        }
    }
}

#[derive(Default)]
struct Observed {
    backup_records: Option<u64>,
    restored_records: Option<u64>,
    inserted_records: Option<u64>,
    final_count: Option<u64>,
    samples: Vec<(u64, RecordBins)>,
}

/// Run every stage and report the outcome.
///
/// Stage failures are part of the report, not an `Err`.
#[tracing::instrument(
    name = "scenario",
    skip_all,
    fields(namespace = %input.namespace, set = %input.set, records = input.records)
)]
pub async fn run_scenario(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
) -> ScenarioReport {
    let backup_dir = deps.settings.backup_path(&input.backup_dir);
    let mut observed = Observed::default();
    let mut stages = Vec::with_capacity(ScenarioStage::ORDER.len());
    let mut stage = ScenarioStage::Seed;

    let outcome = loop {
        if stage == ScenarioStage::Done {
            break ScenarioOutcome::Passed;
        }
        log_stage(deps, stage, "start", input, None);
        let started_at = Instant::now();
        let result = match ctx.ensure_not_cancelled("scenario.stage") {
            Ok(()) => run_stage(ctx, deps, input, &backup_dir, stage, &mut observed).await,
            Err(error) => Err(error),
        };
        let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(()) => {
                log_stage(deps, stage, "completed", input, Some(duration_ms));
                stages.push(StageTiming { stage, duration_ms });
                stage = stage.next();
            },
            Err(error) => {
                if let Some(logger) = &deps.logger {
                    logger.failure(
                        &format!("scenario.{stage}.failed"),
                        "Scenario stage failed",
                        Some(stage_fields(input, Some(duration_ms))),
                        &error,
                    );
                }
                break ScenarioOutcome::Failed { stage, error };
            },
        }
    };

    ScenarioReport {
        run_id: CorrelationId::new_run_id().as_str().to_string(),
        namespace: input.namespace.clone(),
        set: input.set.clone(),
        expected_records: input.expected_final_count(),
        backup_records: observed.backup_records,
        restored_records: observed.restored_records,
        final_count: observed.final_count,
        stages,
        outcome,
    }
}

async fn run_stage(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
    backup_dir: &str,
    stage: ScenarioStage,
    observed: &mut Observed,
) -> Result<()> {
    match stage {
        ScenarioStage::Seed => {
            let request = SeedRequest::new(&input.namespace, &input.set, input.records);
            deps.cluster.seed(ctx, request).await?;
            wait_for_count(ctx, deps, input, deps.policies.seed, "scenario.seed.wait", |count| {
                count >= input.records
            })
            .await?;
            observed.samples = read_samples(ctx, deps, input).await?;
            Ok(())
        },
        ScenarioStage::Backup => {
            let result = CliBackup::on_exact_dir(&deps.settings, &input.namespace, backup_dir)
                .sets([input.set.as_str()])
                .run(ctx, &deps.tools, BackupRunOptions::default())
                .await?;
            if result.exit_code != 0 {
                return Err(ScenarioError::BackupExit {
                    exit_code: result.exit_code,
                }
                .into());
            }
            observed.backup_records = Some(result.records_read);
            Ok(())
        },
        ScenarioStage::MutateOrTruncate => match input.mode {
            MutationMode::Truncate => {
                deps.cluster
                    .truncate_set(ctx, &input.namespace, &input.set)
                    .await?;
                wait_for_count(
                    ctx,
                    deps,
                    input,
                    deps.policies.truncate,
                    "scenario.truncate.wait",
                    |count| count == 0,
                )
                .await?;
                Ok(())
            },
            MutationMode::Mutate => {
                let request = SeedRequest::new(&input.namespace, &input.set, input.records)
                    .with_object_size(MUTATION_OBJECT_SIZE);
                deps.cluster.seed(ctx, request).await?;
                wait_for_mutation(ctx, deps, input, &observed.samples).await
            },
        },
        ScenarioStage::Restore => {
            let mut restore = CliRestore::on_dir(&deps.settings, &input.namespace, backup_dir);
            if input.mode == MutationMode::Mutate {
                restore = restore.no_generation();
            }
            let result = restore.run(ctx, &deps.tools, false).await?;
            observed.restored_records = Some(result.records_on_cluster());
            observed.inserted_records = Some(result.inserted_records);
            Ok(())
        },
        ScenarioStage::Assert => assert_counts(ctx, deps, input, observed).await,
        ScenarioStage::Done => Ok(()),
    }
}

async fn assert_counts(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
    observed: &mut Observed,
) -> Result<()> {
    let expected = input.expected_final_count();
    let final_count = match wait_for_count(
        ctx,
        deps,
        input,
        deps.policies.restore,
        "scenario.restore.wait",
        |count| count == expected,
    )
    .await
    {
        Ok(count) => count,
        Err(error) if error.is_timeout() => {
            deps.cluster
                .set_object_count(ctx, &input.namespace, &input.set)
                .await?
        },
        Err(error) => return Err(error),
    };
    observed.final_count = Some(final_count);

    check("backup records", input.records, observed.backup_records)?;
    check("restored records", input.records, observed.restored_records)?;
    check("inserted records", input.records, observed.inserted_records)?;
    check("final set count", expected, Some(final_count))?;

    for (key, seeded) in &observed.samples {
        let current = deps
            .cluster
            .read_record(ctx, &input.namespace, &input.set, *key)
            .await?;
        if current.as_ref() != Some(seeded) {
            return Err(ScenarioError::ValueMismatch { key: *key }.into());
        }
    }
    Ok(())
}

async fn read_samples(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
) -> Result<Vec<(u64, RecordBins)>> {
    let mut samples = Vec::new();
    for key in sample_keys(input.records) {
        let bins = deps
            .cluster
            .read_record(ctx, &input.namespace, &input.set, key)
            .await?
            .ok_or(ScenarioError::RecordMissing { key })?;
        samples.push((key, bins));
    }
    Ok(samples)
}

/// Wait until the first sampled record no longer holds its seeded bins.
async fn wait_for_mutation(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
    samples: &[(u64, RecordBins)],
) -> Result<()> {
    let Some((key, seeded)) = samples.first() else {
        return Ok(());
    };
    poll_until(ctx, deps.policies.seed, "scenario.mutate.wait", || async move {
        let current = deps
            .cluster
            .read_record(ctx, &input.namespace, &input.set, *key)
            .await?;
        Ok((current.as_ref() != Some(seeded)).then_some(()))
    })
    .await
}

fn check(name: &'static str, expected: u64, actual: Option<u64>) -> Result<()> {
    let actual = actual.unwrap_or(0);
    if actual == expected {
        return Ok(());
    }
    Err(ScenarioError::AssertionFailed {
        check: name,
        expected,
        actual,
    }
    .into())
}

async fn wait_for_count(
    ctx: &RequestContext,
    deps: &ScenarioDeps,
    input: &ScenarioInput,
    policy: PollPolicy,
    operation: &'static str,
    done: impl Fn(u64) -> bool,
) -> Result<u64> {
    let done = &done;
    poll_until(ctx, policy, operation, || async move {
        let count = deps
            .cluster
            .set_object_count(ctx, &input.namespace, &input.set)
            .await?;
        Ok(done(count).then_some(count))
    })
    .await
}

fn log_stage(
    deps: &ScenarioDeps,
    stage: ScenarioStage,
    phase: &str,
    input: &ScenarioInput,
    duration_ms: Option<u64>,
) {
    if let Some(logger) = &deps.logger {
        logger.info(
            &format!("scenario.{stage}.{phase}"),
            &format!("Scenario stage {stage} {phase}"),
            Some(stage_fields(input, duration_ms)),
        );
    }
}

fn stage_fields(input: &ScenarioInput, duration_ms: Option<u64>) -> LogFields {
    let mut fields = log_fields([
        ("namespace", Value::from(input.namespace.as_str())),
        ("set", Value::from(input.set.as_str())),
        ("records", Value::from(input.records)),
    ]);
    if let Some(duration_ms) = duration_ms {
        fields.insert("duration_ms".into(), Value::from(duration_ms));
    }
    fields
}
