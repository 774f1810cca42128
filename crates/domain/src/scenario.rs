//! End-to-end scenario stages and their report.

use backup_harness_shared::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stage of a `seed -> backup -> mutate/truncate -> restore -> assert` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStage {
    /// Write records into the set.
    Seed,
    /// Back the namespace up.
    Backup,
    /// Destroy or change the seeded data.
    MutateOrTruncate,
    /// Restore from the backup directory.
    Restore,
    /// Compare the cluster with the expectations.
    Assert,
    /// Terminal state.
    Done,
}

impl ScenarioStage {
    /// Stages in execution order, excluding [`ScenarioStage::Done`].
    pub const ORDER: [Self; 5] = [
        Self::Seed,
        Self::Backup,
        Self::MutateOrTruncate,
        Self::Restore,
        Self::Assert,
    ];

    /// Stage that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Seed => Self::Backup,
            Self::Backup => Self::MutateOrTruncate,
            Self::MutateOrTruncate => Self::Restore,
            Self::Restore => Self::Assert,
            Self::Assert | Self::Done => Self::Done,
        }
    }

    /// Identifier used in log event names (`scenario.<stage>.start`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Backup => "backup",
            Self::MutateOrTruncate => "mutate_or_truncate",
            Self::Restore => "restore",
            Self::Assert => "assert",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ScenarioStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the seeded data is disturbed before restoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMode {
    /// Truncate the set and wait until it is empty.
    #[default]
    Truncate,
    /// Overwrite the records with a second seed pass.
    Mutate,
}

impl FromStr for MutationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(Self::Truncate),
            "mutate" => Ok(Self::Mutate),
            other => Err(format!("unknown mutation mode `{other}`")),
        }
    }
}

/// Timing of one completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    /// Stage that ran.
    pub stage: ScenarioStage,
    /// Wall-clock time spent in the stage.
    pub duration_ms: u64,
}

/// Final state of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// Every stage succeeded and all assertions held.
    Passed,
    /// A stage failed.
    Failed {
        /// Stage that failed.
        stage: ScenarioStage,
        /// Failure details.
        error: ErrorEnvelope,
    },
}

/// Summary of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    /// Run identifier.
    pub run_id: String,
    /// Namespace under test.
    pub namespace: String,
    /// Set under test.
    pub set: String,
    /// Records the scenario expected to find after restore.
    pub expected_records: u64,
    /// Records read by the backup, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_records: Option<u64>,
    /// Records inserted or already present after restore, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_records: Option<u64>,
    /// Set object count observed during the assert stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_count: Option<u64>,
    /// Completed stages in order.
    pub stages: Vec<StageTiming>,
    /// Outcome.
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    /// True when the run passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Passed)
    }

    /// Sum of stage durations.
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.stages
            .iter()
            .fold(0, |total, timing| total.saturating_add(timing.duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_harness_shared::ErrorCode;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = ScenarioStage::Seed;
        let mut visited = vec![stage];
        while stage != ScenarioStage::Done {
            stage = stage.next();
            visited.push(stage);
        }
        assert_eq!(visited.len(), ScenarioStage::ORDER.len() + 1);
        assert_eq!(visited.get(..5), Some(ScenarioStage::ORDER.as_slice()));
    }

    #[test]
    fn outcome_is_tagged_by_status() -> Result<(), serde_json::Error> {
        let failed = ScenarioOutcome::Failed {
            stage: ScenarioStage::Restore,
            error: ErrorEnvelope::expected(ErrorCode::assertion_failed(), "count mismatch"),
        };
        let json = serde_json::to_value(&failed)?;
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "restore");

        let passed = serde_json::to_value(ScenarioOutcome::Passed)?;
        assert_eq!(passed["status"], "passed");
        Ok(())
    }

    #[test]
    fn parses_mutation_mode() {
        assert_eq!("Truncate".parse(), Ok(MutationMode::Truncate));
        assert_eq!("mutate".parse(), Ok(MutationMode::Mutate));
        assert!("drop".parse::<MutationMode>().is_err());
    }

    #[test]
    fn total_duration_sums_stages() {
        let report = ScenarioReport {
            run_id: "run_1".to_string(),
            namespace: "test".to_string(),
            set: "users".to_string(),
            expected_records: 10,
            backup_records: Some(10),
            restored_records: Some(10),
            final_count: Some(10),
            stages: vec![
                StageTiming {
                    stage: ScenarioStage::Seed,
                    duration_ms: 5,
                },
                StageTiming {
                    stage: ScenarioStage::Backup,
                    duration_ms: 7,
                },
            ],
            outcome: ScenarioOutcome::Passed,
        };
        assert!(report.passed());
        assert_eq!(report.total_duration_ms(), 12);
    }
}
