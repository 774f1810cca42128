//! Container and pod log collectors.
//!
//! Both run the `docker` / `kubectl` CLIs through a [`ProcessRunner`] so they
//! share timeouts, cancellation and test doubles with every other tool.

use backup_harness_ports::{CommandSpec, LoggerPort, ProcessRunner, log_fields};
use backup_harness_shared::dedup::TAIL_WINDOW_CHARS;
use backup_harness_shared::{
    ErrorCode, ErrorEnvelope, LOG_PART_CHARS, PrintedLogCache, RequestContext, Result,
    split_for_logging,
};
use std::sync::{Arc, Mutex, PoisonError};

/// Lines taken as the baseline of a container log.
pub const BASELINE_TAIL_LINES: u32 = 30;

async fn run_text(
    runner: &dyn ProcessRunner,
    ctx: &RequestContext,
    spec: CommandSpec,
    failure: &'static str,
) -> Result<String> {
    let display = spec.display();
    let output = runner.run(ctx, spec).await?;
    if !output.success() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("logs", failure),
            format!("log command exited with code {}", output.exit_code),
        )
        .with_metadata("command", display)
        .with_output_tail(&output.combined()));
    }
    Ok(output.stdout)
}

/// Remembers the end of a container log so later reads return only new output.
pub struct DockerLogBaseline {
    runner: Arc<dyn ProcessRunner>,
    container: String,
    baseline: String,
}

impl DockerLogBaseline {
    /// Take `docker logs --tail 30 <container>` as the baseline.
    pub async fn capture(
        runner: Arc<dyn ProcessRunner>,
        ctx: &RequestContext,
        container: impl Into<String>,
    ) -> Result<Self> {
        let container = container.into();
        let spec = CommandSpec::argv([
            "docker".to_string(),
            "logs".to_string(),
            "--tail".to_string(),
            BASELINE_TAIL_LINES.to_string(),
            container.clone(),
        ]);
        let baseline = run_text(runner.as_ref(), ctx, spec, "docker_logs_failed").await?;
        Ok(Self {
            runner,
            container,
            baseline: baseline.trim_end().to_string(),
        })
    }

    /// Container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Log written after the baseline.
    ///
    /// When the baseline is no longer found (log rotated or container
    /// restarted) the full current log is returned.
    pub async fn read_new(&self, ctx: &RequestContext) -> Result<String> {
        let spec = CommandSpec::argv(["docker", "logs", self.container.as_str()]);
        let full = run_text(self.runner.as_ref(), ctx, spec, "docker_logs_failed").await?;
        Ok(after_baseline(&full, &self.baseline).to_string())
    }
}

fn after_baseline<'a>(full: &'a str, baseline: &str) -> &'a str {
    if baseline.is_empty() {
        return full;
    }
    full.rfind(baseline)
        .and_then(|position| full.get(position + baseline.len()..))
        .map_or(full, |rest| rest.trim_start_matches('\n'))
}

/// Prints warning and error pod logs once.
pub struct PodLogWatcher {
    runner: Arc<dyn ProcessRunner>,
    logger: Arc<dyn LoggerPort>,
    namespace: String,
    printed: Mutex<PrintedLogCache>,
}

impl PodLogWatcher {
    /// Watch the pods of one Kubernetes namespace.
    #[must_use]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        logger: Arc<dyn LoggerPort>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            logger,
            namespace: namespace.into(),
            printed: Mutex::new(PrintedLogCache::default()),
        }
    }

    async fn pod_names(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let spec = CommandSpec::argv([
            "kubectl",
            "get",
            "pods",
            "-n",
            self.namespace.as_str(),
            "-o",
            "name",
        ]);
        let listing = run_text(self.runner.as_ref(), ctx, spec, "kubectl_failed").await?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.trim_start_matches("pod/").to_string())
            .collect())
    }

    /// Print pods whose recent log mentions `ERROR` or `WARN` and was not printed yet.
    ///
    /// Returns the names of the pods that were printed.
    pub async fn print_new_problems(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let mut printed = Vec::new();
        for pod in self.pod_names(ctx).await? {
            ctx.ensure_not_cancelled("pod_logs.print_new_problems")?;
            let spec = CommandSpec::argv([
                "kubectl",
                "logs",
                "-n",
                self.namespace.as_str(),
                pod.as_str(),
            ]);
            let logs = run_text(self.runner.as_ref(), ctx, spec, "kubectl_failed").await?;
            let recent = tail_chars(&logs, TAIL_WINDOW_CHARS);
            if !(recent.contains("ERROR") || recent.contains("WARN")) {
                continue;
            }
            let is_new = self
                .printed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert_if_new(&logs);
            if !is_new {
                continue;
            }
            for (index, part) in split_for_logging(recent, LOG_PART_CHARS).iter().enumerate() {
                self.logger.warn(
                    "pod_logs.problem",
                    part,
                    Some(log_fields([
                        ("pod", serde_json::Value::from(pod.as_str())),
                        ("part", serde_json::Value::from(index)),
                    ])),
                );
            }
            printed.push(pod);
        }
        Ok(printed)
    }
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    text.char_indices()
        .nth(count - max_chars)
        .and_then(|(offset, _)| text.get(offset..))
        .unwrap_or(text)
}
