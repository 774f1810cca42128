//! In-memory adapter implementations for port contracts.
//!
//! These implementations are intended for:
//! - Unit/integration tests
//! - Deterministic contract tests for the ports layer
//! - Scenario runs without a cluster or backup service

use backup_harness_ports::{
    BackupServicePort, BoxFuture, ClusterPort, JobDetails, JobStatus, LogEvent, LogFields,
    LoggerPort, RecordBins, RestoreJobStatus, SeedRequest,
};
use backup_harness_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// Logger keeping every event; children share the same store.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base_fields: LogFields,
}

impl RecordingLogger {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn events(&self) -> Vec<LogEvent> {
        lock(&self.events).clone()
    }

    /// Event names logged so far.
    pub fn event_names(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|event| event.event.to_string())
            .collect()
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base_fields.is_empty() {
            let mut fields = self.base_fields.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        lock(&self.events).push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base_fields = self.base_fields.clone();
        base_fields.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base_fields,
        })
    }
}

type SetKey = (String, String);

/// Bins the in-memory cluster stores for a seeded key.
///
/// The value depends on the object size, so re-seeding a range with another
/// size changes every record in it.
pub fn seeded_bins(key: u64, object_size: Option<u32>) -> RecordBins {
    let value = object_size.map_or_else(|| format!("I:{key}"), |size| format!("B{size}:{key}"));
    RecordBins::from([("testbin".to_string(), serde_json::Value::from(value))])
}

/// Cluster holding records per namespace and set.
#[derive(Debug)]
pub struct InMemoryCluster {
    sets: Mutex<BTreeMap<SetKey, BTreeMap<u64, RecordBins>>>,
    seeds: Mutex<Vec<SeedRequest>>,
    replication_factor: u64,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self {
            sets: Mutex::default(),
            seeds: Mutex::default(),
            replication_factor: 1,
        }
    }
}

impl InMemoryCluster {
    /// Empty cluster with replication factor 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `factor` as the replication factor of every namespace.
    #[must_use]
    pub fn with_replication_factor(mut self, factor: u64) -> Self {
        self.replication_factor = factor;
        self
    }

    /// Write keys `start..start + count` with their default seeded bins,
    /// overwriting existing records; returns how many keys were new.
    pub fn insert_range(&self, namespace: &str, set: &str, start: u64, count: u64) -> u64 {
        self.write_range(namespace, set, start, count, None)
    }

    fn write_range(
        &self,
        namespace: &str,
        set: &str,
        start: u64,
        count: u64,
        object_size: Option<u32>,
    ) -> u64 {
        let mut sets = lock(&self.sets);
        let records = sets
            .entry((namespace.to_string(), set.to_string()))
            .or_default();
        (start..start.saturating_add(count))
            .map(|key| u64::from(records.insert(key, seeded_bins(key, object_size)).is_none()))
            .sum()
    }

    /// Records currently in a set.
    pub fn count(&self, namespace: &str, set: &str) -> u64 {
        lock(&self.sets)
            .get(&(namespace.to_string(), set.to_string()))
            .map_or(0, |records| records.len() as u64)
    }

    /// Bins of one record.
    pub fn record(&self, namespace: &str, set: &str, key: u64) -> Option<RecordBins> {
        lock(&self.sets)
            .get(&(namespace.to_string(), set.to_string()))
            .and_then(|records| records.get(&key).cloned())
    }

    /// Seed requests received so far.
    pub fn seeds(&self) -> Vec<SeedRequest> {
        lock(&self.seeds).clone()
    }
}

impl ClusterPort for InMemoryCluster {
    fn seed(&self, ctx: &RequestContext, request: SeedRequest) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.seed")?;
            self.write_range(
                &request.namespace,
                &request.set,
                request.start_key,
                request.records,
                request.object_size,
            );
            lock(&self.seeds).push(request);
            Ok(())
        })
    }

    fn truncate_set(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let key = (namespace.to_string(), set.to_string());
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.truncate_set")?;
            lock(&self.sets).remove(&key);
            Ok(())
        })
    }

    fn read_record(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
        key: u64,
    ) -> BoxFuture<'_, Result<Option<RecordBins>>> {
        let ctx = ctx.clone();
        let (namespace, set) = (namespace.to_string(), set.to_string());
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.read_record")?;
            Ok(self.record(&namespace, &set, key))
        })
    }

    fn set_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let (namespace, set) = (namespace.to_string(), set.to_string());
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.set_object_count")?;
            Ok(self.count(&namespace, &set))
        })
    }

    fn namespace_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let namespace = namespace.to_string();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.namespace_object_count")?;
            Ok(lock(&self.sets)
                .iter()
                .filter(|((ns, _), _)| *ns == namespace)
                .map(|(_, records)| records.len() as u64)
                .sum())
        })
    }

    fn replication_factor(
        &self,
        ctx: &RequestContext,
        _namespace: &str,
    ) -> BoxFuture<'_, Result<u64>> {
        let ctx = ctx.clone();
        let factor = self.replication_factor;
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.replication_factor")?;
            Ok(factor)
        })
    }
}

/// Backup service whose job statuses follow a script.
///
/// Each status query consumes the next scripted status; the last one
/// repeats forever.
#[derive(Debug, Default)]
pub struct InMemoryBackupService {
    jobs: Mutex<HashMap<String, VecDeque<JobStatus>>>,
    restores: Mutex<HashMap<String, VecDeque<JobStatus>>>,
    get_job_failures: Mutex<u32>,
    cancelled: Mutex<Vec<String>>,
    resumed: Mutex<Vec<String>>,
}

fn next_status(
    script: &Mutex<HashMap<String, VecDeque<JobStatus>>>,
    job_id: &str,
) -> Result<JobStatus> {
    let mut script = lock(script);
    let statuses = script.get_mut(job_id).ok_or_else(|| {
        ErrorEnvelope::expected(ErrorCode::not_found(), format!("unknown job {job_id}"))
    })?;
    let status = if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().cloned()
    };
    status.ok_or_else(|| {
        ErrorEnvelope::expected(ErrorCode::not_found(), format!("no status for job {job_id}"))
    })
}

impl InMemoryBackupService {
    /// Service without jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses returned by successive `get_job` calls.
    pub fn script_job<I>(&self, job_id: &str, statuses: I)
    where
        I: IntoIterator<Item = JobStatus>,
    {
        lock(&self.jobs).insert(job_id.to_string(), statuses.into_iter().collect());
    }

    /// Statuses returned by successive `restore_status` calls.
    pub fn script_restore<I>(&self, job_id: &str, statuses: I)
    where
        I: IntoIterator<Item = JobStatus>,
    {
        lock(&self.restores).insert(job_id.to_string(), statuses.into_iter().collect());
    }

    /// Make the next `count` `get_job` calls fail with a retriable error.
    pub fn fail_next_get_jobs(&self, count: u32) {
        *lock(&self.get_job_failures) = count;
    }

    /// Jobs cancelled so far.
    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }

    /// Jobs resumed so far.
    pub fn resumed(&self) -> Vec<String> {
        lock(&self.resumed).clone()
    }

    fn take_failure(&self) -> bool {
        let mut failures = lock(&self.get_job_failures);
        if *failures == 0 {
            return false;
        }
        *failures -= 1;
        true
    }
}

impl BackupServicePort for InMemoryBackupService {
    fn get_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<JobDetails>> {
        let ctx = ctx.clone();
        let job_id = job_id.to_string();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.get_job")?;
            if self.take_failure() {
                return Err(crate::errors::unavailable_error());
            }
            let status = next_status(&self.jobs, &job_id)?;
            Ok(JobDetails {
                error: (status == JobStatus::Failed).then(|| "job failed".to_string()),
                id: job_id,
                status,
                job_type: None,
            })
        })
    }

    fn cancel_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let job_id = job_id.to_string();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.cancel_job")?;
            lock(&self.cancelled).push(job_id);
            Ok(())
        })
    }

    fn resume_job(&self, ctx: &RequestContext, job_id: &str) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        let job_id = job_id.to_string();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.resume_job")?;
            lock(&self.resumed).push(job_id);
            Ok(())
        })
    }

    fn restore_status(
        &self,
        ctx: &RequestContext,
        job_id: &str,
    ) -> BoxFuture<'_, Result<RestoreJobStatus>> {
        let ctx = ctx.clone();
        let job_id = job_id.to_string();
        Box::pin(async move {
            ctx.ensure_not_cancelled("in_memory.restore_status")?;
            let status = next_status(&self.restores, &job_id)?;
            Ok(RestoreJobStatus {
                error: (status == JobStatus::Failed).then(|| "restore failed".to_string()),
                status,
                read_records: 0,
                inserted_records: 0,
                existed_records: 0,
                skipped_records: 0,
                ignored_records: 0,
                fresher_records: 0,
                expired_records: 0,
                total_bytes: 0,
                index_count: 0,
                udf_count: 0,
            })
        })
    }
}
