//! Concurrency primitives and request-scoped context.
//!
//! - `RequestContext` carries a correlation id and a cancellation token into
//!   every port call.
//! - `WaitGroupRegistry` hands out named barriers so that several suites can
//!   rendezvous (for example before a shared cluster is torn down). The
//!   registry is an ordinary value: construct it once per run and pass it to
//!   every participant.

use crate::{ErrorCode, ErrorEnvelope, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// A correlation identifier used for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Parse a correlation identifier from user input.
    ///
    /// The value is trimmed; empty values are rejected.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "correlationId must be non-empty",
            ));
        }
        Ok(Self(Arc::<str>::from(trimmed)))
    }

    /// Create a new request id, unique within this process.
    #[must_use]
    pub fn new_request_id() -> Self {
        next_scoped_id(&REQUEST_ID_COUNTER, "req_")
    }

    /// Create a new scenario run id, unique within this process.
    #[must_use]
    pub fn new_run_id() -> Self {
        next_scoped_id(&RUN_ID_COUNTER, "run_")
    }

    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_scoped_id(counter: &AtomicU64, prefix: &'static str) -> CorrelationId {
    let n = counter.fetch_add(1, Ordering::Relaxed);
    CorrelationId(Arc::<str>::from(format!("{prefix}{n}")))
}

/// A clonable cancellation token that can be awaited.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel the token and wake all current waiters.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns true if the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-scoped context passed across boundaries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Create a new request context with a fresh cancellation token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a context with an auto-generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::new_request_id())
    }

    /// Create a context sharing an existing cancellation token.
    #[must_use]
    pub const fn with_cancellation(
        correlation_id: CorrelationId,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            correlation_id,
            cancellation,
        }
    }

    /// Return the correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Return a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this request.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Await cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Return a cancellation error when cancelled, including operation metadata.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(cancelled_error(operation));
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with an error on cancellation.
    pub async fn sleep(&self, duration: Duration, operation: &'static str) -> Result<()> {
        self.ensure_not_cancelled(operation)?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = self.cancelled() => Err(cancelled_error(operation)),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}

/// A reusable named barrier.
///
/// Parties `register` up front; each party later calls `arrive_and_wait`,
/// which returns once every registered party has arrived for the current
/// phase. `arrive` lets a party signal without waiting.
#[derive(Debug)]
pub struct WaitGroup {
    name: Arc<str>,
    state: Mutex<PhaseState>,
    notify: Notify,
}

#[derive(Debug, Default, Clone, Copy)]
struct PhaseState {
    registered: usize,
    arrived: usize,
    phase: u64,
}

/// Snapshot of a wait group's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitGroupSnapshot {
    /// Parties registered for the barrier.
    pub registered: usize,
    /// Parties that arrived in the current phase.
    pub arrived: usize,
    /// Completed phases.
    pub phase: u64,
}

impl WaitGroup {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Mutex::new(PhaseState::default()),
            notify: Notify::new(),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register one more party.
    pub fn register(&self) -> WaitGroupSnapshot {
        let mut state = self.lock();
        state.registered = state.registered.saturating_add(1);
        snapshot(*state)
    }

    /// Current counters.
    #[must_use]
    pub fn snapshot(&self) -> WaitGroupSnapshot {
        snapshot(*self.lock())
    }

    /// Arrive without waiting. Returns the phase this arrival belongs to.
    pub fn arrive(&self) -> u64 {
        let mut state = self.lock();
        let phase = state.phase;
        state.arrived = state.arrived.saturating_add(1);
        if state.arrived >= state.registered {
            state.arrived = 0;
            state.phase = state.phase.saturating_add(1);
            drop(state);
            self.notify.notify_waiters();
        }
        phase
    }

    /// Arrive and wait until every registered party has arrived.
    ///
    /// Fails with a retriable `core:timeout` error after `timeout`, or with a
    /// cancellation error when the context is cancelled.
    pub async fn arrive_and_wait(
        &self,
        ctx: &RequestContext,
        timeout: Duration,
    ) -> Result<WaitGroupSnapshot> {
        ctx.ensure_not_cancelled("wait_group.arrive_and_wait")?;
        let deadline = tokio::time::Instant::now() + timeout;
        let phase = self.arrive();

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let current = self.snapshot();
            if current.phase > phase {
                return Ok(current);
            }

            tokio::select! {
                () = ctx.cancelled() => {
                    return Err(cancelled_error("wait_group.arrive_and_wait")
                        .with_metadata("group", self.name()));
                },
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ErrorEnvelope::timed_out(
                        "wait_group.arrive_and_wait",
                        format!(
                            "wait group {} did not complete: {}/{} arrived",
                            self.name(), current.arrived, current.registered
                        ),
                    )
                    .with_metadata("group", self.name()));
                },
                () = &mut notified => {},
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const fn snapshot(state: PhaseState) -> WaitGroupSnapshot {
    WaitGroupSnapshot {
        registered: state.registered,
        arrived: state.arrived,
        phase: state.phase,
    }
}

/// Registry of named wait groups shared by explicit injection.
#[derive(Debug, Default)]
pub struct WaitGroupRegistry {
    groups: Mutex<BTreeMap<String, Arc<WaitGroup>>>,
}

impl WaitGroupRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the group with this name, creating it on first use.
    pub fn group(&self, name: &str) -> Arc<WaitGroup> {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            groups
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(WaitGroup::new(name))),
        )
    }

    /// Names of all groups created so far.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        groups.keys().cloned().collect()
    }
}
