//! Database cluster boundary contract.

use crate::BoxFuture;
use backup_harness_shared::{RequestContext, Result};
use std::collections::BTreeMap;

/// Bin name to value of one record.
pub type RecordBins = BTreeMap<String, serde_json::Value>;

/// Records to write with the load generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRequest {
    /// Target namespace.
    pub namespace: String,
    /// Target set.
    pub set: String,
    /// Number of keys to write.
    pub records: u64,
    /// First key. Seeding an existing range overwrites those records.
    pub start_key: u64,
    /// Size of the single blob bin, in bytes.
    pub object_size: Option<u32>,
}

impl SeedRequest {
    /// Seed `records` keys starting at key 0.
    #[must_use]
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, records: u64) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            records,
            start_key: 0,
            object_size: None,
        }
    }

    /// Start writing at `start_key`.
    #[must_use]
    pub const fn starting_at(mut self, start_key: u64) -> Self {
        self.start_key = start_key;
        self
    }

    /// Write a single blob bin of `size` bytes instead of the default bins.
    #[must_use]
    pub const fn with_object_size(mut self, size: u32) -> Self {
        self.object_size = Some(size);
        self
    }
}

/// Boundary contract for the cluster under test.
pub trait ClusterPort: Send + Sync {
    /// Write records into a set.
    fn seed(&self, ctx: &RequestContext, request: SeedRequest) -> BoxFuture<'_, Result<()>>;

    /// Issue a truncate for one set. Completion is observed by polling counts.
    fn truncate_set(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<()>>;

    /// Bins of the record with integer key `key`, `None` when it does not exist.
    fn read_record(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
        key: u64,
    ) -> BoxFuture<'_, Result<Option<RecordBins>>>;

    /// Logical object count of one set across the cluster.
    fn set_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        set: &str,
    ) -> BoxFuture<'_, Result<u64>>;

    /// Master object count of a namespace across the cluster.
    fn namespace_object_count(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> BoxFuture<'_, Result<u64>>;

    /// Configured replication factor of a namespace.
    fn replication_factor(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> BoxFuture<'_, Result<u64>>;
}
