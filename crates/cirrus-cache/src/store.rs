//! Cache store contract.

use async_trait::async_trait;
use cirrus_core::{Authority, CacheData};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;

use crate::error::Result;

/// Entities written into one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceWrite {
    /// Target namespace.
    pub namespace: String,
    /// Merge authority for this write.
    pub authority: Authority,
    /// Complete set of entities (authoritative) or additions (informative).
    pub items: Vec<CacheData>,
}

/// Everything one agent run writes, applied as a single atomic merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBatch {
    /// Contributing agent type.
    pub source: String,
    /// Per-namespace writes.
    pub writes: Vec<NamespaceWrite>,
    /// Ids whose contribution from `source` is removed, keyed by namespace.
    pub evictions: BTreeMap<String, BTreeSet<String>>,
}

impl CacheBatch {
    /// Creates an empty batch for `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            writes: Vec::new(),
            evictions: BTreeMap::new(),
        }
    }
}

/// Outcome counters of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Contributions inserted or changed.
    pub written: usize,
    /// Contributions identical to what was stored.
    pub skipped: usize,
    /// Contributions removed.
    pub evicted: usize,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.skipped += rhs.skipped;
        self.evicted += rhs.evicted;
    }
}

/// Storage backend for the shared cache.
///
/// Implementations must apply a [`CacheBatch`] atomically: readers observe
/// either none or all of it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Applies a batch atomically.
    async fn apply(&self, batch: CacheBatch) -> Result<MergeStats>;

    /// Merges entities for a single namespace.
    async fn merge_cache_result(
        &self,
        source: &str,
        namespace: &str,
        authority: Authority,
        items: Vec<CacheData>,
    ) -> Result<MergeStats> {
        let mut batch = CacheBatch::new(source);
        batch.writes.push(NamespaceWrite {
            namespace: namespace.to_owned(),
            authority,
            items,
        });
        self.apply(batch).await
    }

    /// Merged view of every entity in a namespace, ordered by id.
    async fn get_all(&self, namespace: &str) -> Result<Vec<CacheData>>;

    /// Merged view of one entity.
    async fn get(&self, namespace: &str, id: &str) -> Result<Option<CacheData>>;

    /// Ids present in a namespace, ordered.
    async fn identifiers(&self, namespace: &str) -> Result<Vec<String>>;
}
