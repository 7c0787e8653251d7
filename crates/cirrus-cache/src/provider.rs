//! Provider cache: turns agent results into store batches.

use cirrus_core::{AgentDataType, Authority, CacheData, CacheResult};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{CacheBatch, CacheStore, MergeStats, NamespaceWrite};

/// Write side of the shared cache.
///
/// Resolves the authority of every namespace in a result from the producing
/// agent's declared data types and merges the whole result in one batch.
#[derive(Clone)]
pub struct ProviderCache {
    store: Arc<dyn CacheStore>,
}

impl ProviderCache {
    /// Creates a provider cache over `store`.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Merges one agent run into the cache.
    ///
    /// - Namespaces declared authoritative replace the agent's previous
    ///   contribution; one missing from `result` is an empty refresh.
    /// - Namespaces declared informative are added to.
    /// - Namespaces not declared at all are written informative.
    /// - A namespace declared twice is authoritative if either declaration is.
    pub async fn put_cache_result(
        &self,
        source: &str,
        data_types: &[AgentDataType],
        result: CacheResult,
    ) -> Result<MergeStats> {
        let declared = declared_namespaces(data_types);

        let (mut data, evictions) = result.into_parts();
        let mut batch = CacheBatch::new(source);

        for &(namespace, authority) in &declared {
            let items = data.remove(namespace).unwrap_or_default();
            if items.is_empty() && !authority.is_authoritative() {
                continue;
            }
            batch.writes.push(NamespaceWrite {
                namespace: namespace.to_owned(),
                authority,
                items,
            });
        }

        for (namespace, items) in data {
            if !declared.iter().any(|(declared, _)| *declared == namespace) {
                warn!(
                    agent_type = %source,
                    namespace = %namespace,
                    "agent wrote undeclared namespace, merging as informative"
                );
            }
            batch.writes.push(NamespaceWrite {
                namespace,
                authority: Authority::Informative,
                items,
            });
        }
        batch.evictions = evictions;

        let stats = self.store.apply(batch).await?;
        debug!(
            agent_type = %source,
            written = stats.written,
            skipped = stats.skipped,
            evicted = stats.evicted,
            "cache result merged"
        );
        Ok(stats)
    }

    /// Reads back a namespace, for agents that cross-reference cached entities.
    pub async fn get_all(&self, namespace: &str) -> Result<Vec<CacheData>> {
        self.store.get_all(namespace).await
    }
}

/// Declared namespaces in declaration order, one entry each.
fn declared_namespaces(data_types: &[AgentDataType]) -> Vec<(&str, Authority)> {
    let mut declared: Vec<(&str, Authority)> = Vec::with_capacity(data_types.len());
    for data_type in data_types {
        match declared
            .iter_mut()
            .find(|(namespace, _)| *namespace == data_type.namespace)
        {
            Some((_, authority)) => {
                if data_type.authority.is_authoritative() {
                    *authority = data_type.authority;
                }
            }
            None => declared.push((data_type.namespace.as_str(), data_type.authority)),
        }
    }
    declared
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheStore;

    fn cache() -> (ProviderCache, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        (ProviderCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn declared_authoritative_namespace_missing_from_result_is_cleared() {
        let (cache, store) = cache();
        let types = [
            AgentDataType::authoritative("serverGroups"),
            AgentDataType::authoritative("instances"),
        ];

        cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new()
                    .with_data("serverGroups", [CacheData::new("sg-1")])
                    .with_data("instances", [CacheData::new("i-1")]),
            )
            .await
            .unwrap();

        let stats = cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("serverGroups", [CacheData::new("sg-1")]),
            )
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.evicted, 1);
        assert!(store.get_all("instances").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undeclared_namespace_is_informative() {
        let (cache, store) = cache();
        let types = [AgentDataType::authoritative("instances")];

        cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("images", [CacheData::new("ami-1")]),
            )
            .await
            .unwrap();
        // A later authoritative refresh of other data leaves the informative image alone.
        cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("instances", [CacheData::new("i-1")]),
            )
            .await
            .unwrap();

        assert_eq!(store.identifiers("images").await.unwrap(), vec!["ami-1"]);
    }

    #[tokio::test]
    async fn namespace_declared_twice_is_written_once_as_authoritative() {
        let (cache, store) = cache();
        let types = [
            AgentDataType::informative("instances"),
            AgentDataType::authoritative("instances"),
        ];

        let stats = cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("instances", [CacheData::new("i-1"), CacheData::new("i-2")]),
            )
            .await
            .unwrap();

        assert_eq!(stats.written, 2);
        assert_eq!(stats.evicted, 0);
        assert_eq!(store.identifiers("instances").await.unwrap(), vec!["i-1", "i-2"]);

        // Authoritative: the next run's omission removes the item.
        cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("instances", [CacheData::new("i-2")]),
            )
            .await
            .unwrap();
        assert_eq!(store.identifiers("instances").await.unwrap(), vec!["i-2"]);
    }

    #[tokio::test]
    async fn evictions_are_forwarded() {
        let (cache, store) = cache();
        let types = [AgentDataType::informative("instances")];

        cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_data("instances", [CacheData::new("i-1"), CacheData::new("i-2")]),
            )
            .await
            .unwrap();
        let stats = cache
            .put_cache_result(
                "agent-a",
                &types,
                CacheResult::new().with_eviction("instances", "i-1"),
            )
            .await
            .unwrap();

        assert_eq!(stats.evicted, 1);
        assert_eq!(store.identifiers("instances").await.unwrap(), vec!["i-2"]);
    }
}
