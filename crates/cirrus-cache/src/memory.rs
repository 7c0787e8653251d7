//! In-memory cache store.

use async_trait::async_trait;
use cirrus_core::{Attributes, Authority, CacheData, Relationships};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::store::{CacheBatch, CacheStore, MergeStats, NamespaceWrite};

/// One agent's contribution to an entity.
#[derive(Debug, Clone)]
struct Contribution {
    authority: Authority,
    attributes: Attributes,
    relationships: Relationships,
    digest: String,
}

/// All contributions to one id, keyed by source agent.
#[derive(Debug, Clone, Default)]
struct StoredItem {
    contributions: BTreeMap<String, Contribution>,
}

impl StoredItem {
    /// Informative contributions are laid down first so authoritative
    /// attributes win on key conflicts. Relationships are unioned.
    fn merged(&self, id: &str) -> CacheData {
        let mut data = CacheData::new(id);
        let ordered = self
            .contributions
            .values()
            .filter(|c| !c.authority.is_authoritative())
            .chain(self.contributions.values().filter(|c| c.authority.is_authoritative()));

        for contribution in ordered {
            data.attributes.extend(
                contribution
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            for (namespace, ids) in &contribution.relationships {
                data.relationships
                    .entry(namespace.clone())
                    .or_default()
                    .extend(ids.iter().cloned());
            }
        }

        data
    }
}

type Namespace = BTreeMap<String, StoredItem>;

/// Cache store held in process memory.
///
/// A whole [`CacheBatch`] is applied under one write lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids in `namespace` that `source` currently contributes to.
    pub async fn contributed_by(&self, namespace: &str, source: &str) -> Vec<String> {
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .map(|ns| {
                ns.iter()
                    .filter(|(_, item)| item.contributions.contains_key(source))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn digest(data: &CacheData) -> Result<String> {
    let bytes = serde_json::to_vec(&(&data.attributes, &data.relationships))?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}

fn apply_write(ns: &mut Namespace, source: &str, write: NamespaceWrite) -> Result<MergeStats> {
    let mut stats = MergeStats::default();
    let mut seen = BTreeSet::new();

    for item in write.items {
        let digest = digest(&item)?;
        seen.insert(item.id.clone());
        let stored = ns.entry(item.id).or_default();

        let unchanged = stored
            .contributions
            .get(source)
            .is_some_and(|c| c.digest == digest && c.authority == write.authority);
        if unchanged {
            stats.skipped += 1;
            continue;
        }

        stored.contributions.insert(
            source.to_owned(),
            Contribution {
                authority: write.authority,
                attributes: item.attributes,
                relationships: item.relationships,
                digest,
            },
        );
        stats.written += 1;
    }

    if write.authority.is_authoritative() {
        for (id, stored) in ns.iter_mut() {
            if !seen.contains(id) && stored.contributions.remove(source).is_some() {
                stats.evicted += 1;
            }
        }
        ns.retain(|_, stored| !stored.contributions.is_empty());
    }

    Ok(stats)
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn apply(&self, batch: CacheBatch) -> Result<MergeStats> {
        let mut namespaces = self.namespaces.write().await;
        let mut stats = MergeStats::default();

        for write in batch.writes {
            let ns = namespaces.entry(write.namespace.clone()).or_default();
            stats += apply_write(ns, &batch.source, write)?;
        }

        for (namespace, ids) in &batch.evictions {
            let Some(ns) = namespaces.get_mut(namespace) else {
                continue;
            };
            for id in ids {
                let removed = ns
                    .get_mut(id)
                    .and_then(|stored| stored.contributions.remove(&batch.source));
                if removed.is_some() {
                    stats.evicted += 1;
                }
            }
            ns.retain(|_, stored| !stored.contributions.is_empty());
        }

        namespaces.retain(|_, ns| !ns.is_empty());
        Ok(stats)
    }

    async fn get_all(&self, namespace: &str) -> Result<Vec<CacheData>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.iter().map(|(id, item)| item.merged(id)).collect())
            .unwrap_or_default())
    }

    async fn get(&self, namespace: &str, id: &str) -> Result<Option<CacheData>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|ns| ns.get(id))
            .map(|item| item.merged(id)))
    }

    async fn identifiers(&self, namespace: &str) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}
