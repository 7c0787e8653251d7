//! Common test utilities for scheduler integration tests.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use cirrus_cache::{MemoryCacheStore, ProviderCache};
use cirrus_scheduler::{AgentScheduler, DistributedAgentLock, NodeIdentity, SchedulerConfig};
use cirrus_state::{LockError, LockRecord, LockStore, MemoryLockStore};
use std::sync::Arc;
use std::time::Duration;

/// Node identity with a fixed token.
#[derive(Debug)]
pub struct StaticIdentity(pub String);

#[async_trait]
impl NodeIdentity for StaticIdentity {
    async fn node_identity(&self) -> String {
        self.0.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }
}

/// Lock store that is always unreachable.
#[derive(Debug, Default)]
pub struct UnreachableLockStore;

#[async_trait]
impl LockStore for UnreachableLockStore {
    async fn set_if_vacant(&self, _key: &str, _owner: &str, _ttl: Duration) -> Result<bool, LockError> {
        Err(LockError::Connection("connection refused".to_owned()))
    }

    async fn set_ttl_if_owner(&self, _key: &str, _owner: &str, _ttl: Duration) -> Result<bool, LockError> {
        Err(LockError::Connection("connection refused".to_owned()))
    }

    async fn get(&self, _key: &str) -> Result<Option<LockRecord>, LockError> {
        Err(LockError::Connection("connection refused".to_owned()))
    }
}

/// `interval = 10s`, `error_interval = 3s`, `timeout = 20s`.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        interval_secs: 10,
        error_interval_secs: Some(3),
        timeout_secs: Some(20),
        ..SchedulerConfig::default()
    }
}

/// Simulated fleet sharing one lock store and one cache store.
pub struct TestCluster {
    pub lock_store: Arc<MemoryLockStore>,
    pub cache_store: Arc<MemoryCacheStore>,
}

impl TestCluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self {
            lock_store: Arc::new(MemoryLockStore::new()),
            cache_store: Arc::new(MemoryCacheStore::new()),
        }
    }

    /// Starts a node named `name` with `config`.
    pub fn node(&self, name: &str, config: &SchedulerConfig) -> AgentScheduler {
        AgentScheduler::new(
            config,
            self.lock_store.clone(),
            Arc::new(StaticIdentity(name.to_owned())),
            ProviderCache::new(self.cache_store.clone()),
        )
        .unwrap()
    }

    /// Direct access to the shared agent lock, as another node would see it.
    pub fn lock(&self) -> DistributedAgentLock {
        DistributedAgentLock::new(self.lock_store.clone())
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}
