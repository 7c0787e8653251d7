//! Cluster-wide agent lock.

use chrono::{DateTime, TimeDelta, Utc};
use cirrus_state::{LockError, LockStore};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_KEY_PREFIX: &str = "agent";

/// A live agent lease as observed in the lock store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLock {
    /// Locked agent.
    pub agent_type: String,
    /// Node identity of the holder.
    pub owner: String,
    /// Wall-clock time at which the lease lapses.
    pub expires_at: DateTime<Utc>,
}

/// Leased mutual exclusion per agent type.
///
/// A lease is granted only when no live lease exists and lasts exactly
/// `lease`. There is no release: a holder whose run completes may only reset
/// the remaining lease with [`reset_lease`](Self::reset_lease), and a holder
/// that crashes or overruns loses the lease when it expires.
#[derive(Clone)]
pub struct DistributedAgentLock {
    store: Arc<dyn LockStore>,
    key_prefix: String,
}

impl DistributedAgentLock {
    /// Creates a lock over `store`.
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self::with_key_prefix(store, DEFAULT_KEY_PREFIX)
    }

    /// Creates a lock whose keys are `{prefix}:{agent_type}`.
    pub fn with_key_prefix(store: Arc<dyn LockStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, agent_type: &str) -> String {
        format!("{}:{}", self.key_prefix, agent_type)
    }

    /// Attempts to take the lease for `agent_type`.
    ///
    /// `Ok(false)` means another owner holds a live lease.
    pub async fn try_acquire(&self, agent_type: &str, owner: &str, lease: Duration) -> Result<bool, LockError> {
        self.store.set_if_vacant(&self.key(agent_type), owner, lease).await
    }

    /// Makes the live lease of `owner` lapse `lease` from now.
    ///
    /// `Ok(false)` means the lease already lapsed or belongs to someone else.
    pub async fn reset_lease(&self, agent_type: &str, owner: &str, lease: Duration) -> Result<bool, LockError> {
        self.store.set_ttl_if_owner(&self.key(agent_type), owner, lease).await
    }

    /// Current holder of `agent_type`, if its lease is live.
    pub async fn holder(&self, agent_type: &str) -> Result<Option<AgentLock>, LockError> {
        let record = self.store.get(&self.key(agent_type)).await?;
        Ok(record.map(|record| AgentLock {
            agent_type: agent_type.to_owned(),
            expires_at: TimeDelta::from_std(record.remaining)
                .ok()
                .and_then(|remaining| Utc::now().checked_add_signed(remaining))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            owner: record.owner,
        }))
    }
}

impl std::fmt::Debug for DistributedAgentLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedAgentLock")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
