use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::LockError;
use crate::traits::LockStore;
use crate::types::LockRecord;

#[derive(Debug, Clone)]
struct LockEntry {
    owner: String,
    expires_at: Instant,
}

/// In-process lock store.
///
/// Clones share the same table, so several simulated nodes can race on one
/// store in tests. Expiry follows the tokio clock, which makes it controllable
/// with `tokio::time::pause`.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    locks: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired records.
    pub async fn purge_expired(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();
        let before = locks.len();
        locks.retain(|_, entry| entry.expires_at > now);
        before - locks.len()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_vacant(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError> {
        if ttl.is_zero() {
            return Err(LockError::InvalidLease("ttl must be positive".to_string()));
        }

        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        if let Some(entry) = locks.get(key) {
            if entry.expires_at > now {
                return Ok(false);
            }
        }

        locks.insert(
            key.to_string(),
            LockEntry {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );

        Ok(true)
    }

    async fn set_ttl_if_owner(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError> {
        if ttl.is_zero() {
            return Err(LockError::InvalidLease("ttl must be positive".to_string()));
        }

        let mut locks = self.locks.lock().await;
        let now = Instant::now();

        match locks.get_mut(key) {
            Some(entry) if entry.expires_at > now && entry.owner == owner => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<LockRecord>, LockError> {
        let locks = self.locks.lock().await;
        let now = Instant::now();

        Ok(locks.get(key).and_then(|entry| {
            (entry.expires_at > now).then(|| LockRecord {
                owner: entry.owner.clone(),
                remaining: entry.expires_at - now,
            })
        }))
    }
}
