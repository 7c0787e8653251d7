use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;
use crate::types::LockRecord;

/// Shared store backing the distributed agent lock.
///
/// Only compare-and-set writes are exposed. There is no delete: a record
/// disappears when its TTL runs out.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Writes `owner` under `key` with `ttl` if no live record exists.
    ///
    /// Returns `false` when another record is still live. The check and the
    /// write are a single atomic step.
    async fn set_if_vacant(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Replaces the TTL of the live record under `key` if `owner` holds it.
    ///
    /// Returns `false` when the record has lapsed or belongs to someone else.
    async fn set_ttl_if_owner(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Reads the live record under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<LockRecord>, LockError>;
}
