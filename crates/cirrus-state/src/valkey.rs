//! Valkey/Redis adapter for the lock store.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis;
use deadpool_redis::{Config, Pool, Runtime};

use crate::error::LockError;
use crate::traits::LockStore;
use crate::types::LockRecord;

/// Resets the TTL only while `ARGV[1]` still owns the key.
const TTL_IF_OWNER: &str = "if redis.call('get', KEYS[1]) == ARGV[1] then \
     return redis.call('set', KEYS[1], ARGV[1], 'PX', ARGV[2], 'XX') \
     else return nil end";

fn ttl_millis(ttl: Duration) -> Result<u64, LockError> {
    let millis = u64::try_from(ttl.as_millis())
        .map_err(|_| LockError::InvalidLease(format!("ttl {ttl:?} out of range")))?;
    if millis == 0 {
        return Err(LockError::InvalidLease("ttl must be at least 1ms".to_string()));
    }
    Ok(millis)
}

/// Valkey/Redis lock store.
///
/// Acquisition is a single `SET key owner NX PX ttl`, so the vacancy check
/// and the write cannot interleave with another node's attempt.
#[derive(Clone)]
pub struct ValkeyLockStore {
    pool: Pool,
    namespace: Option<String>,
}

impl ValkeyLockStore {
    /// Create a new Valkey lock store.
    pub async fn new(url: &str, namespace: Option<String>, pool_size: usize) -> Result<Self, LockError> {
        let config = Config::from_url(url);
        let pool = config
            .builder()
            .map_err(|e| LockError::Connection(e.to_string()))?
            .max_size(pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| LockError::Connection(e.to_string()))?;

        // Test the connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        Ok(Self { pool, namespace })
    }

    fn lock_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:lock:{}", ns, key),
            None => format!("lock:{}", key),
        }
    }
}

#[async_trait]
impl LockStore for ValkeyLockStore {
    async fn set_if_vacant(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError> {
        let millis = ttl_millis(ttl)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        // SET key owner NX PX millis
        let result: Option<String> = redis::cmd("SET")
            .arg(self.lock_key(key))
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn set_ttl_if_owner(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, LockError> {
        let millis = ttl_millis(ttl)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        let result: Option<String> = redis::Script::new(TTL_IF_OWNER)
            .key(self.lock_key(key))
            .arg(owner)
            .arg(millis)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<LockRecord>, LockError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        let lock_key = self.lock_key(key);
        let (owner, pttl): (Option<String>, i64) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&lock_key)
            .cmd("PTTL")
            .arg(&lock_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        // PTTL is -2 for a missing key and -1 for a key without expiry.
        Ok(owner.and_then(|owner| {
            u64::try_from(pttl).ok().map(|ms| LockRecord {
                owner,
                remaining: Duration::from_millis(ms),
            })
        }))
    }
}

impl std::fmt::Debug for ValkeyLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyLockStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
