use std::sync::Arc;

use tracing::info;

use crate::config::LockConfig;
use crate::error::StateError;
use crate::traits::LockStore;

#[cfg(feature = "memory")]
use crate::memory::MemoryLockStore;

#[cfg(feature = "valkey")]
use crate::valkey::ValkeyLockStore;

/// Builds the lock store named by `config`.
pub async fn lock_store_from_config(config: &LockConfig) -> Result<Arc<dyn LockStore>, StateError> {
    match config {
        #[cfg(feature = "memory")]
        LockConfig::Memory => {
            info!(backend = "memory", "lock store ready; leases are local to this process");
            Ok(Arc::new(MemoryLockStore::new()))
        }

        #[cfg(feature = "valkey")]
        LockConfig::Valkey {
            url,
            namespace,
            pool_size,
        } => {
            let store = ValkeyLockStore::new(url, namespace.clone(), *pool_size)
                .await
                .map_err(|e| StateError::Connection(e.to_string()))?;
            info!(backend = "valkey", namespace = ?namespace, "lock store ready");
            Ok(Arc::new(store))
        }

        #[allow(unreachable_patterns)]
        _ => Err(StateError::UnsupportedBackend(
            "No suitable lock backend enabled".to_string(),
        )),
    }
}
