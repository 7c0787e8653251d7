mod error;
mod traits;
mod types;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "valkey")]
mod valkey;

#[cfg(feature = "config")]
mod config;

#[cfg(feature = "config")]
mod provider;

pub use error::{LockError, StateError};
pub use traits::LockStore;
pub use types::LockRecord;

#[cfg(feature = "memory")]
pub use memory::MemoryLockStore;

#[cfg(feature = "valkey")]
pub use valkey::ValkeyLockStore;

#[cfg(feature = "config")]
pub use config::LockConfig;

#[cfg(feature = "config")]
pub use provider::lock_store_from_config;
