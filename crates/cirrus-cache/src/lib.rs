//! Shared provider cache, write side.
//!
//! Agent runs produce a [`CacheResult`](cirrus_core::CacheResult); the
//! [`ProviderCache`] turns it into one atomic [`CacheBatch`] and hands it to a
//! [`CacheStore`]. Every stored entry remembers which agent contributed it, so
//! that:
//!
//! - **Authoritative** writes replace everything the same agent previously
//!   wrote into the namespace, evicting stale ids
//! - **Informative** writes are purely additive and never evict anything
//!
//! Reads see a merged view of every contribution per id.

pub mod error;
pub mod memory;
pub mod provider;
pub mod store;

pub use error::{CacheError, Result};
pub use memory::MemoryCacheStore;
pub use provider::ProviderCache;
pub use store::{CacheBatch, CacheStore, MergeStats, NamespaceWrite};
