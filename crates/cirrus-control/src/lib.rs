//! Cirrus control - account lifecycle for a caching node.
//!
//! Configured accounts come from an [`AccountSource`]. Each registered
//! [`AgentProvider`] owns an [`AgentFactory`] and the immutable [`AgentSet`]
//! it built. The [`AccountLifecycleSynchronizer`] diffs the configured
//! accounts against the [`CredentialsRepository`], builds replacement agents
//! and swaps each provider's roster in one step:
//!
//! ```text
//! configured ──▶ diff ──▶ build all ──▶ unschedule stale ──▶ swap ──▶ schedule fresh
//!                              │
//!                              ▼
//!                        abort, keep old sets
//! ```
//!
//! Until a provider has an [`AgentScheduler`](cirrus_scheduler::AgentScheduler)
//! attached, synchronisation only builds rosters.

pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod inventory;
pub mod provider;
pub mod roster;
pub mod source;
pub mod sync;

pub use config::{NodeConfig, SyncConfig};
pub use credentials::{CredentialsRepository, MemoryCredentialsRepository};
pub use error::{ControlError, ControlResult};
pub use factory::AgentFactory;
pub use inventory::{AccountInventoryAgent, AccountInventoryFactory, ACCOUNTS_NAMESPACE};
pub use provider::AgentProvider;
pub use roster::AgentSet;
pub use source::{AccountSource, FileAccountSource, StaticAccountSource};
pub use sync::{AccountLifecycleSynchronizer, SyncReport};
