//! Core types for cirrus.
//!
//! This crate defines the vocabulary shared by every other cirrus crate:
//!
//! - **Agents**: units of schedulable work that poll one external resource
//! - **Cache records**: the [`CacheData`] and [`CacheResult`] an agent run produces
//! - **Accounts**: the [`AccountCredentials`] an agent roster is built from
//!
//! Agents are immutable once built. When the account that owns an agent changes,
//! the agent is dropped and a replacement is built rather than mutated.

pub mod account;
pub mod agent;
pub mod cache;
pub mod error;

pub use account::AccountCredentials;
pub use agent::{Agent, AgentDataType, AgentType, Authority, IntervalOverride};
pub use cache::{Attributes, CacheData, CacheResult, Relationships};
pub use error::AgentError;
