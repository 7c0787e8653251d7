//! Cirrus scheduler - agent execution cycles and cluster coordination.
//!
//! Every node runs the same agent roster. Before each run a node races the
//! others for a leased lock on the agent, so that each agent executes on one
//! node per cycle:
//!
//! - **Intervals**: [`AgentIntervalProvider`] picks the wait, error wait and
//!   timeout of an agent
//! - **Identity**: [`NodeIdentity`] names this node as a lock owner
//! - **Locking**: [`DistributedAgentLock`] grants a lease that expires on its
//!   own, so a crashed node never blocks an agent for longer than its timeout
//! - **Execution**: [`AgentScheduler`] drives one cycle per agent and merges
//!   successful results into the [`cirrus_cache::ProviderCache`]
//!
//! # Example
//!
//! ```ignore
//! use cirrus_scheduler::{AgentScheduler, DefaultNodeIdentity, SchedulerConfig};
//!
//! let config = SchedulerConfig::default();
//! let identity = Arc::new(DefaultNodeIdentity::from_config(&config.identity).await);
//! let scheduler = AgentScheduler::new(&config, lock_store, identity, cache)?;
//! scheduler.schedule(agent)?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod interval;
pub mod lock;
pub mod scheduler;

pub use clock::{Clock, TokioClock};
pub use config::{IdentityConfig, SchedulerConfig};
pub use error::{Result, SchedulerError};
pub use health::{AgentHealth, AgentHealthTracker, AgentState};
pub use identity::{DefaultNodeIdentity, HostResolver, InterfaceHostResolver, NodeIdentity, UNKNOWN_HOST};
pub use interval::{AgentIntervalProvider, DefaultAgentIntervalProvider, Interval};
pub use lock::{AgentLock, DistributedAgentLock};
pub use scheduler::AgentScheduler;
