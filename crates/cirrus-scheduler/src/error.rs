//! Error types for the scheduler.

use thiserror::Error;

/// Scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Agent already has a running schedule on this node.
    #[error("agent already scheduled: {0}")]
    AgentAlreadyScheduled(String),

    /// Scheduler was shut down.
    #[error("scheduler is shut down")]
    ShutDown,

    /// Agent has no schedule on this node.
    #[error("agent not scheduled: {0}")]
    AgentNotScheduled(String),

    /// Invalid enabled-agent pattern.
    #[error("invalid agent pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
