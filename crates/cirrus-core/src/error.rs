//! Error types for agent execution.

use thiserror::Error;

/// Errors an agent run can end with.
///
/// All of these are transient from the scheduler's point of view: they are
/// recorded against the agent and trigger the error back-off interval.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The cloud provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The run did not complete within its timeout.
    #[error("agent execution exceeded timeout of {0:?}")]
    Timeout(std::time::Duration),

    /// The agent body panicked or was aborted.
    #[error("agent execution aborted: {0}")]
    Aborted(String),

    /// Any other failure raised by an agent body.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    /// Create a provider error.
    #[must_use]
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}
