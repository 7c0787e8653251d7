//! Error types for cirrus-control.

use cirrus_core::AgentError;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while reconciling accounts.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Building the agents of an account failed; the synchronisation aborted.
    #[error("failed to build agents for {provider} account {account}: {source}")]
    AgentBuild {
        /// Provider owning the account.
        provider: String,
        /// Account name.
        account: String,
        /// Underlying failure.
        #[source]
        source: AgentError,
    },

    /// The same account name is configured more than once.
    #[error("account configured more than once: {0}")]
    DuplicateAccount(String),

    /// No provider is registered under this name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Reading the account configuration failed.
    #[error("account source error: {0}")]
    AccountSource(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<figment::Error> for ControlError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}
