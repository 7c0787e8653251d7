//! The agent contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::cache::CacheResult;
use crate::error::AgentError;

/// Unique agent identifier, e.g. `prod-east/us-east-1/ServerGroupCachingAgent`.
pub type AgentType = String;

/// Merge authority of a namespace an agent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    /// A refresh from the agent fully replaces its previous contribution.
    Authoritative,
    /// Supplemental data, merged additively and never evicting.
    Informative,
}

impl Authority {
    /// Returns true for [`Authority::Authoritative`].
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Authoritative)
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative => write!(f, "authoritative"),
            Self::Informative => write!(f, "informative"),
        }
    }
}

/// A namespace an agent provides, together with its authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentDataType {
    /// Cache namespace, e.g. `serverGroups`.
    pub namespace: String,
    /// How writes into the namespace are merged.
    pub authority: Authority,
}

impl AgentDataType {
    /// An authoritative data type for `namespace`.
    #[must_use]
    pub fn authoritative(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            authority: Authority::Authoritative,
        }
    }

    /// An informative data type for `namespace`.
    #[must_use]
    pub fn informative(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            authority: Authority::Informative,
        }
    }
}

/// Per-agent scheduling override.
///
/// An agent that knows its own expected run length reports one of these.
/// A zero `interval` is treated as "no override".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalOverride {
    /// Poll interval after a successful run.
    pub interval: Duration,
    /// Poll interval after a failed run; defaults to `interval`.
    pub error_interval: Option<Duration>,
}

impl IntervalOverride {
    /// An override with the same interval after success and failure.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            error_interval: None,
        }
    }

    /// Sets a distinct error interval.
    #[must_use]
    pub const fn with_error_interval(mut self, error_interval: Duration) -> Self {
        self.error_interval = Some(error_interval);
        self
    }
}

/// One unit of schedulable work.
///
/// Implementations poll a single external resource (an account/region/data
/// type combination) and return everything they observed as a [`CacheResult`].
/// `execute` must not write anywhere itself: the scheduler merges the returned
/// result in one step, so an abandoned run leaves no partial state behind.
/// Because a lease can expire under a slow run, the same agent may execute
/// concurrently on two nodes; the result must be safe to merge twice.
#[async_trait]
pub trait Agent: Send + Sync + fmt::Debug {
    /// Unique identifier, also used as the distributed lock key.
    fn agent_type(&self) -> &str;

    /// Owning provider, e.g. `aws` or `kubernetes`.
    fn provider_name(&self) -> &str;

    /// Account the agent was built for.
    fn account_name(&self) -> &str;

    /// Namespaces this agent writes and their authority.
    fn provided_data_types(&self) -> &[AgentDataType];

    /// Optional interval override; `None` uses the node default.
    fn interval_override(&self) -> Option<IntervalOverride> {
        None
    }

    /// Polls the external resource.
    async fn execute(&self) -> Result<CacheResult, AgentError>;
}
