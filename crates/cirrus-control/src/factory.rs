//! Agent construction per account.

use async_trait::async_trait;
use cirrus_core::{AccountCredentials, Agent, AgentError};
use std::sync::Arc;

/// Builds the full agent roster of one account.
///
/// One factory serves one provider. It typically yields one agent per
/// region and data type of the account.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    /// Name of the provider whose accounts this factory handles.
    fn provider_name(&self) -> &str;

    /// Builds every agent of `account`.
    ///
    /// An empty roster is valid; the account stays registered.
    async fn build_agents(&self, account: &AccountCredentials) -> Result<Vec<Arc<dyn Agent>>, AgentError>;
}
