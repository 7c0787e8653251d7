//! Account inventory agents.
//!
//! The node ships with one built-in agent kind: per account and region it
//! publishes the account itself into the `accounts` namespace, so the cache
//! always reflects the configured fleet. Real provider integrations plug in
//! their own [`AgentFactory`].

use async_trait::async_trait;
use cirrus_core::{AccountCredentials, Agent, AgentDataType, AgentError, CacheData, CacheResult};
use std::sync::Arc;

use crate::factory::AgentFactory;

/// Namespace written by [`AccountInventoryAgent`].
pub const ACCOUNTS_NAMESPACE: &str = "accounts";

/// Region used for accounts that list none.
pub const GLOBAL_REGION: &str = "global";

/// Publishes one account/region pair into the cache.
#[derive(Debug)]
pub struct AccountInventoryAgent {
    agent_type: String,
    account: AccountCredentials,
    region: String,
    data_types: [AgentDataType; 1],
}

impl AccountInventoryAgent {
    /// Creates the agent for `account` in `region`.
    pub fn new(account: AccountCredentials, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            agent_type: format!(
                "{}/{}/{}/AccountInventoryAgent",
                account.provider, account.name, region
            ),
            account,
            region,
            data_types: [AgentDataType::authoritative(ACCOUNTS_NAMESPACE)],
        }
    }

    /// Cache id of the record this agent writes.
    pub fn record_id(&self) -> String {
        format!("{}:{}:{}", self.account.provider, self.account.name, self.region)
    }
}

#[async_trait]
impl Agent for AccountInventoryAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        &self.account.provider
    }

    fn account_name(&self) -> &str {
        &self.account.name
    }

    fn provided_data_types(&self) -> &[AgentDataType] {
        &self.data_types
    }

    async fn execute(&self) -> Result<CacheResult, AgentError> {
        let mut record = CacheData::new(self.record_id())
            .with_attribute("name", self.account.name.clone())
            .with_attribute("provider", self.account.provider.clone())
            .with_attribute("provider_version", self.account.provider_version.clone())
            .with_attribute("region", self.region.clone());
        for (key, value) in &self.account.attributes {
            record.attributes.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(CacheResult::new().with_data(ACCOUNTS_NAMESPACE, [record]))
    }
}

/// Builds one [`AccountInventoryAgent`] per region of an account.
#[derive(Debug, Clone)]
pub struct AccountInventoryFactory {
    provider: String,
}

impl AccountInventoryFactory {
    /// Creates a factory serving `provider`.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl AgentFactory for AccountInventoryFactory {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn build_agents(&self, account: &AccountCredentials) -> Result<Vec<Arc<dyn Agent>>, AgentError> {
        if account.provider != self.provider {
            return Err(AgentError::Other(
                format!(
                    "account {} belongs to provider {}, not {}",
                    account.name, account.provider, self.provider
                )
                .into(),
            ));
        }

        let agents = if account.regions.is_empty() {
            vec![Arc::new(AccountInventoryAgent::new(account.clone(), GLOBAL_REGION)) as Arc<dyn Agent>]
        } else {
            account
                .regions
                .iter()
                .map(|region| Arc::new(AccountInventoryAgent::new(account.clone(), region.as_str())) as Arc<dyn Agent>)
                .collect()
        };
        Ok(agents)
    }
}
