//! Common test utilities for account synchronisation tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cirrus_cache::{MemoryCacheStore, ProviderCache};
use cirrus_control::{
    AccountLifecycleSynchronizer, AgentFactory, AgentProvider, ControlError, ControlResult,
    CredentialsRepository, MemoryCredentialsRepository, StaticAccountSource,
};
use cirrus_core::{AccountCredentials, Agent, AgentDataType, AgentError, CacheResult};
use cirrus_scheduler::{AgentScheduler, NodeIdentity, SchedulerConfig};
use cirrus_state::MemoryLockStore;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Node identity with a fixed token.
#[derive(Debug)]
pub struct StaticIdentity(pub String);

#[async_trait]
impl NodeIdentity for StaticIdentity {
    async fn node_identity(&self) -> String {
        self.0.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }
}

/// Agent that does nothing; identified by account and region.
#[derive(Debug)]
pub struct RegionAgent {
    agent_type: String,
    provider: String,
    account: String,
}

#[async_trait]
impl Agent for RegionAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn account_name(&self) -> &str {
        &self.account
    }

    fn provided_data_types(&self) -> &[AgentDataType] {
        &[]
    }

    async fn execute(&self) -> Result<CacheResult, AgentError> {
        Ok(CacheResult::new())
    }
}

/// Factory building one [`RegionAgent`] per region, with scripted failures.
#[derive(Debug)]
pub struct TestFactory {
    provider: String,
    failing: Mutex<BTreeSet<String>>,
    builds: Mutex<BTreeMap<String, usize>>,
}

impl TestFactory {
    pub fn new(provider: &str) -> Arc<Self> {
        Arc::new(Self {
            provider: provider.to_owned(),
            failing: Mutex::new(BTreeSet::new()),
            builds: Mutex::new(BTreeMap::new()),
        })
    }

    /// Makes building `account` fail or succeed.
    pub fn set_failing(&self, account: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(account.to_owned());
        } else {
            set.remove(account);
        }
    }

    /// Number of successful and failed builds of `account`.
    pub fn builds(&self, account: &str) -> usize {
        self.builds.lock().get(account).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AgentFactory for TestFactory {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn build_agents(&self, account: &AccountCredentials) -> Result<Vec<Arc<dyn Agent>>, AgentError> {
        *self.builds.lock().entry(account.name.clone()).or_default() += 1;
        // Let a concurrent caller run in between.
        tokio::task::yield_now().await;

        if self.failing.lock().contains(&account.name) {
            return Err(AgentError::provider(format!("cannot reach {}", account.name)));
        }
        Ok(account
            .regions
            .iter()
            .map(|region| {
                Arc::new(RegionAgent {
                    agent_type: agent_type(&account.name, region),
                    provider: self.provider.clone(),
                    account: account.name.clone(),
                }) as Arc<dyn Agent>
            })
            .collect())
    }
}

/// Credentials repository whose next `save` can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyCredentials {
    inner: MemoryCredentialsRepository,
    fail_next_save: AtomicBool,
}

impl FlakyCredentials {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `save` return an error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialsRepository for FlakyCredentials {
    async fn list(&self, provider: &str) -> ControlResult<Vec<AccountCredentials>> {
        self.inner.list(provider).await
    }

    async fn save(&self, credentials: &AccountCredentials) -> ControlResult<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(ControlError::internal("credentials store unavailable"));
        }
        self.inner.save(credentials).await
    }

    async fn delete(&self, account: &str) -> ControlResult<()> {
        self.inner.delete(account).await
    }
}

/// Agent type built by [`TestFactory`].
pub fn agent_type(account: &str, region: &str) -> String {
    format!("{account}/{region}/RegionAgent")
}

/// Account of provider `aws` in `regions`.
pub fn account(name: &str, regions: &[&str]) -> AccountCredentials {
    AccountCredentials::new(name, "aws").with_regions(regions.iter().copied())
}

/// Scheduler with the default config on an in-memory cluster.
pub fn scheduler() -> Arc<AgentScheduler> {
    scheduler_with(&SchedulerConfig::default(), ProviderCache::new(Arc::new(MemoryCacheStore::new())))
}

pub fn scheduler_with(config: &SchedulerConfig, cache: ProviderCache) -> Arc<AgentScheduler> {
    Arc::new(
        AgentScheduler::new(
            config,
            Arc::new(MemoryLockStore::new()),
            Arc::new(StaticIdentity("node-1".to_owned())),
            cache,
        )
        .unwrap(),
    )
}

/// A synchroniser over one `aws` provider.
pub struct Harness {
    pub source: Arc<StaticAccountSource>,
    pub credentials: Arc<MemoryCredentialsRepository>,
    pub factory: Arc<TestFactory>,
    pub provider: Arc<AgentProvider>,
    pub sync: Arc<AccountLifecycleSynchronizer>,
}

impl Harness {
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        let factory = TestFactory::new("aws");
        let provider = Arc::new(AgentProvider::new(factory.clone()));
        Self::with_providers(accounts, factory, vec![provider])
    }

    /// Harness whose first provider is the `aws` one.
    pub fn with_providers(
        accounts: Vec<AccountCredentials>,
        factory: Arc<TestFactory>,
        providers: Vec<Arc<AgentProvider>>,
    ) -> Self {
        let source = Arc::new(StaticAccountSource::new(accounts));
        let credentials = Arc::new(MemoryCredentialsRepository::new());
        let sync = Arc::new(AccountLifecycleSynchronizer::new(
            source.clone(),
            credentials.clone(),
            providers.clone(),
        ));
        Self {
            source,
            credentials,
            factory,
            provider: providers[0].clone(),
            sync,
        }
    }

    /// Names of the `aws` accounts in the credentials repository.
    pub async fn stored(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .credentials
            .list("aws")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        names.sort();
        names
    }
}
