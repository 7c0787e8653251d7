//! Account lifecycle synchronisation.
//!
//! A pass runs in two phases:
//!
//! 1. **Build**: for every provider, diff configured accounts against stored
//!    credentials and build the agents of new and changed accounts. Nothing
//!    live is touched; the first build failure aborts the whole pass.
//! 2. **Commit**: per provider, unschedule the agents of deleted and changed
//!    accounts, publish the next [`AgentSet`], schedule the fresh agents and
//!    record the new credentials.
//!
//! Stale agents therefore always stop before their replacements start, and
//! an aborted pass leaves every provider on its previous roster.

use cirrus_core::{AccountCredentials, Agent};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::credentials::CredentialsRepository;
use crate::error::{ControlError, ControlResult};
use crate::provider::AgentProvider;
use crate::roster::AgentSet;
use crate::source::AccountSource;

/// Outcome of one synchronisation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Accounts that got agents for the first time.
    pub added: Vec<String>,
    /// Accounts whose agents were rebuilt.
    pub changed: Vec<String>,
    /// Accounts whose agents were removed.
    pub deleted: Vec<String>,
    /// Agents started on the scheduler.
    pub agents_scheduled: usize,
    /// Agents stopped on the scheduler.
    pub agents_unscheduled: usize,
}

impl SyncReport {
    /// Returns true when the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Account differences of one provider.
#[derive(Debug, Default)]
struct AccountDiff {
    added: Vec<AccountCredentials>,
    changed: Vec<AccountCredentials>,
    deleted: Vec<String>,
}

impl AccountDiff {
    fn compute(
        configured: &BTreeMap<String, AccountCredentials>,
        stored: &BTreeMap<String, AccountCredentials>,
        current: &AgentSet,
    ) -> Self {
        let mut diff = Self::default();
        for (name, account) in configured {
            match stored.get(name) {
                // Stored but never built, e.g. stored by an earlier process.
                Some(_) if !current.contains_account(name) => diff.added.push(account.clone()),
                Some(previous) if previous != account => diff.changed.push(account.clone()),
                Some(_) => {}
                // Built by a pass whose credentials write failed.
                None if current.contains_account(name) => diff.changed.push(account.clone()),
                None => diff.added.push(account.clone()),
            }
        }
        diff.deleted = stored
            .keys()
            .filter(|name| !configured.contains_key(*name))
            .cloned()
            .collect();
        diff
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Fully built, not yet published changes of one provider.
struct ProviderPlan {
    provider: Arc<AgentProvider>,
    diff: AccountDiff,
    next: Arc<AgentSet>,
    stale: Vec<String>,
    fresh: Vec<Arc<dyn Agent>>,
}

/// Converges every provider's roster to the configured accounts.
pub struct AccountLifecycleSynchronizer {
    source: Arc<dyn AccountSource>,
    credentials: Arc<dyn CredentialsRepository>,
    providers: Vec<Arc<AgentProvider>>,
    pass: Mutex<()>,
}

impl AccountLifecycleSynchronizer {
    /// Creates a synchroniser over `providers`.
    pub fn new(
        source: Arc<dyn AccountSource>,
        credentials: Arc<dyn CredentialsRepository>,
        providers: Vec<Arc<AgentProvider>>,
    ) -> Self {
        Self {
            source,
            credentials,
            providers,
            pass: Mutex::new(()),
        }
    }

    /// Registered providers.
    pub fn providers(&self) -> &[Arc<AgentProvider>] {
        &self.providers
    }

    /// Provider registered under `name`.
    pub fn provider(&self, name: &str) -> Option<&Arc<AgentProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Agent types of `provider` currently running on this node.
    pub fn list_scheduled_agents(&self, provider: &str) -> ControlResult<Vec<String>> {
        self.provider(provider)
            .map(|p| p.scheduled_agents())
            .ok_or_else(|| ControlError::UnknownProvider(provider.to_owned()))
    }

    /// Runs one synchronisation pass.
    ///
    /// Concurrent calls are serialised. A pass that fails while building
    /// agents changes nothing.
    pub async fn synchronize(&self) -> ControlResult<SyncReport> {
        let _pass = self.pass.lock().await;

        let configured = self.configured_accounts().await?;
        let mut plans = Vec::new();
        for provider in &self.providers {
            let desired = configured.get(provider.name()).cloned().unwrap_or_default();
            if let Some(plan) = self.plan(provider, &desired).await? {
                plans.push(plan);
            }
        }

        let mut report = SyncReport::default();
        let diffs: Vec<_> = plans
            .into_iter()
            .map(|plan| Self::commit(plan, &mut report))
            .collect();
        self.persist(&diffs).await?;

        if report.is_empty() {
            debug!("accounts unchanged");
        } else {
            info!(
                added = report.added.len(),
                changed = report.changed.len(),
                deleted = report.deleted.len(),
                scheduled = report.agents_scheduled,
                unscheduled = report.agents_unscheduled,
                "accounts synchronised"
            );
        }
        Ok(report)
    }

    /// Configured accounts grouped by provider.
    async fn configured_accounts(&self) -> ControlResult<BTreeMap<String, BTreeMap<String, AccountCredentials>>> {
        let mut seen = BTreeSet::new();
        let mut by_provider: BTreeMap<String, BTreeMap<String, AccountCredentials>> = BTreeMap::new();

        for account in self.source.list_accounts().await? {
            if !seen.insert(account.name.clone()) {
                return Err(ControlError::DuplicateAccount(account.name));
            }
            if self.provider(&account.provider).is_none() {
                warn!(account = %account.name, provider = %account.provider, "no provider registered for account, ignoring");
                continue;
            }
            by_provider
                .entry(account.provider.clone())
                .or_default()
                .insert(account.name.clone(), account);
        }
        Ok(by_provider)
    }

    async fn plan(
        &self,
        provider: &Arc<AgentProvider>,
        desired: &BTreeMap<String, AccountCredentials>,
    ) -> ControlResult<Option<ProviderPlan>> {
        let stored: BTreeMap<_, _> = self
            .credentials
            .list(provider.name())
            .await?
            .into_iter()
            .map(|a| (a.name.clone(), a))
            .collect();
        let current = provider.agent_set();

        let diff = AccountDiff::compute(desired, &stored, &current);
        if diff.is_empty() {
            return Ok(None);
        }

        let mut built = BTreeMap::new();
        for account in diff.added.iter().chain(&diff.changed) {
            let agents = provider.factory().build_agents(account).await.map_err(|source| {
                warn!(
                    provider = %provider.name(),
                    account = %account.name,
                    error = %source,
                    "agent build failed, aborting synchronisation"
                );
                ControlError::AgentBuild {
                    provider: provider.name().to_owned(),
                    account: account.name.clone(),
                    source,
                }
            })?;
            if agents.is_empty() {
                warn!(provider = %provider.name(), account = %account.name, "account produced no agents");
            }
            built.insert(account.name.clone(), agents);
        }

        let removed: BTreeSet<String> = diff
            .deleted
            .iter()
            .cloned()
            .chain(diff.changed.iter().map(|a| a.name.clone()))
            .collect();
        let stale = current.agent_types_for(&removed);
        let fresh = built.values().flatten().cloned().collect();
        let next = Arc::new(current.with_changes(&removed, built));

        Ok(Some(ProviderPlan {
            provider: provider.clone(),
            diff,
            next,
            stale,
            fresh,
        }))
    }

    fn commit(plan: ProviderPlan, report: &mut SyncReport) -> AccountDiff {
        let ProviderPlan {
            provider,
            diff,
            next,
            stale,
            fresh,
        } = plan;

        let accounts = next.len();
        let (unscheduled, scheduled) = provider.commit(next, &stale, &fresh);
        report.agents_unscheduled += unscheduled;
        report.agents_scheduled += scheduled;

        info!(
            provider = %provider.name(),
            accounts,
            added = ?diff.added.iter().map(|a| &a.name).collect::<Vec<_>>(),
            changed = ?diff.changed.iter().map(|a| &a.name).collect::<Vec<_>>(),
            deleted = ?diff.deleted,
            "agent set switched"
        );

        report.added.extend(diff.added.iter().map(|a| a.name.clone()));
        report.changed.extend(diff.changed.iter().map(|a| a.name.clone()));
        report.deleted.extend(diff.deleted.iter().cloned());
        diff
    }

    /// Records committed credentials. Deletes go first: an account that moved
    /// between providers is deleted from one and saved for the other.
    async fn persist(&self, diffs: &[AccountDiff]) -> ControlResult<()> {
        for account in diffs.iter().flat_map(|d| &d.deleted) {
            self.credentials.delete(account).await?;
        }
        for account in diffs.iter().flat_map(|d| d.added.iter().chain(&d.changed)) {
            self.credentials.save(account).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccountLifecycleSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLifecycleSynchronizer")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
