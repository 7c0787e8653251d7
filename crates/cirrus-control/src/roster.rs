//! Immutable agent rosters.

use cirrus_core::Agent;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The agents of one provider, keyed by account name.
///
/// A set is never changed after construction. Reconciliation derives a new
/// set with [`AgentSet::with_changes`] and publishes it in one swap, so a
/// reader holding an `Arc<AgentSet>` always sees a complete roster.
#[derive(Debug, Clone, Default)]
pub struct AgentSet {
    accounts: BTreeMap<String, Vec<Arc<dyn Agent>>>,
}

impl AgentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from per-account agents.
    #[must_use]
    pub fn from_accounts(accounts: BTreeMap<String, Vec<Arc<dyn Agent>>>) -> Self {
        Self { accounts }
    }

    /// Copy of this set with `removed` accounts dropped and `added` inserted.
    ///
    /// Accounts in neither keep the very same agent instances.
    #[must_use]
    pub fn with_changes(
        &self,
        removed: &BTreeSet<String>,
        added: BTreeMap<String, Vec<Arc<dyn Agent>>>,
    ) -> Self {
        let mut accounts: BTreeMap<_, _> = self
            .accounts
            .iter()
            .filter(|(name, _)| !removed.contains(*name))
            .map(|(name, agents)| (name.clone(), agents.clone()))
            .collect();
        accounts.extend(added);
        Self { accounts }
    }

    /// Account names, ordered.
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// Whether `account` has a roster, possibly empty.
    pub fn contains_account(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }

    /// Agents of one account.
    pub fn agents_for(&self, account: &str) -> Option<&[Arc<dyn Agent>]> {
        self.accounts.get(account).map(Vec::as_slice)
    }

    /// Every agent in the set, grouped by account.
    pub fn agents(&self) -> impl Iterator<Item = &Arc<dyn Agent>> {
        self.accounts.values().flatten()
    }

    /// Agent types of the given accounts.
    pub fn agent_types_for<'a>(&'a self, accounts: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        accounts
            .into_iter()
            .filter_map(|account| self.accounts.get(account))
            .flatten()
            .map(|agent| agent.agent_type().to_owned())
            .collect()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns true if the set holds no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Number of agents across all accounts.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.accounts.values().map(Vec::len).sum()
    }
}
