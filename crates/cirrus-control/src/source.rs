//! Account configuration sources.

use async_trait::async_trait;
use cirrus_core::AccountCredentials;
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::PathBuf;

use crate::config::NodeConfig;
use crate::error::{ControlError, ControlResult};

/// Source of the desired account list.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Lists every configured account.
    async fn list_accounts(&self) -> ControlResult<Vec<AccountCredentials>>;
}

/// Account list held in memory and replaced by pushes.
#[derive(Debug, Default)]
pub struct StaticAccountSource {
    accounts: RwLock<Vec<AccountCredentials>>,
}

impl StaticAccountSource {
    /// Creates a source with the given accounts.
    #[must_use]
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Replaces the account list.
    pub fn set(&self, accounts: Vec<AccountCredentials>) {
        *self.accounts.write() = accounts;
    }
}

#[async_trait]
impl AccountSource for StaticAccountSource {
    async fn list_accounts(&self) -> ControlResult<Vec<AccountCredentials>> {
        Ok(self.accounts.read().clone())
    }
}

#[derive(Deserialize)]
struct AccountsSection {
    #[serde(default)]
    accounts: Vec<AccountCredentials>,
}

/// Re-reads the `accounts` section of the node configuration on every call.
///
/// Uses the same layers as [`NodeConfig::load`], so editing the file is a
/// configuration push.
#[derive(Debug, Clone, Default)]
pub struct FileAccountSource {
    path: Option<PathBuf>,
}

impl FileAccountSource {
    /// Creates a source reading `cirrus.toml`, then `path` if given.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl AccountSource for FileAccountSource {
    async fn list_accounts(&self) -> ControlResult<Vec<AccountCredentials>> {
        let section: AccountsSection = NodeConfig::figment(self.path.as_deref())
            .extract()
            .map_err(|e| ControlError::AccountSource(e.to_string()))?;
        Ok(section.accounts)
    }
}
