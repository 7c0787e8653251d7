//! Stored account credentials.

use async_trait::async_trait;
use cirrus_core::AccountCredentials;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{ControlError, ControlResult};

/// Credentials of the accounts whose agents are currently built.
///
/// The synchroniser diffs this against the configured accounts and writes
/// it only after a roster swap succeeded.
#[async_trait]
pub trait CredentialsRepository: Send + Sync {
    /// Stored credentials of one provider, ordered by account name.
    async fn list(&self, provider: &str) -> ControlResult<Vec<AccountCredentials>>;

    /// Inserts or replaces credentials by account name.
    async fn save(&self, credentials: &AccountCredentials) -> ControlResult<()>;

    /// Removes an account. Removing an absent account is not an error.
    async fn delete(&self, account: &str) -> ControlResult<()>;
}

/// In-memory credentials repository.
///
/// Contents are lost when the process exits, so a restarted node rebuilds
/// every configured account.
#[derive(Debug, Default)]
pub struct MemoryCredentialsRepository {
    accounts: RwLock<BTreeMap<String, AccountCredentials>>,
}

impl MemoryCredentialsRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialsRepository for MemoryCredentialsRepository {
    async fn list(&self, provider: &str) -> ControlResult<Vec<AccountCredentials>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(accounts
            .values()
            .filter(|a| a.provider == provider)
            .cloned()
            .collect())
    }

    async fn save(&self, credentials: &AccountCredentials) -> ControlResult<()> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        accounts.insert(credentials.name.clone(), credentials.clone());
        Ok(())
    }

    async fn delete(&self, account: &str) -> ControlResult<()> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        accounts.remove(account);
        Ok(())
    }
}
