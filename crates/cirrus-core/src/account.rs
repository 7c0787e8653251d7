//! Account configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configured cloud account.
///
/// Owned by the configuration source. Two credentials with the same `name`
/// that compare unequal mean the account changed and its agents must be
/// rebuilt; equal credentials leave the running agents alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    /// Stable account name, unique across providers.
    pub name: String,
    /// Provider this account belongs to, e.g. `aws`.
    pub provider: String,
    /// Version of the provider integration serving this account.
    #[serde(default = "default_provider_version")]
    pub provider_version: String,
    /// Regions polled for this account.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Provider-specific settings.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AccountCredentials {
    /// Creates credentials with the default provider version and no regions.
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            provider_version: default_provider_version(),
            regions: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the polled regions.
    #[must_use]
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the provider version.
    #[must_use]
    pub fn with_provider_version(mut self, version: impl Into<String>) -> Self {
        self.provider_version = version.into();
        self
    }

    /// Adds a provider-specific attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

fn default_provider_version() -> String {
    "v1".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_detects_changed_regions() {
        let a = AccountCredentials::new("prod", "aws").with_regions(["us-east-1"]);
        let b = AccountCredentials::new("prod", "aws").with_regions(["us-east-1", "eu-west-1"]);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn deserialise_with_defaults() {
        let account: AccountCredentials =
            serde_json::from_str(r#"{"name": "test", "provider": "kubernetes"}"#).unwrap();

        assert_eq!(account.provider_version, "v1");
        assert!(account.regions.is_empty());
        assert!(account.attributes.is_empty());
    }
}
