//! Configuration for a cirrus node.

use std::path::Path;
use std::time::Duration;

use cirrus_core::AccountCredentials;
use cirrus_scheduler::SchedulerConfig;
use cirrus_state::LockConfig;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{ControlError, ControlResult};

/// Top-level configuration of a node.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeConfig {
    /// Agent scheduling.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Lock store backend.
    #[serde(default)]
    pub lock: LockConfig,

    /// Account synchronisation.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Configured accounts.
    #[serde(default)]
    pub accounts: Vec<AccountCredentials>,
}

impl NodeConfig {
    /// Configuration layers, later overriding earlier:
    /// 1. Default values
    /// 2. `cirrus.toml` in the current directory (if present)
    /// 3. `path` (if given)
    /// 4. Environment variables with `CIRRUS_` prefix, `__` between levels
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Toml::file("cirrus.toml"));

        if let Some(p) = path {
            figment = figment.merge(Toml::file(p));
        }

        figment.merge(Env::prefixed("CIRRUS_").split("__"))
    }

    /// Load and validate configuration.
    pub fn load(path: Option<&Path>) -> ControlResult<Self> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the scheduler and sync settings.
    pub fn validate(&self) -> ControlResult<()> {
        self.scheduler
            .validate()
            .map_err(|e| ControlError::Config(e.to_string()))?;
        if self.sync.interval_secs == 0 {
            return Err(ControlError::Config(
                "sync.interval_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Account synchronisation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How often accounts are re-read and reconciled (seconds).
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

const fn default_sync_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval_secs(),
        }
    }
}

impl SyncConfig {
    /// Reconciliation period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NodeConfig::default();
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.lock, LockConfig::Memory);
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert!(config.accounts.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn config_from_toml() {
        let toml = r#"
            [scheduler]
            interval_secs = 30
            enabled_agent_pattern = "aws/.*"

            [lock]
            backend = "memory"

            [sync]
            interval_secs = 10

            [[accounts]]
            name = "prod"
            provider = "aws"
            provider_version = "v2"
            regions = ["us-east-1", "eu-west-1"]

            [accounts.attributes]
            role = "arn:aws:iam::123456789012:role/cirrus"
        "#;

        let config: NodeConfig = Figment::new().merge(Toml::string(toml)).extract().unwrap();
        assert_eq!(config.scheduler.interval_secs, 30);
        assert_eq!(config.sync.interval_secs, 10);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].provider_version, "v2");
        assert_eq!(
            config.accounts[0].attributes["role"],
            serde_json::json!("arn:aws:iam::123456789012:role/cirrus")
        );
    }

    #[test]
    fn environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cirrus.toml",
                r#"
                [scheduler]
                interval_secs = 30
                "#,
            )?;
            jail.set_env("CIRRUS_SCHEDULER__INTERVAL_SECS", "45");
            jail.set_env("CIRRUS_SYNC__INTERVAL_SECS", "5");

            let config = NodeConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.interval_secs, 45);
            assert_eq!(config.sync.interval_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_overrides_working_directory_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cirrus.toml", "[sync]\ninterval_secs = 20\n")?;
            jail.create_file("node.toml", "[sync]\ninterval_secs = 7\n")?;

            let config = NodeConfig::load(Some(Path::new("node.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.sync.interval_secs, 7);
            Ok(())
        });
    }

    #[test]
    fn invalid_scheduler_settings_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cirrus.toml", "[scheduler]\ninterval_secs = 60\ntimeout_secs = 10\n")?;

            assert!(matches!(NodeConfig::load(None), Err(ControlError::Config(_))));
            Ok(())
        });
    }
}
