//! Configuration types for the scheduler.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Agent scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Default poll interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Poll interval after a failed run; defaults to `interval_secs`.
    #[serde(default)]
    pub error_interval_secs: Option<u64>,

    /// Execution timeout and lock lease; defaults to twice `interval_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Maximum agent bodies executing at once on this node.
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Only agents whose lower-cased type fully matches this are scheduled.
    #[serde(default = "default_enabled_agent_pattern")]
    pub enabled_agent_pattern: String,

    /// Node identity resolution.
    #[serde(default)]
    pub identity: IdentityConfig,
}

const fn default_interval_secs() -> u64 {
    60
}

const fn default_max_concurrent_agents() -> usize {
    1000
}

fn default_enabled_agent_pattern() -> String {
    ".*".to_owned()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_interval_secs: None,
            timeout_secs: None,
            max_concurrent_agents: default_max_concurrent_agents(),
            enabled_agent_pattern: default_enabled_agent_pattern(),
            identity: IdentityConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Default poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Poll interval after a failed run.
    #[must_use]
    pub fn error_interval(&self) -> Duration {
        self.error_interval_secs
            .map_or_else(|| self.interval(), Duration::from_secs)
    }

    /// Execution timeout, which is also the lock lease.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map_or_else(|| self.interval().saturating_mul(2), Duration::from_secs)
    }

    /// Checks the interval invariants.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(SchedulerError::Config("interval_secs must be positive".to_owned()));
        }
        if self.error_interval().is_zero() {
            return Err(SchedulerError::Config(
                "error_interval_secs must be positive".to_owned(),
            ));
        }
        if self.timeout() < self.interval() {
            return Err(SchedulerError::Config(format!(
                "timeout_secs ({}) must not be shorter than interval_secs ({})",
                self.timeout().as_secs(),
                self.interval_secs
            )));
        }
        if self.max_concurrent_agents == 0 {
            return Err(SchedulerError::Config(
                "max_concurrent_agents must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Node identity resolution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Host connected to decide whether a local interface is routable.
    #[serde(default = "default_validation_host")]
    pub validation_host: String,

    /// Port connected to on `validation_host`.
    #[serde(default = "default_validation_port")]
    pub validation_port: u16,

    /// Minimum time between attempts to re-resolve an invalid identity.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Connect timeout of a single reachability check in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_validation_host() -> String {
    "www.google.com".to_owned()
}

const fn default_validation_port() -> u16 {
    80
}

const fn default_refresh_interval_secs() -> u64 {
    30
}

const fn default_connect_timeout_ms() -> u64 {
    125
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            validation_host: default_validation_host(),
            validation_port: default_validation_port(),
            refresh_interval_secs: default_refresh_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl IdentityConfig {
    /// Refresh window for an invalid identity.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Reachability check connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
