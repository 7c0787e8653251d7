//! Scheduling intervals.

use cirrus_core::Agent;
use std::time::Duration;

use crate::config::SchedulerConfig;

/// Timing of one agent's cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Wait after a successful or contended cycle.
    pub interval: Duration,
    /// Wait after a failed cycle.
    pub error_interval: Duration,
    /// Execution deadline and lock lease.
    pub timeout: Duration,
}

impl Interval {
    /// Creates an interval from explicit values.
    #[must_use]
    pub const fn new(interval: Duration, error_interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            error_interval,
            timeout,
        }
    }

    /// `(interval, interval, 2 * interval)`.
    #[must_use]
    pub const fn from_interval(interval: Duration) -> Self {
        Self::new(interval, interval, interval.saturating_mul(2))
    }
}

/// Chooses the timing of an agent.
pub trait AgentIntervalProvider: Send + Sync {
    /// Interval for `agent`. Always returns a value.
    fn interval(&self, agent: &dyn Agent) -> Interval;
}

/// Uses a static default unless the agent reports an override.
///
/// An override of `I` yields `(I, error_or_I, 2 * I)`. The timeout of an
/// overridden agent is always twice its interval, whatever the default
/// timeout is configured to.
#[derive(Debug, Clone, Copy)]
pub struct DefaultAgentIntervalProvider {
    default: Interval,
}

impl DefaultAgentIntervalProvider {
    /// Creates a provider with the given default.
    #[must_use]
    pub const fn new(default: Interval) -> Self {
        Self { default }
    }

    /// Creates a provider from the scheduler configuration.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(Interval::new(
            config.interval(),
            config.error_interval(),
            config.timeout(),
        ))
    }

    /// The configured default.
    #[must_use]
    pub const fn default_interval(&self) -> Interval {
        self.default
    }
}

impl AgentIntervalProvider for DefaultAgentIntervalProvider {
    fn interval(&self, agent: &dyn Agent) -> Interval {
        match agent.interval_override() {
            Some(o) if !o.interval.is_zero() => Interval::new(
                o.interval,
                o.error_interval.unwrap_or(o.interval),
                o.interval.saturating_mul(2),
            ),
            _ => self.default,
        }
    }
}
