//! Health tracking for scheduled agents.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;

/// Position of an agent in its scheduling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Scheduled, first cycle not started.
    Idle,
    /// Sleeping until the next attempt.
    Waiting,
    /// Resolving the node identity and taking the lease.
    Acquiring,
    /// Executing under the lease.
    Running,
    /// Last run merged into the cache.
    Succeeded,
    /// Last cycle failed.
    Failed,
}

/// Health data for a single agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    /// Current state.
    pub state: AgentState,
    /// Wait in effect for the current or coming cycle.
    pub current_interval: Duration,
    /// Last successful run.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Last failed cycle.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Wall time of the last finished run.
    pub last_duration: Option<Duration>,
    /// Consecutive failure count.
    pub consecutive_failures: u32,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

impl AgentHealth {
    fn new(interval: Duration) -> Self {
        Self {
            state: AgentState::Idle,
            current_interval: interval,
            last_success_at: None,
            last_failure_at: None,
            last_duration: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Tracks per-agent health on this node.
#[derive(Debug, Default)]
pub struct AgentHealthTracker {
    health_data: DashMap<String, AgentHealth>,
}

impl AgentHealthTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an agent.
    pub fn register(&self, agent_type: &str, interval: Duration) {
        self.health_data
            .insert(agent_type.to_owned(), AgentHealth::new(interval));
    }

    /// Moves an agent to `state`. Ignored for untracked agents.
    pub fn set_state(&self, agent_type: &str, state: AgentState) {
        if let Some(mut entry) = self.health_data.get_mut(agent_type) {
            entry.state = state;
        }
    }

    /// Marks an agent as waiting `interval` before its next attempt.
    pub fn set_waiting(&self, agent_type: &str, interval: Duration) {
        if let Some(mut entry) = self.health_data.get_mut(agent_type) {
            entry.state = AgentState::Waiting;
            entry.current_interval = interval;
        }
    }

    /// Records a successful run.
    pub fn record_success(&self, agent_type: &str, duration: Duration) {
        if let Some(mut entry) = self.health_data.get_mut(agent_type) {
            entry.state = AgentState::Succeeded;
            entry.last_success_at = Some(Utc::now());
            entry.last_duration = Some(duration);
            entry.consecutive_failures = 0;
        }
    }

    /// Records a failed cycle.
    pub fn record_failure(&self, agent_type: &str, error: &str, duration: Option<Duration>) {
        if let Some(mut entry) = self.health_data.get_mut(agent_type) {
            entry.state = AgentState::Failed;
            entry.last_failure_at = Some(Utc::now());
            entry.consecutive_failures += 1;
            entry.last_error = Some(error.to_owned());
            if duration.is_some() {
                entry.last_duration = duration;
            }
        }
    }

    /// Gets health data for an agent.
    pub fn get(&self, agent_type: &str) -> Option<AgentHealth> {
        self.health_data.get(agent_type).map(|r| r.clone())
    }

    /// Stops tracking an agent.
    pub fn remove(&self, agent_type: &str) {
        self.health_data.remove(agent_type);
    }

    /// Health of every tracked agent, ordered by agent type.
    pub fn snapshot(&self) -> Vec<(String, AgentHealth)> {
        let mut all: Vec<_> = self
            .health_data
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Number of tracked agents.
    pub fn len(&self) -> usize {
        self.health_data.len()
    }

    /// Returns true if no agents are tracked.
    pub fn is_empty(&self) -> bool {
        self.health_data.is_empty()
    }
}
