//! Per-node agent execution scheduler.
//!
//! Every scheduled agent gets its own task running the cycle
//!
//! ```text
//! Idle -> Waiting -> Acquiring -> Running -> Succeeded | Failed -> Waiting ...
//! ```
//!
//! The wait is the agent's `interval`, or its `error_interval` when the
//! previous cycle failed. A cycle whose lease is held by another node, or
//! that finds every execution slot taken, goes back to waiting the normal
//! interval without counting as a failure.
//!
//! A lease is first taken for `timeout`. Once the run completes the holder
//! resets it to lapse one wait after acquisition, so the next node can take
//! over on the agent's cadence rather than after the full timeout.
//!
//! The agent body runs on a separate task bounded by `timeout`. Past the
//! deadline the run is abandoned: its result is never merged, its execution
//! slot is freed and its lease is left to expire.

use cirrus_cache::ProviderCache;
use cirrus_core::{Agent, AgentError, CacheResult};
use cirrus_state::LockStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::health::{AgentHealth, AgentHealthTracker, AgentState};
use crate::identity::NodeIdentity;
use crate::interval::{AgentIntervalProvider, DefaultAgentIntervalProvider, Interval};
use crate::lock::DistributedAgentLock;

/// State shared with every agent task.
struct Shared {
    lock: DistributedAgentLock,
    identity: Arc<dyn NodeIdentity>,
    intervals: Arc<dyn AgentIntervalProvider>,
    cache: ProviderCache,
    health: Arc<AgentHealthTracker>,
    permits: Arc<Semaphore>,
    enabled: AtomicBool,
}

struct ScheduledAgent {
    token: CancellationToken,
}

/// Runs this node's share of the agent roster.
pub struct AgentScheduler {
    shared: Arc<Shared>,
    enabled_pattern: Regex,
    agents: DashMap<String, ScheduledAgent>,
    shutdown: CancellationToken,
}

impl AgentScheduler {
    /// Creates a scheduler.
    ///
    /// Fails when the configuration is invalid or the enabled-agent pattern
    /// does not compile.
    pub fn new(
        config: &SchedulerConfig,
        lock_store: Arc<dyn LockStore>,
        identity: Arc<dyn NodeIdentity>,
        cache: ProviderCache,
    ) -> Result<Self> {
        config.validate()?;
        let enabled_pattern = Regex::new(&format!("^(?:{})$", config.enabled_agent_pattern))?;

        Ok(Self {
            shared: Arc::new(Shared {
                lock: DistributedAgentLock::new(lock_store),
                identity,
                intervals: Arc::new(DefaultAgentIntervalProvider::from_config(config)),
                cache,
                health: Arc::new(AgentHealthTracker::new()),
                permits: Arc::new(Semaphore::new(config.max_concurrent_agents)),
                enabled: AtomicBool::new(true),
            }),
            enabled_pattern,
            agents: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Whether `agent_type` passes the enabled-agent pattern.
    pub fn is_enabled_agent(&self, agent_type: &str) -> bool {
        self.enabled_pattern.is_match(&agent_type.to_lowercase())
    }

    /// Starts the cycle of `agent`.
    ///
    /// Returns `Ok(false)` when the agent is filtered out by the enabled-agent
    /// pattern.
    pub fn schedule(&self, agent: Arc<dyn Agent>) -> Result<bool> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        let agent_type = agent.agent_type().to_owned();
        if !self.is_enabled_agent(&agent_type) {
            debug!(agent_type = %agent_type, "agent does not match enabled pattern, not scheduling");
            return Ok(false);
        }

        match self.agents.entry(agent_type.clone()) {
            Entry::Occupied(_) => Err(SchedulerError::AgentAlreadyScheduled(agent_type)),
            Entry::Vacant(slot) => {
                let interval = self.shared.intervals.interval(agent.as_ref());
                self.shared.health.register(&agent_type, interval.interval);

                let token = self.shutdown.child_token();
                tokio::spawn(run_agent(self.shared.clone(), agent, token.clone()));
                slot.insert(ScheduledAgent { token });

                info!(
                    agent_type = %agent_type,
                    interval_secs = interval.interval.as_secs(),
                    timeout_secs = interval.timeout.as_secs(),
                    "agent scheduled"
                );
                Ok(true)
            }
        }
    }

    /// Stops the cycle of `agent_type`.
    ///
    /// An in-flight run is abandoned and its result discarded.
    pub fn unschedule(&self, agent_type: &str) -> Result<()> {
        let (_, scheduled) = self
            .agents
            .remove(agent_type)
            .ok_or_else(|| SchedulerError::AgentNotScheduled(agent_type.to_owned()))?;
        scheduled.token.cancel();
        self.shared.health.remove(agent_type);

        info!(agent_type = %agent_type, "agent unscheduled");
        Ok(())
    }

    /// Whether `agent_type` has a running cycle.
    pub fn is_scheduled(&self, agent_type: &str) -> bool {
        self.agents.contains_key(agent_type)
    }

    /// Agent types with a running cycle, ordered.
    pub fn scheduled_agents(&self) -> Vec<String> {
        let mut agents: Vec<_> = self.agents.iter().map(|r| r.key().clone()).collect();
        agents.sort();
        agents
    }

    /// Turns lock acquisition on or off for every agent on this node.
    ///
    /// A disabled node keeps its cycles running but never takes a lease.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.shared.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!(enabled, "node agent execution toggled");
        }
    }

    /// Whether this node currently executes agents.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Health of one agent.
    pub fn health(&self, agent_type: &str) -> Option<AgentHealth> {
        self.shared.health.get(agent_type)
    }

    /// The distributed lock used by this node.
    pub fn lock(&self) -> &DistributedAgentLock {
        &self.shared.lock
    }

    /// Cancels every agent cycle.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let count = self.agents.len();
        self.agents.clear();
        info!(agents = count, "agent scheduler shut down");
    }
}

impl Drop for AgentScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for AgentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentScheduler")
            .field("agents", &self.agents.len())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

/// Shortest lease left behind by a completed run.
const MIN_LEASE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Succeeded,
    Failed,
    Contended,
    Skipped,
    Cancelled,
}

async fn run_agent(shared: Arc<Shared>, agent: Arc<dyn Agent>, token: CancellationToken) {
    let agent_type = agent.agent_type().to_owned();
    let mut last = CycleOutcome::Skipped;

    loop {
        let interval = shared.intervals.interval(agent.as_ref());
        let wait = if last == CycleOutcome::Failed {
            interval.error_interval
        } else {
            interval.interval
        };
        shared.health.set_waiting(&agent_type, wait);

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        last = run_cycle(&shared, &agent, interval, &token).await;
        if last == CycleOutcome::Cancelled {
            break;
        }
    }

    debug!(agent_type = %agent_type, "agent cycle stopped");
}

async fn run_cycle(
    shared: &Shared,
    agent: &Arc<dyn Agent>,
    interval: Interval,
    token: &CancellationToken,
) -> CycleOutcome {
    let agent_type = agent.agent_type();
    if !shared.enabled.load(Ordering::SeqCst) {
        return CycleOutcome::Skipped;
    }

    let Ok(_permit) = shared.permits.clone().try_acquire_owned() else {
        debug!(agent_type = %agent_type, "no free execution slot");
        return CycleOutcome::Contended;
    };

    shared.health.set_state(agent_type, AgentState::Acquiring);
    let owner = shared.identity.node_identity().await;
    let acquired_at = Instant::now();
    match shared.lock.try_acquire(agent_type, &owner, interval.timeout).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(agent_type = %agent_type, "lease held by another node");
            return CycleOutcome::Contended;
        }
        Err(e) => {
            warn!(agent_type = %agent_type, error = %e, "lock acquisition failed");
            shared.health.record_failure(agent_type, &e.to_string(), None);
            return CycleOutcome::Failed;
        }
    }

    shared.health.set_state(agent_type, AgentState::Running);
    let started = Instant::now();
    let body = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.execute().await })
    };

    let outcome = tokio::select! {
        () = token.cancelled() => return CycleOutcome::Cancelled,
        outcome = tokio::time::timeout(interval.timeout, body) => outcome,
    };
    let elapsed = started.elapsed();

    let result: std::result::Result<CacheResult, AgentError> = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(AgentError::Aborted(join_error.to_string())),
        Err(_) => {
            let e = AgentError::Timeout(interval.timeout);
            warn!(agent_type = %agent_type, error = %e, "agent run abandoned");
            shared.health.record_failure(agent_type, &e.to_string(), Some(elapsed));
            return CycleOutcome::Failed;
        }
    };

    let outcome = match result {
        Ok(result) => merge(shared, agent, result, elapsed).await,
        Err(e) => {
            warn!(agent_type = %agent_type, error = %e, elapsed = ?elapsed, "agent run failed");
            shared.health.record_failure(agent_type, &e.to_string(), Some(elapsed));
            CycleOutcome::Failed
        }
    };

    let next_wait = if outcome == CycleOutcome::Succeeded {
        interval.interval
    } else {
        interval.error_interval
    };
    let lease = (acquired_at + next_wait)
        .saturating_duration_since(Instant::now())
        .max(MIN_LEASE);
    match shared.lock.reset_lease(agent_type, &owner, lease).await {
        Ok(true) => {}
        Ok(false) => debug!(agent_type = %agent_type, "lease lapsed before reset"),
        Err(e) => warn!(agent_type = %agent_type, error = %e, "failed to reset lease"),
    }
    outcome
}

async fn merge(
    shared: &Shared,
    agent: &Arc<dyn Agent>,
    result: CacheResult,
    elapsed: Duration,
) -> CycleOutcome {
    let agent_type = agent.agent_type();
    match shared
        .cache
        .put_cache_result(agent_type, agent.provided_data_types(), result)
        .await
    {
        Ok(stats) => {
            debug!(
                agent_type = %agent_type,
                elapsed = ?elapsed,
                written = stats.written,
                evicted = stats.evicted,
                "agent run succeeded"
            );
            shared.health.record_success(agent_type, elapsed);
            CycleOutcome::Succeeded
        }
        Err(e) => {
            warn!(agent_type = %agent_type, error = %e, "failed to merge agent result");
            shared.health.record_failure(agent_type, &e.to_string(), Some(elapsed));
            CycleOutcome::Failed
        }
    }
}
