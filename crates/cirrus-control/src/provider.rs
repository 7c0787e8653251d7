//! Providers and their live agent sets.

use cirrus_core::Agent;
use cirrus_scheduler::AgentScheduler;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ControlError, ControlResult};
use crate::factory::AgentFactory;
use crate::roster::AgentSet;

/// One provider: its agent factory and current roster.
///
/// The roster is replaced only by the synchroniser. A provider gains a
/// scheduler through [`AgentProvider::attach_scheduler`]; before that,
/// synchronisation builds rosters without scheduling anything.
pub struct AgentProvider {
    factory: Arc<dyn AgentFactory>,
    agents: RwLock<Arc<AgentSet>>,
    scheduler: RwLock<Option<Arc<AgentScheduler>>>,
}

impl AgentProvider {
    /// Creates a provider with an empty roster.
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            agents: RwLock::new(Arc::new(AgentSet::new())),
            scheduler: RwLock::new(None),
        }
    }

    /// Provider name.
    pub fn name(&self) -> &str {
        self.factory.provider_name()
    }

    /// Agent factory of this provider.
    pub fn factory(&self) -> &Arc<dyn AgentFactory> {
        &self.factory
    }

    /// Snapshot of the current roster.
    pub fn agent_set(&self) -> Arc<AgentSet> {
        self.agents.read().clone()
    }

    /// Scheduler, once attached.
    pub fn scheduler(&self) -> Option<Arc<AgentScheduler>> {
        self.scheduler.read().clone()
    }

    /// Attaches `scheduler` and schedules the whole current roster.
    ///
    /// Returns the number of agents scheduled. Agents filtered out by the
    /// scheduler's enabled pattern are not counted.
    pub fn attach_scheduler(&self, scheduler: Arc<AgentScheduler>) -> ControlResult<usize> {
        let mut slot = self.scheduler.write();
        if slot.is_some() {
            return Err(ControlError::Config(format!(
                "provider {} already has a scheduler",
                self.name()
            )));
        }
        let roster = self.agent_set();
        let agents: Vec<_> = roster.agents().cloned().collect();
        let scheduled = self.schedule(&scheduler, &agents);
        *slot = Some(scheduler);

        info!(provider = %self.name(), agents = scheduled, "scheduler attached");
        Ok(scheduled)
    }

    /// Agent types of the roster currently running on the scheduler.
    pub fn scheduled_agents(&self) -> Vec<String> {
        let Some(scheduler) = self.scheduler() else {
            return Vec::new();
        };
        let mut agents: Vec<_> = self
            .agent_set()
            .agents()
            .map(|agent| agent.agent_type().to_owned())
            .filter(|agent_type| scheduler.is_scheduled(agent_type))
            .collect();
        agents.sort();
        agents
    }

    /// Swaps in `next`, stopping `stale` agents first and starting `fresh`
    /// ones after, when a scheduler is attached.
    ///
    /// Returns `(unscheduled, scheduled)` counts.
    pub(crate) fn commit(
        &self,
        next: Arc<AgentSet>,
        stale: &[String],
        fresh: &[Arc<dyn Agent>],
    ) -> (usize, usize) {
        let slot = self.scheduler.read();
        let unscheduled = slot.as_deref().map_or(0, |scheduler| {
            stale
                .iter()
                .filter(|agent_type| scheduler.unschedule(agent_type).is_ok())
                .count()
        });

        *self.agents.write() = next;

        let scheduled = slot
            .as_deref()
            .map_or(0, |scheduler| self.schedule(scheduler, fresh));
        (unscheduled, scheduled)
    }

    /// Schedules `agents`, returning how many were started.
    fn schedule(&self, scheduler: &AgentScheduler, agents: &[Arc<dyn Agent>]) -> usize {
        let mut scheduled = 0;
        for agent in agents {
            match scheduler.schedule(agent.clone()) {
                Ok(true) => scheduled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(provider = %self.name(), agent_type = %agent.agent_type(), error = %e, "failed to schedule agent");
                }
            }
        }
        scheduled
    }
}

impl std::fmt::Debug for AgentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accounts = self.agents.read().len();
        let attached = self.scheduler.read().is_some();
        f.debug_struct("AgentProvider")
            .field("name", &self.name())
            .field("accounts", &accounts)
            .field("attached", &attached)
            .finish()
    }
}
