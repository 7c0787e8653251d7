//! Test fixtures for scheduler integration tests.

use async_trait::async_trait;
use cirrus_core::{Agent, AgentDataType, AgentError, CacheData, CacheResult, IntervalOverride};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scriptable agent that counts its runs.
#[derive(Debug)]
pub struct TestAgent {
    agent_type: String,
    data_types: Vec<AgentDataType>,
    result: CacheResult,
    run_time: Duration,
    failing: AtomicBool,
    runs: AtomicUsize,
    interval_override: Option<IntervalOverride>,
}

impl TestAgent {
    /// Number of times `execute` was entered.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Makes subsequent runs fail or succeed.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Agent for TestAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    fn provider_name(&self) -> &str {
        "test"
    }

    fn account_name(&self) -> &str {
        "test-account"
    }

    fn provided_data_types(&self) -> &[AgentDataType] {
        &self.data_types
    }

    fn interval_override(&self) -> Option<IntervalOverride> {
        self.interval_override
    }

    async fn execute(&self) -> Result<CacheResult, AgentError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.run_time.is_zero() {
            tokio::time::sleep(self.run_time).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AgentError::provider("simulated provider outage"));
        }
        Ok(self.result.clone())
    }
}

/// Builder for creating test agents.
pub struct TestAgentBuilder {
    agent_type: String,
    data_types: Vec<AgentDataType>,
    result: CacheResult,
    run_time: Duration,
    failing: bool,
    interval_override: Option<IntervalOverride>,
}

impl TestAgentBuilder {
    /// Creates a builder for an agent with the given type.
    pub fn new(agent_type: &str) -> Self {
        Self {
            agent_type: agent_type.to_owned(),
            data_types: Vec::new(),
            result: CacheResult::new(),
            run_time: Duration::ZERO,
            failing: false,
            interval_override: None,
        }
    }

    /// Declares `namespace` authoritative and writes `ids` into it.
    pub fn writing(mut self, namespace: &str, ids: &[&str]) -> Self {
        self.data_types.push(AgentDataType::authoritative(namespace));
        self.result = self
            .result
            .with_data(namespace, ids.iter().map(|id| CacheData::new(*id)));
        self
    }

    /// Makes every run take `run_time`.
    pub fn running_for(mut self, run_time: Duration) -> Self {
        self.run_time = run_time;
        self
    }

    /// Makes every run fail.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Sets an interval override.
    pub fn with_interval_override(mut self, interval_override: IntervalOverride) -> Self {
        self.interval_override = Some(interval_override);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Arc<TestAgent> {
        Arc::new(TestAgent {
            agent_type: self.agent_type,
            data_types: self.data_types,
            result: self.result,
            run_time: self.run_time,
            failing: AtomicBool::new(self.failing),
            runs: AtomicUsize::new(0),
            interval_override: self.interval_override,
        })
    }
}
