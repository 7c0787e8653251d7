//! Integration tests for scheduling, filtering and node draining.

mod common;

use cirrus_scheduler::{SchedulerConfig, SchedulerError};
use common::fixtures::TestAgentBuilder;
use common::{fast_config, TestCluster};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};

#[tokio::test(start_paused = true)]
async fn enabled_pattern_filters_agents() {
    let cluster = TestCluster::new();
    let config = SchedulerConfig {
        enabled_agent_pattern: "aws/.*".to_owned(),
        ..fast_config()
    };
    let node = cluster.node("node-1", &config);

    // Matching is done on the lower-cased type.
    assert!(node.schedule(TestAgentBuilder::new("AWS/prod/Instances").build()).unwrap());
    assert!(!node.schedule(TestAgentBuilder::new("gcp/prod/Instances").build()).unwrap());
    // Full match only.
    assert!(!node.schedule(TestAgentBuilder::new("legacy-aws/prod").build()).unwrap());

    assert_eq!(node.scheduled_agents(), vec!["AWS/prod/Instances"]);
    assert!(node.health("gcp/prod/Instances").is_none());
}

#[tokio::test(start_paused = true)]
async fn invalid_pattern_is_rejected() {
    let cluster = TestCluster::new();
    let config = SchedulerConfig {
        enabled_agent_pattern: "aws/(".to_owned(),
        ..fast_config()
    };

    let result = cirrus_scheduler::AgentScheduler::new(
        &config,
        cluster.lock_store.clone(),
        std::sync::Arc::new(common::StaticIdentity("node-1".to_owned())),
        cirrus_cache::ProviderCache::new(cluster.cache_store.clone()),
    );
    assert!(matches!(result, Err(SchedulerError::InvalidPattern(_))));
}

#[tokio::test(start_paused = true)]
async fn scheduling_twice_is_rejected() {
    let cluster = TestCluster::new();
    let node = cluster.node("node-1", &fast_config());

    node.schedule(TestAgentBuilder::new("agent-x").build()).unwrap();
    let result = node.schedule(TestAgentBuilder::new("agent-x").build());

    assert!(matches!(result, Err(SchedulerError::AgentAlreadyScheduled(_))));
}

#[tokio::test(start_paused = true)]
async fn unschedule_stops_the_cycle() {
    let cluster = TestCluster::new();
    let node = cluster.node("node-1", &fast_config());
    let agent = TestAgentBuilder::new("agent-x").build();

    node.schedule(agent.clone()).unwrap();
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(agent.runs(), 1);

    node.unschedule("agent-x").unwrap();
    sleep(Duration::from_secs(60)).await;

    assert_eq!(agent.runs(), 1);
    assert!(node.scheduled_agents().is_empty());
    assert!(node.health("agent-x").is_none());
    assert!(matches!(
        node.unschedule("agent-x"),
        Err(SchedulerError::AgentNotScheduled(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn disabled_node_takes_no_leases() {
    let cluster = TestCluster::new();
    let node = cluster.node("node-1", &fast_config());
    let agent = TestAgentBuilder::new("agent-x").build();
    let start = Instant::now();

    node.set_enabled(false);
    node.schedule(agent.clone()).unwrap();

    sleep_until(start + Duration::from_secs(35)).await;
    assert_eq!(agent.runs(), 0);
    assert!(node.lock().holder("agent-x").await.unwrap().is_none());
    assert!(node.is_scheduled("agent-x"));

    // Cycles fire at t=10, 20, 30 and 40.
    node.set_enabled(true);
    sleep_until(start + Duration::from_millis(40_500)).await;
    assert_eq!(agent.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_every_cycle() {
    let cluster = TestCluster::new();
    let node = cluster.node("node-1", &fast_config());
    let first = TestAgentBuilder::new("agent-a").build();
    let second = TestAgentBuilder::new("agent-b").running_for(Duration::from_secs(5)).build();

    node.schedule(first.clone()).unwrap();
    node.schedule(second.clone()).unwrap();
    sleep(Duration::from_secs(12)).await;

    node.shutdown();
    sleep(Duration::from_secs(60)).await;

    assert_eq!(first.runs(), 1);
    assert_eq!(second.runs(), 1);
    assert!(node.scheduled_agents().is_empty());
    assert!(matches!(
        node.schedule(TestAgentBuilder::new("agent-c").build()),
        Err(SchedulerError::ShutDown)
    ));
}
