//! Cirrus caching node.
//!
//! Loads the node configuration, resolves the node identity, builds one
//! inventory provider per configured provider and keeps the account rosters
//! in step with the configuration until shut down.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cirrus_cache::{MemoryCacheStore, ProviderCache};
use cirrus_control::{
    AccountInventoryFactory, AccountLifecycleSynchronizer, AgentProvider, FileAccountSource,
    MemoryCredentialsRepository, NodeConfig,
};
use cirrus_scheduler::{AgentScheduler, DefaultNodeIdentity, NodeIdentity};

/// Cirrus caching node.
#[derive(Parser, Debug)]
#[command(name = "cirrus-node")]
#[command(about = "Run caching agents for the configured accounts")]
#[command(version)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("cirrus node starting");

    let config = NodeConfig::load(cli.config.as_deref())?;
    info!(
        interval_secs = config.scheduler.interval_secs,
        max_concurrent = config.scheduler.max_concurrent_agents,
        enabled_agents = %config.scheduler.enabled_agent_pattern,
        accounts = config.accounts.len(),
        "configuration loaded"
    );

    let lock_store = cirrus_state::lock_store_from_config(&config.lock).await?;
    let cache = ProviderCache::new(Arc::new(MemoryCacheStore::new()));

    let identity = DefaultNodeIdentity::from_config(&config.scheduler.identity).await;
    if !identity.is_valid() {
        warn!(
            host = %config.scheduler.identity.validation_host,
            "no reachable network interface, running with a placeholder identity"
        );
    }
    let scheduler = Arc::new(AgentScheduler::new(
        &config.scheduler,
        lock_store,
        Arc::new(identity),
        cache,
    )?);

    // One inventory provider per provider named in the initial configuration.
    let provider_names: BTreeSet<_> = config.accounts.iter().map(|a| a.provider.clone()).collect();
    let providers: Vec<_> = provider_names
        .into_iter()
        .map(|name| Arc::new(AgentProvider::new(Arc::new(AccountInventoryFactory::new(name)))))
        .collect();

    let synchronizer = AccountLifecycleSynchronizer::new(
        Arc::new(FileAccountSource::new(cli.config.clone())),
        Arc::new(MemoryCredentialsRepository::new()),
        providers,
    );

    // Build the initial rosters before anything is scheduled.
    if let Err(e) = synchronizer.synchronize().await {
        error!(error = %e, "initial account synchronisation failed");
    }
    for provider in synchronizer.providers() {
        provider.attach_scheduler(scheduler.clone())?;
    }

    let mut ticker = tokio::time::interval(config.sync.interval());
    ticker.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = synchronizer.synchronize().await {
                    error!(error = %e, "account synchronisation failed");
                }
            }
        }
    }

    scheduler.shutdown();
    info!("cirrus node shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
