//! Node identity used as the owner token of agent locks.
//!
//! The token has the form `{routable host}:{pid}@{hostname}`. The routable
//! host is the address of the first local interface from which a short TCP
//! connection to a validation host succeeds. When no interface qualifies the
//! token carries [`UNKNOWN_HOST`] and the identity is flagged invalid.
//!
//! A valid identity is never re-resolved. An invalid one is re-resolved at
//! most once per refresh interval.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::config::IdentityConfig;

/// Host component used when no routable interface was found.
pub const UNKNOWN_HOST: &str = "UNKNOWN_HOST";

/// Identity of the current node.
#[async_trait]
pub trait NodeIdentity: Send + Sync {
    /// Current identity token.
    async fn node_identity(&self) -> String;

    /// Whether the current token names a routable host.
    fn is_valid(&self) -> bool;
}

/// Finds the routable host component of the identity.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Returns the host, or `None` when nothing is routable.
    async fn resolve(&self) -> Option<String>;
}

/// Tests local interfaces against a validation host.
#[derive(Debug, Clone)]
pub struct InterfaceHostResolver {
    validation_host: String,
    validation_port: u16,
    connect_timeout: Duration,
}

impl InterfaceHostResolver {
    /// Creates a resolver probing `validation_host:validation_port`.
    pub fn new(validation_host: impl Into<String>, validation_port: u16, connect_timeout: Duration) -> Self {
        Self {
            validation_host: validation_host.into(),
            validation_port,
            connect_timeout,
        }
    }

    /// Creates a resolver from the identity configuration.
    #[must_use]
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(
            config.validation_host.clone(),
            config.validation_port,
            config.connect_timeout(),
        )
    }

    async fn can_reach(&self, local: IpAddr, target: SocketAddr) -> bool {
        let socket = match local {
            IpAddr::V4(_) => TcpSocket::new_v4(),
            IpAddr::V6(_) => TcpSocket::new_v6(),
        };
        let Ok(socket) = socket else {
            return false;
        };
        if socket.bind(SocketAddr::new(local, 0)).is_err() {
            return false;
        }
        matches!(
            tokio::time::timeout(self.connect_timeout, socket.connect(target)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl HostResolver for InterfaceHostResolver {
    async fn resolve(&self) -> Option<String> {
        let targets: Vec<SocketAddr> =
            match tokio::net::lookup_host((self.validation_host.as_str(), self.validation_port)).await {
                Ok(addrs) => addrs.collect(),
                Err(e) => {
                    debug!(host = %self.validation_host, error = %e, "validation host did not resolve");
                    return None;
                }
            };

        let allow_loopback = self.validation_host.eq_ignore_ascii_case("localhost")
            || targets.iter().any(|t| t.ip().is_loopback());

        let interfaces = match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!(error = %e, "failed to enumerate network interfaces");
                return None;
            }
        };

        for iface in interfaces {
            if iface.is_loopback() && !allow_loopback {
                continue;
            }
            let local = iface.ip();
            let Some(target) = targets.iter().find(|t| t.is_ipv4() == local.is_ipv4()) else {
                continue;
            };
            if self.can_reach(local, *target).await {
                debug!(interface = %iface.name, address = %local, "found routable interface");
                return Some(local.to_string());
            }
        }

        None
    }
}

#[derive(Debug, Clone)]
struct IdentityState {
    identity: String,
    valid: bool,
    last_refresh: Instant,
}

/// Node identity resolved through a [`HostResolver`] and memoised.
pub struct DefaultNodeIdentity {
    resolver: Arc<dyn HostResolver>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    runtime_name: String,
    state: RwLock<IdentityState>,
    refresh: Mutex<()>,
}

impl DefaultNodeIdentity {
    /// Resolves the initial identity.
    pub async fn new(
        resolver: Arc<dyn HostResolver>,
        clock: Arc<dyn Clock>,
        refresh_interval: Duration,
    ) -> Self {
        let runtime_name = runtime_name();
        let state = resolve_state(resolver.as_ref(), &runtime_name, clock.now()).await;
        info!(identity = %state.identity, valid = state.valid, "node identity resolved");

        Self {
            resolver,
            clock,
            refresh_interval,
            runtime_name,
            state: RwLock::new(state),
            refresh: Mutex::new(()),
        }
    }

    /// Resolves the identity with the interface check from `config`.
    pub async fn from_config(config: &IdentityConfig) -> Self {
        Self::new(
            Arc::new(InterfaceHostResolver::from_config(config)),
            Arc::new(TokioClock),
            config.refresh_interval(),
        )
        .await
    }

    fn needs_refresh(&self) -> bool {
        let state = self.state.read();
        !state.valid
            && self.clock.now().saturating_duration_since(state.last_refresh) > self.refresh_interval
    }
}

#[async_trait]
impl NodeIdentity for DefaultNodeIdentity {
    async fn node_identity(&self) -> String {
        if self.needs_refresh() {
            // Callers arriving during a refresh read the previous value.
            if let Ok(_guard) = self.refresh.try_lock() {
                if self.needs_refresh() {
                    let state =
                        resolve_state(self.resolver.as_ref(), &self.runtime_name, self.clock.now()).await;
                    if state.valid {
                        info!(identity = %state.identity, "node identity became valid");
                    }
                    *self.state.write() = state;
                }
            }
        }
        self.state.read().identity.clone()
    }

    fn is_valid(&self) -> bool {
        self.state.read().valid
    }
}

impl std::fmt::Debug for DefaultNodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultNodeIdentity")
            .field("state", &*self.state.read())
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

async fn resolve_state(resolver: &dyn HostResolver, runtime_name: &str, now: Instant) -> IdentityState {
    match resolver.resolve().await {
        Some(host) => IdentityState {
            identity: format!("{host}:{runtime_name}"),
            valid: true,
            last_refresh: now,
        },
        None => {
            warn!("no routable interface found, node identity is invalid");
            IdentityState {
                identity: format!("{UNKNOWN_HOST}:{runtime_name}"),
                valid: false,
                last_refresh: now,
            }
        }
    }
}

fn runtime_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_owned());
    format!("{}@{}", std::process::id(), host)
}
