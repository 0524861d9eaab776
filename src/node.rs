use crate::config::{load_config, Config};
use crate::error::ChainError;
use crate::hub::{Hub, HubHandle, HubSettings};
use crate::server::Server;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "ledgerline=info";
const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

pub struct Node {
    pub config: Config,
}

/// A node whose listener is bound but not yet accepting.
pub struct BoundNode {
    server: Server,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl Node {
    pub fn new(config: Config) -> Self {
        Node { config }
    }

    /// Load `config.toml` and install the log subscriber.
    pub fn init() -> Result<Self, ChainError> {
        let config = load_config()?;
        init_logging();
        Ok(Node::new(config))
    }

    /// Start the hub and bind the listener.
    pub async fn bind(&self) -> Result<BoundNode, ChainError> {
        let settings = HubSettings::from(&self.config);
        let (hub, hub_task) = Hub::new(settings).spawn();

        let server = Server::bind(&self.config.bind_address(), hub.clone()).await?;
        let local_addr = server.local_addr()?;
        info!(
            address = %local_addr,
            difficulty = settings.difficulty,
            initial_allowance = settings.initial_allowance,
            "ledger server listening"
        );

        Ok(BoundNode {
            server,
            hub,
            hub_task,
            local_addr,
        })
    }

    /// Serve until the listener fails or ctrl-c is received.
    pub async fn start(self) -> Result<(), ChainError> {
        let bound = self.bind().await?;
        bound.serve_until_shutdown().await
    }
}

impl BoundNode {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Accept connections in the background; used by tests and embedders.
    pub fn spawn(self) -> (SocketAddr, HubHandle, JoinHandle<Result<(), ChainError>>) {
        let addr = self.local_addr;
        let hub = self.hub.clone();
        let task = tokio::spawn(self.server.run());
        (addr, hub, task)
    }

    pub async fn serve_until_shutdown(self) -> Result<(), ChainError> {
        let health = tokio::spawn(health_loop(self.hub.clone()));

        let result = tokio::select! {
            result = self.server.run() => result,
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("shutdown requested"),
                    Err(e) => warn!(error = %e, "failed to listen for ctrl-c; shutting down"),
                }
                Ok(())
            }
        };

        health.abort();
        drop(self.hub);
        self.hub_task.abort();
        if let Err(e) = &result {
            error!(error = %e, "ledger server stopped");
        }
        result
    }
}

async fn health_loop(hub: HubHandle) {
    let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match hub.status().await {
            Ok(status) => info!(
                chain_length = status.chain_length,
                pending = status.pending_transactions,
                sessions = status.sessions,
                connections = status.live_connections,
                sealing = status.sealing,
                "node running"
            ),
            Err(e) => {
                warn!(error = %e, "health check failed");
                break;
            }
        }
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default filter; a second call is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
