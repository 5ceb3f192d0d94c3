//! # fed-server
//!
//! Composition root of the federation engine.
//!
//! This crate wires the engine to its surroundings:
//! - Configuration from the environment
//! - Failover repository selection (Redis or in-memory)
//! - Tracing initialisation
//! - The background sweep and its graceful shutdown
//!
//! ## Architecture
//!
//! Metadata, crypto, local sessions, account storage and outbound transport
//! are owned by the hosting application and injected at assembly time, so
//! one process can run several engines with different collaborators.
//!
//! ## Usage
//!
//! ```ignore
//! use fed_server::{Server, ServerConfig};
//!
//! fed_server::init_tracing("info");
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config, ports, accounts, transport).await?;
//! let engine = server.engine().clone();
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod providers;

pub use config::ServerConfig;

use std::future::Future;
use std::sync::Arc;

use fed_account::AccountFederationStore;
use fed_protocol_saml::{FederationEngine, Transport};
use fed_spi::Ports;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice
/// leaves the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// An assembled federation engine with its lifecycle.
pub struct Server {
    config: ServerConfig,
    engine: FederationEngine,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// This validates the configuration and connects the failover repository.
    pub async fn new(
        config: ServerConfig,
        ports: Ports,
        accounts: Arc<dyn AccountFederationStore>,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        config.engine.validate()?;
        let repository = providers::token_repository(&config.engine.repository).await?;
        let engine = FederationEngine::new(
            config.engine.clone(),
            ports,
            repository,
            accounts,
            transport,
        );

        tracing::info!(
            dispatch_timeout_ms = config.engine.logout.dispatch_timeout_ms,
            concurrent_dispatch = config.engine.logout.concurrent_dispatch,
            "federation engine assembled"
        );
        Ok(Self { config, engine })
    }

    /// Returns the engine.
    #[must_use]
    pub const fn engine(&self) -> &FederationEngine {
        &self.engine
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the background sweep until a shutdown signal is received.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the background sweep until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let (stop, stopped) = watch::channel(false);
        let sweeper = self
            .engine
            .spawn_sweeper(self.config.engine.artifact.sweep_interval(), stopped);

        shutdown.await;
        let _ = stop.send(true);
        sweeper.await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
