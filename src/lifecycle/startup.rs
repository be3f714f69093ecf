//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (collector, relay engine, console, signals)
//! - Wait for shutdown, then drain in-flight relay pairs
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds before any task starts, so a port clash aborts
//!   startup instead of leaving a half-running proxy

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use tokio::io::BufReader;

use crate::config::ProxyConfig;
use crate::health::{DockerStatsSource, HealthCollector, MetricsSource};
use crate::lifecycle::{console, signals, Shutdown};
use crate::load_balancer::{RegistryError, RoutingState};
use crate::net::listener::ListenerError;
use crate::net::{Listener, RelayEngine, RelaySettings};
use crate::observability::metrics;

/// Fatal errors raised before the proxy starts serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid target registry: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("invalid metrics address '{address}': {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),
}

/// Build the routing state from configured targets, in file order.
pub fn build_state(config: &ProxyConfig) -> Result<RoutingState, RegistryError> {
    let state = RoutingState::new(config.strategy);
    for target in &config.targets {
        state.register(&target.name, &target.host, target.host_port)?;
    }
    Ok(state)
}

/// A proxy whose listener is bound but whose tasks have not started.
pub struct Proxy<S> {
    config: ProxyConfig,
    state: Arc<RoutingState>,
    listener: Listener,
    source: S,
}

impl Proxy<DockerStatsSource> {
    /// Bind using the Docker Engine API as the metrics source.
    pub async fn bind(config: ProxyConfig) -> Result<Self, StartupError> {
        let source = DockerStatsSource::from_config(&config.monitor);
        Self::bind_with_source(config, source).await
    }
}

impl<S: MetricsSource> Proxy<S> {
    pub async fn bind_with_source(config: ProxyConfig, source: S) -> Result<Self, StartupError> {
        if config.observability.metrics_enabled {
            let address = &config.observability.metrics_address;
            let addr: SocketAddr = address.parse().map_err(|source| StartupError::MetricsAddress {
                address: address.clone(),
                source,
            })?;
            metrics::init_metrics(addr)?;
        }

        let state = Arc::new(build_state(&config)?);
        tracing::info!(
            strategy = %state.strategy(),
            targets = state.len(),
            "Routing state initialized"
        );

        let listener = Listener::bind(&config.listener).await?;

        Ok(Self {
            config,
            state,
            listener,
            source,
        })
    }

    pub fn state(&self) -> Arc<RoutingState> {
        Arc::clone(&self.state)
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires, then drain for the configured grace period.
    ///
    /// Triggers sent before this is called are not observed.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), StartupError> {
        let Self {
            config,
            state,
            listener,
            source,
        } = self;

        let mut stopped = shutdown.subscribe();

        let collector = HealthCollector::new(Arc::clone(&state), source, &config.monitor);
        let collector_task = tokio::spawn(collector.run(shutdown.subscribe()));

        let engine = RelayEngine::new(Arc::clone(&state), RelaySettings::from(&config.relay));
        let tracker = engine.tracker();
        let engine_task = tokio::spawn(engine.run(listener, shutdown.subscribe()));

        let signal_task = signals::spawn_signal_listener(shutdown.clone());

        let console_task = config.console.enabled.then(|| {
            tokio::spawn(console::run_console(
                Arc::clone(&state),
                shutdown.clone(),
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            ))
        });

        tracing::info!("Proxy running");

        let _ = stopped.recv().await;
        tracing::info!("Shutdown started");

        for (name, task) in [
            ("relay engine", engine_task),
            ("collector", collector_task),
            ("signal listener", signal_task),
        ] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Task ended abnormally");
            }
        }
        if let Some(task) = console_task {
            let _ = task.await;
        }

        let grace = Duration::from_secs(config.shutdown.grace_secs);
        if tracker.wait_for_drain(grace).await {
            tracing::info!("All relay pairs drained");
        } else {
            tracing::warn!(
                remaining = tracker.active_count(),
                grace_secs = config.shutdown.grace_secs,
                "Grace period expired with relay pairs still open"
            );
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Bind with the Docker metrics source and serve until shutdown.
pub async fn run(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    Proxy::bind(config).await?.run(shutdown).await
}
