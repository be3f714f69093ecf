//! Container proxy (v1)
//!
//! Accepts TCP clients on one port and relays each to the local container
//! with the lowest recent CPU usage (or round robin).
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               CONTAINER PROXY                │
//!                        │                                              │
//!   Client ──────────────┼─▶ net::listener ─▶ net::relay ──────────────┼──▶ Container
//!                        │                        │                     │    (host_port)
//!                        │                        ▼                     │
//!                        │              load_balancer::RoutingState     │
//!                        │                        ▲                     │
//!                        │                        │ report_metric       │
//!                        │               health::collector ◀────────────┼─── Docker API
//!                        │                                              │    (unix socket)
//!                        │  config · lifecycle (signals, console) ·     │
//!                        │  observability (logs, metrics)               │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use container_proxy::config::{load_config_with, ConfigOverrides};
use container_proxy::lifecycle::startup;
use container_proxy::observability::logging;
use container_proxy::Shutdown;

/// How long runtime teardown waits for blocked tasks (e.g. a stdin read).
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "container-proxy")]
#[command(about = "CPU-aware TCP load balancer for local containers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Do not read console commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        log_level: cli.log_level,
        console_enabled: cli.no_console.then_some(false),
    };
    let config = load_config_with(&cli.config, &overrides)?;

    logging::init_logging(&config.observability.log_level)?;

    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "container-proxy starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        strategy = %config.strategy,
        targets = config.targets.len(),
        interval_secs = config.monitor.interval_secs,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(startup::run(config, Shutdown::new()));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    result?;
    Ok(())
}
