//! Component engine binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   engine.toml ──▶ config loader ──▶ EngineConfig
//!                                        │
//!                                        ▼
//!   ┌────────────────────────────── Engine ──────────────────────────────┐
//!   │                                                                    │
//!   │  register ──▶ configure (all) ──▶ start (all) ──▶ publish Locator  │
//!   │                                                                    │
//!   │   ┌────┐   ┌────────┐   ┌─────┐          ┌──────────────────┐      │
//!   │   │ db │   │ broker │   │ api │ ◀──────▶ │ Locator (by name) │      │
//!   │   └────┘   └────────┘   └─────┘          └──────────────────┘      │
//!   │      │          │          │                                       │
//!   │      └──────────┴──────────┴──▶ error channel ──▶ failure monitor  │
//!   │                                                                    │
//!   │  SIGINT/SIGTERM ──▶ drain delay ──▶ shutdown (reverse order)       │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use component_engine::components::{ApiComponent, BrokerComponent, DbComponent};
use component_engine::config::{load_config, ConfigError, EngineConfig};
use component_engine::observability::{init_logging, init_metrics};
use component_engine::Engine;

/// Configuration file could not be loaded or validated.
const EXIT_CONFIG: u8 = 78;

#[derive(Parser, Debug)]
#[command(name = "component-engine")]
#[command(about = "Run configured components under the lifecycle engine", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "engine.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the drain delay between a termination signal and shutdown
    #[arg(long)]
    drain_ms: Option<u64>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&args, &e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if let Some(level) = &args.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(drain_ms) = args.drain_ms {
        config.engine.drain_timeout_ms = drain_ms;
    }

    if let Err(e) = init_logging(&config.observability.log_level, config.observability.log_format) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    if args.check {
        tracing::info!(
            path = %args.config.display(),
            components = config.components.len(),
            "Configuration is valid"
        );
        return ExitCode::SUCCESS;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %args.config.display(),
        "component-engine starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = build_engine(&config);
    match engine.run_and_wait().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, source = ?std::error::Error::source(&e), "Engine stopped with an error");
            ExitCode::from(&e)
        }
    }
}

/// Register the built-in components that have a configuration section.
fn build_engine(config: &EngineConfig) -> Engine {
    let mut engine = Engine::from_config(config);

    if config.components.contains_key("db") {
        engine = engine.with(DbComponent::new());
    }
    if config.components.contains_key("broker") {
        engine = engine.with(BrokerComponent::new());
    }
    if config.components.contains_key("api") {
        engine = engine.with(ApiComponent::new());
    }

    for name in config.component_names() {
        if !matches!(name, "db" | "broker" | "api") {
            tracing::warn!(component = %name, "No built-in component with this name, section ignored");
        }
    }
    engine
}

fn report_config_error(args: &Args, err: &ConfigError) {
    // Logging is not up yet.
    eprintln!(
        "failed to load configuration from {}: {err}",
        args.config.display()
    );
}
