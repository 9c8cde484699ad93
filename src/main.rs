//! Resilience client service.
//!
//! # Architecture Overview
//!
//! ```text
//!     ┌──────────────────────────── CLIENT SERVICE ────────────────────────────┐
//!     │                                                                         │
//!     │  worker loop ──┐                                                        │
//!     │                ├──▶ ResilienceClient ──▶ retry ──▶ breaker ──▶ transport ┼──▶ fault simulator
//!     │  GET /call ────┘          │                                             │
//!     │                           ▼                                             │
//!     │                       event log ──▶ tracing + metrics                   │
//!     │                                                                         │
//!     │  GET /health ──▶ breaker snapshot + effective config                    │
//!     └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use url::Url;

use resilience_lab::config;
use resilience_lab::http::{AppState, ClientServer};
use resilience_lab::lifecycle::{signals, worker, Shutdown};
use resilience_lab::observability::{event_log::EventLog, logging, metrics};
use resilience_lab::resilience::{HttpTransport, Request, ResilienceClient};

#[derive(Parser)]
#[command(name = "resilience-lab")]
#[command(about = "Client service calling an unreliable backend through a circuit breaker", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Arc::new(config::load(cli.config.as_deref())?);

    logging::init_logging(&config.observability, "resilience_lab");
    tracing::info!("resilience-lab v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend_url = %config.client.backend_url,
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let log = EventLog::from_config(&config.event_log)?;
    let transport = HttpTransport::new(Url::parse(&config.client.backend_url)?)?;
    tracing::info!(backend = %transport.base_url(), "Calling dependency");
    let client = Arc::new(ResilienceClient::from_config(&config, transport, log));

    let shutdown = Shutdown::new();

    let worker_handle = config.client.worker_enabled.then(|| {
        tokio::spawn(worker::run_worker(
            client.clone(),
            Request::default(),
            config.client.worker_interval(),
            shutdown.subscribe(),
        ))
    });

    let listener = TcpListener::bind(&config.client.bind_address).await?;
    let server = ClientServer::new(AppState {
        client: client.clone(),
        config: config.clone(),
    });
    let server_handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::shutdown_on_signal(&shutdown).await;

    if let Some(handle) = worker_handle {
        let stats = handle.await?;
        tracing::info!(?stats, "Worker stopped");
    }
    server_handle.await??;

    tracing::info!(breaker = %client.breaker().state(), "Shutdown complete");
    Ok(())
}
