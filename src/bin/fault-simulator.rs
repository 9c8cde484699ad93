//! Unreliable backend: random latency, random 500s.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use resilience_lab::config;
use resilience_lab::lifecycle::{signals, Shutdown};
use resilience_lab::observability::logging;
use resilience_lab::simulator::SimulatorServer;

#[derive(Parser)]
#[command(name = "fault-simulator")]
#[command(about = "Backend that injects latency and failures into every request", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `simulator.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    logging::init_logging(&config.observability, "resilience_lab");

    let bind = cli.bind.unwrap_or_else(|| config.simulator.bind_address.clone());
    let listener = TcpListener::bind(&bind).await?;

    let shutdown = Shutdown::new();
    let server = tokio::spawn(SimulatorServer::new(&config.simulator).run(listener, shutdown.subscribe()));

    signals::shutdown_on_signal(&shutdown).await;
    server.await??;
    Ok(())
}
