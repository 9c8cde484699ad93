use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use resilience_lab::observability::report::EventSummary;

#[derive(Parser)]
#[command(name = "lab-cli")]
#[command(about = "Inspect a running client service or summarize an event log", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Breaker state, counters and effective configuration
    Health,
    /// Make one call through the resilience layer
    Call,
    /// Summarize an event log file
    Report {
        /// Path to the event log
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Call => {
            let res = client.get(format!("{}/call", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Report { file } => {
            let summary = EventSummary::from_reader(BufReader::new(File::open(&file)?))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        eprintln!("Client service returned status {}", status);
    }
    Ok(())
}
