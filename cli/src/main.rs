//! Moneta CLI
//!
//! Drives the FX and debt engines from JSON input files and prints JSON.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod inputs;

use commands::{Command, RunContext};

/// Moneta CLI
#[derive(Parser, Debug)]
#[command(name = "moneta")]
#[command(about = "Currency conversion, exchange rates and debt planning")]
struct Args {
    /// JSON rate file; repeat to aggregate several sources
    #[arg(long, global = true)]
    rates: Vec<PathBuf>,

    /// JSON file with monthly income and loans
    #[arg(long, global = true)]
    loans: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!("Starting Moneta CLI");
    debug!(command = ?args.command, "Parsed arguments");

    let ctx = RunContext {
        rates: args.rates,
        loans: args.loans,
    };
    let output = args.command.run(&ctx).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
