#![forbid(unsafe_code)]
//! Ledgerline WebSocket server

use clap::Parser;
use colored::*;
use ledgerline::config::{load_config, load_config_from};
use ledgerline::node::{init_logging, Node};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Interface to listen on
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on
    #[arg(long, short)]
    port: Option<u16>,
    /// Leading zero characters a block hash must carry
    #[arg(long, short)]
    difficulty: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(difficulty) = cli.difficulty {
        config.ledger.difficulty = difficulty;
    }
    config.validate()?;

    init_logging();

    println!("{}", "⛓  Ledgerline".bright_cyan().bold());
    println!("   listening on {}", config.bind_address().bright_yellow());
    println!("   difficulty   {}", config.ledger.difficulty.to_string().bright_yellow());

    Node::new(config).start().await?;
    Ok(())
}
