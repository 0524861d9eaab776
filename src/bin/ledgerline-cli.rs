#![forbid(unsafe_code)]
//! Command-line client for a Ledgerline server

use clap::{Parser, Subcommand};
use colored::*;
use futures_util::{SinkExt, StreamExt};
use ledgerline::clock;
use ledgerline::protocol::{ClientMessage, ServerMessage};
use ledgerline::transaction::Transaction;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:8080")]
    url: String,
    /// User identifier to join as
    #[arg(long, short)]
    user: String,
    /// Seconds to wait for the server's answer
    #[arg(long, default_value_t = 60)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join and print the ledger state
    Join,
    /// Submit a transfer to the pending pool
    Send {
        /// Recipient user identifier
        recipient: String,
        /// Amount to transfer
        amount: f64,
    },
    /// Ask the server to seal the pending pool into a block
    Mine,
    /// Stay connected and print every update
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut socket, _) = connect_async(cli.url.as_str()).await?;
    println!("{} {}", "Connected to".bright_cyan(), cli.url.bright_yellow());

    send(&mut socket, &ClientMessage::Join {
        user_id: cli.user.clone(),
        timestamp: Some(clock::now()),
    })
    .await?;

    let mut chain_length = 0;
    wait_for(&mut socket, cli.timeout, |message| {
        if let ServerMessage::BlockchainUpdate { data } = message {
            chain_length = data.len();
        }
        matches!(message, ServerMessage::UserList { .. })
    })
    .await?;

    match cli.command {
        Commands::Join => {}
        Commands::Send { recipient, amount } => {
            let transaction = Transaction::new(cli.user.clone(), recipient, amount);
            send(&mut socket, &ClientMessage::NewTransaction { transaction }).await?;
            wait_for(&mut socket, cli.timeout, |message| {
                matches!(message, ServerMessage::BalanceUpdate { .. })
            })
            .await?;
        }
        Commands::Mine => {
            send(&mut socket, &ClientMessage::MineBlock {
                user_id: cli.user.clone(),
            })
            .await?;
            wait_for(&mut socket, cli.timeout, |message| match message {
                ServerMessage::BlockchainUpdate { data } => data.len() > chain_length,
                ServerMessage::Error { .. } => true,
                _ => false,
            })
            .await?;
        }
        Commands::Watch => {
            while let Some(message) = next_message(&mut socket).await? {
                print_message(&message);
            }
            println!("{}", "Server closed the connection".yellow());
        }
    }

    let _ = socket.close(None).await;
    Ok(())
}

async fn send(socket: &mut Socket, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
    socket.send(Message::Text(message.encode()?)).await?;
    Ok(())
}

/// Print incoming messages until `done` accepts one.
async fn wait_for<F>(socket: &mut Socket, timeout_secs: u64, done: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnMut(&ServerMessage) -> bool,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs), read_until(socket, done)).await {
        Ok(result) => result,
        Err(_) => Err(format!("no answer from server within {}s", timeout_secs).into()),
    }
}

async fn read_until<F>(socket: &mut Socket, mut done: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnMut(&ServerMessage) -> bool,
{
    while let Some(message) = next_message(socket).await? {
        print_message(&message);
        if done(&message) {
            return Ok(());
        }
    }
    Err("server closed the connection".into())
}

async fn next_message(socket: &mut Socket) -> Result<Option<ServerMessage>, Box<dyn std::error::Error>> {
    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => match ServerMessage::decode(&text) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => eprintln!("{} {}", "Ignoring unreadable frame:".red(), e),
            },
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

fn print_message(message: &ServerMessage) {
    match message {
        ServerMessage::BlockchainUpdate { data } => {
            println!("{} {} blocks", "⛓  Chain:".bright_cyan().bold(), data.len());
            for block in data {
                println!(
                    "   #{:<4} {}  nonce {:<8} {} tx  mined by {}",
                    block.index,
                    &block.hash[..block.hash.len().min(16)],
                    block.nonce,
                    block.transactions.len(),
                    block.mined_by.bright_yellow()
                );
            }
        }
        ServerMessage::PendingTransactions { data } => {
            println!("{} {}", "⏳ Pending:".bright_cyan().bold(), data.len());
            for tx in data {
                println!("   {} → {}  {}", tx.sender, tx.recipient, tx.amount);
            }
        }
        ServerMessage::NewTransaction { transaction } => {
            println!(
                "{} {} → {}  {}",
                "📨 New transaction:".bright_cyan(),
                transaction.sender,
                transaction.recipient,
                transaction.amount
            );
        }
        ServerMessage::BalanceUpdate { balance } => {
            println!("{} {}", "💰 Balance:".green().bold(), balance.to_string().green());
        }
        ServerMessage::UserList { data } => {
            let names: Vec<&str> = data.iter().map(|u| u.id.as_str()).collect();
            println!("{} {}", "👥 Users:".bright_cyan(), names.join(", "));
        }
        ServerMessage::Error { message } => {
            eprintln!("{} {}", "❌".red(), message.red());
        }
    }
}
