//! `boardcast` — publish or watch moves through a Boardcast relay.
//!
//! ```bash
//! # Follow every move made on other boards
//! boardcast watch
//!
//! # Publish one move
//! boardcast move e2 e4 --url ws://127.0.0.1:4000/
//! ```

use std::process::ExitCode;

use boardcast::cli::{Cli, Command};
use boardcast::client::{ClientError, ClientEvent, RelayClient};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("boardcast: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let client = RelayClient::connect(&cli.url).await?;

    match cli.command {
        Command::Move(args) => {
            client.send_move(args.from, args.to).await?;
            tracing::info!(from = %args.from, to = %args.to, "move sent");
            client.close().await?;
        }
        Command::Watch => loop {
            tokio::select! {
                event = client.next_event() => match event? {
                    ClientEvent::Move { from, to } => println!("{from} -> {to}"),
                    ClientEvent::Other(text) => println!("? {text}"),
                },
                _ = tokio::signal::ctrl_c() => {
                    let _ = client.close().await;
                    break;
                }
            }
        },
    }

    Ok(())
}
