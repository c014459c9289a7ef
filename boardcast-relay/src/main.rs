//! `boardcast-relay`: forwards moves between connected boards.
//!
//! ```bash
//! boardcast-relay                          # 0.0.0.0:4000
//! boardcast-relay --bind 127.0.0.1:8080 --peer-buffer 64
//! BOARDCAST_LOG=debug boardcast-relay
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use boardcast_relay::config::{RelayCliArgs, RelayConfig};
use boardcast_relay::relay::{self, RelayState, ServerError};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = RelayCliArgs::parse();
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("boardcast-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match serve(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "relay stopped");
            ExitCode::FAILURE
        }
    }
}

/// Runs the relay until Ctrl-C, then closes every board's connection.
async fn serve(config: &RelayConfig) -> Result<(), ServerError> {
    let state = Arc::new(RelayState::with_config(config));
    let (addr, handle) =
        relay::start_server_with_shutdown(&config.bind_addr, state, ctrl_c()).await?;
    tracing::info!(
        %addr,
        peer_buffer = config.peer_buffer,
        send_timeout = ?config.send_timeout,
        "relay listening"
    );

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "relay task panicked");
    }
    tracing::info!("relay shut down");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the relay runs until killed.
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
