//! noughts - a real-time two-player tic-tac-toe server

use anyhow::Result;
use clap::Parser;
use noughts::config::Config;
use noughts::server::GameServer;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "noughts")]
#[command(about = "A real-time two-player tic-tac-toe server")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Interface to bind
    #[arg(long, env = "NOUGHTS_HOST")]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long, env = "NOUGHTS_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Starting noughts server on {}", config.bind_addr());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                // Keep the sender alive so the server is not shut down by accident
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    GameServer::new(config).run(shutdown_rx).await
}
