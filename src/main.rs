//! relay server binary — wires together config, metrics, and the hub server.

#![deny(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use relay::config::ServerConfig;
use relay::metrics;
use relay::server::RelayServer;
use tracing_subscriber::EnvFilter;

/// Real-time WebSocket broadcast relay.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "WebSocket broadcast relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Maximum concurrent connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Inactivity deadline in seconds. The probe interval is derived from it
    /// (9/10 of the deadline).
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("relay=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };
    if let Some(n) = cli.max_connections {
        config.max_connections = n;
    }
    if let Some(secs) = cli.idle_timeout_secs {
        config.idle_timeout_secs = secs;
        config.probe_interval_millis = secs * 900;
    }

    let handle = metrics::install_recorder();
    let server = RelayServer::new(config).with_metrics(handle);

    let shutdown = server.shutdown().clone();
    let _ = tokio::spawn(async move { shutdown.on_signal().await });

    server.serve().await?;
    Ok(())
}
