//! ws-relay server — entry point.
//!
//! Binds a WebSocket listener on the given TCP port and relays every text or
//! binary frame from one client to all others. Each client is greeted with
//! its connection id on accept.
//!
//! # Usage
//!
//! ```text
//! ws-relay-server <PORT>
//! ```
//!
//! A missing or unparseable port fails fast with a non-zero exit. `RUST_LOG`
//! controls log output (defaults to `info`).

use anyhow::anyhow;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_relay::RelayServer;
use ws_relay::config::{ConnectionConfig, DEFAULT_PING_INTERVAL, ServerConfig};

// ============================================================================
// CLI
// ============================================================================

/// WebSocket broadcast relay server.
#[derive(Debug, Parser)]
#[command(
    name = "ws-relay-server",
    about = "Accepts WebSocket connections and relays frames between them",
    version
)]
struct Cli {
    /// TCP port to listen on (all interfaces).
    port: Option<String>,
}

/// Parses the positional port argument.
///
/// Handled by hand rather than by clap so the absent and unparseable cases
/// both report the same "invalid port" failure.
fn parse_port(raw: Option<&str>) -> anyhow::Result<u16> {
    let raw = raw.ok_or_else(|| anyhow!("invalid port: missing <PORT> argument"))?;
    raw.parse::<u16>()
        .map_err(|_| anyhow!("invalid port: {raw:?} is not a 16-bit unsigned integer"))
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let port = parse_port(cli.port.as_deref())?;

    let config = ServerConfig {
        bind_addr: (std::net::Ipv4Addr::UNSPECIFIED, port).into(),
        connection: ConnectionConfig {
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            ..ConnectionConfig::default()
        },
    };
    let server = RelayServer::bind(config).await?;
    info!(port = server.port(), "ws-relay server started");

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C — shutting down");
    server.shutdown().await;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
