//! RPC gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP client                 ┌──────────────────────────────────────────────┐
//!     ────────────────────────────┼─▶ http::server ─▶ request classification      │
//!                                 │        │                                      │
//!                                 │        ├─ unary ──────┐                       │
//!                                 │        ├─ upload ─────┼─▶ load_balancer pool ─┼──▶ RPC backends
//!                                 │        └─ download ───┘     (round robin)     │
//!     ◀───────────────────────────┼── status mapper / streamed file body          │
//!                                 │                                              │
//!                                 │  config (TOML + watcher)  observability      │
//!                                 │  journal   lifecycle      admin API          │
//!                                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_gateway::admin::setup_admin_router;
use rpc_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use rpc_gateway::lifecycle::{termination_signal, Shutdown};
use rpc_gateway::observability::{init_logging, metrics::init_metrics};
use rpc_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "HTTP gateway in front of RPC backends", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_prefix = %config.listener.api_prefix,
        endpoints = config.backend.addresses.len(),
        sync_invoke_ms = config.timeouts.sync_invoke().as_millis() as u64,
        stream_invoke_ms = config.timeouts.stream_invoke().as_millis() as u64,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Hot reload. The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config.clone());

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin = setup_admin_router(server.state());
        let admin_shutdown = shutdown.wait();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(admin_shutdown)
                .await
            {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        termination_signal().await;
        signal_shutdown.trigger();
    });

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
