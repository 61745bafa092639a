//! Demo of Server-Timing propagation across nested services.
//!
//! ```text
//!   browser ──▶ handler ──GET /level1──▶ server1
//!                  │
//!                  └──────GET /level1──▶ server2 ──GET /level2──▶ server1
//! ```
//!
//! The browser receives one `Server-Timing` header describing all three
//! outbound calls, nested ones first.

use clap::Parser;
use std::path::PathBuf;

use client_timing::config::{load_config, DemoConfig};
use client_timing::http::DemoServer;
use client_timing::lifecycle::Shutdown;
use client_timing::observability::logging::{init_logging, DEFAULT_FILTER};

#[derive(Parser)]
#[command(name = "client-timing-demo")]
#[command(about = "Nested services demonstrating Server-Timing propagation", long_about = None)]
struct Cli {
    /// TOML configuration file. The built-in three-service topology is used
    /// when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = DEFAULT_FILTER)]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DemoConfig::default(),
    };

    tracing::info!(
        services = config.services.len(),
        delay_ms = config.delay_ms,
        "Configuration loaded"
    );

    let server = DemoServer::bind(&config).await?;
    if let Some(addr) = server.local_addr(&config.entry) {
        tracing::info!("Open your browser on http://{} to see server-timing", addr);
    }

    let shutdown = Shutdown::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = ctrl_c.trigger_on_ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    });

    server.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
