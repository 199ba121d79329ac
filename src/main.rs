//! LogRelay Server Binary
//!
//! Collects framed log records over TCP and re-dispatches them locally.

use clap::Parser;
use logrelay::config::ServerConfig;
use logrelay::server::{ConfiguredSink, LogServer};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "logrelay-server")]
#[command(about = "Collector for records shipped by logrelay clients")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,

    /// Also write records to per-logger files in this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Relayed records carry their own levels, so their target is never filtered.
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "logrelay=debug,logrelay::relayed=trace,info"
    } else {
        "logrelay=info,logrelay::relayed=trace,warn"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose))
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting LogRelay Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(output) = args.output {
        config.sinks.file.enabled = true;
        config.sinks.file.output_directory = output;
    }

    config.validate()?;

    info!("Bind address: {}", config.bind_address());
    info!("Listen backlog: {}", config.server.backlog);
    info!("Keep-alive: {}", config.server.keepalive);
    if config.sinks.file.enabled {
        info!("Output directory: {}", config.sinks.file.output_directory.display());
    }

    let sink = ConfiguredSink::from_config(&config).await?;
    if !sink.is_active() {
        warn!("No sink enabled, received records will be discarded");
    }

    let server = LogServer::bind(config, sink).await?;
    let shutdown = server.shutdown_handle();

    // First Ctrl-C stops accepting and drains; a second one exits immediately.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Shutdown signal received, draining open connections");
        shutdown.shutdown();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second signal received, exiting without draining");
            std::process::exit(130);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("LogRelay Server stopped");
    Ok(())
}
