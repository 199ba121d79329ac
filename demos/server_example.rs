//! LogRelay Server Example

use logrelay::config::ServerConfig;
use logrelay::server::{ConfiguredSink, LogServer};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("logrelay=debug,info")
        .init();

    println!("Starting LogRelay Server Example");

    // Create temporary directory for this example
    let temp_dir = tempdir()?;
    let log_dir = temp_dir.path().join("logs");

    // Relay to tracing and also keep per-logger files
    let mut config = ServerConfig::default();
    config.sinks.file.enabled = true;
    config.sinks.file.output_directory = log_dir;

    println!("Configuration created:");
    println!("  Address: {}", config.bind_address());
    println!("  Log directory: {}", config.sinks.file.output_directory.display());

    let sink = ConfiguredSink::from_config(&config).await?;
    let server = LogServer::bind(config, sink).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    println!("LogRelay collector listening on {}", server.local_addr()?);
    println!("Press Ctrl+C to stop the server");

    if let Err(e) = server.run().await {
        eprintln!("Server error: {}", e);
    }

    println!("Server stopped");
    Ok(())
}
