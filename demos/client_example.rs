//! LogRelay Client Example

use logrelay::client::LogClient;
use logrelay::types::RecordFields;
use serde_json::json;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("logrelay=info").init();

    println!("Starting LogRelay Client Example");

    let host = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());
    let port = std::env::args()
        .nth(2)
        .map(|p| p.parse::<u16>())
        .transpose()?
        .unwrap_or(logrelay::config::DEFAULT_PORT);

    match LogClient::connect(&host, port, "example-client").await {
        Ok(client) => {
            println!("Connected to collector at {}:{} as {}", host, port, client.name());

            client.info("This is a test message").await?;
            client.warning("This is a warning").await?;
            client.error("This is an error message").await?;

            // Logging with structured fields
            let mut fields = RecordFields::new();
            fields.insert("user_id".to_string(), json!(12345));
            fields.insert("action".to_string(), json!("login"));
            client.info_with_fields("User login successful", fields).await?;

            // Stop the collector during this loop to watch the client reconnect.
            for i in 1..=5 {
                if let Err(e) = client.info(format!("Processing iteration {}", i)).await {
                    eprintln!("Record {} not delivered: {}", i, e);
                }
                sleep(Duration::from_millis(500)).await;
            }

            let stats = client.stats().await;
            println!(
                "Sent {} frames over {} connect cycles",
                stats.frames_sent, stats.reconnect_cycles
            );

            client.close().await?;
            println!("Client connection closed");
        }
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            eprintln!("Make sure the collector is running");
        }
    }

    Ok(())
}
