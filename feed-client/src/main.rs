use anyhow::{Context, Result};
use feed_client::{load_timesteps, send, FeedConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_client=info".into()),
        )
        .init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: feed-client <timesteps.json | timesteps.json.gz>")?;

    let config = FeedConfig::from_env();
    info!(
        server_addr = %config.server_addr,
        chunk_bytes = config.chunk_bytes,
        "Configuration loaded"
    );

    let json = load_timesteps(&path)?;
    send(&config.server_addr, &config.marker, json.trim(), config.chunk_bytes).await?;

    Ok(())
}
