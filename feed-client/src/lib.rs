//! Simulator-side sender for `traffic-replay`.
//!
//! Loads a timestep file and delivers it over the ingest wire protocol:
//!
//! ```text
//! client                         server
//!   | ------- connect ------------> |
//!   | <------ greeting ------------ |
//!   | -- marker + JSON + "$" -----> |   (any fragmentation)
//!   | ------- FIN ----------------> |
//! ```

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};
use traffic_replay::framing::{DEFAULT_MARKERS, SENTINEL};
use traffic_replay::timestep;

/// Upper bound on the greeting read after connect
const GREETING_BUFFER_BYTES: usize = 4096;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:1101";

/// Sender settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub server_addr: String,
    pub marker: String,
    /// Bytes per write; 0 sends the whole frame at once
    pub chunk_bytes: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            marker: DEFAULT_MARKERS[0].to_string(),
            chunk_bytes: 0,
        }
    }
}

impl FeedConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("FEED_SERVER_ADDR") {
            cfg.server_addr = v;
        }
        if let Some(v) = lookup("FEED_MARKER") {
            cfg.marker = v;
        }
        if let Some(v) = lookup("FEED_CHUNK_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.chunk_bytes = n;
            }
        }

        cfg
    }
}

/// Read a timestep file (`.gz` is decompressed) and check it parses.
pub fn load_timesteps(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut text = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file)
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to decompress {}", path.display()))?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let records = timestep::parse(&text)
        .with_context(|| format!("{} is not a valid timestep array", path.display()))?;
    info!(path = %path.display(), timesteps = records.len(), "Loaded timesteps");

    Ok(text)
}

/// `marker ++ json ++ "$"`
pub fn frame_message(marker: &str, json: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(marker.len() + json.len() + 1);
    frame.extend_from_slice(marker.as_bytes());
    frame.extend_from_slice(json.as_bytes());
    frame.push(SENTINEL);
    frame
}

/// Connect, read the greeting, send one framed message and close the write side.
///
/// Returns the server's greeting.
pub async fn send(addr: &str, marker: &str, json: &str, chunk_bytes: usize) -> Result<String> {
    if json.as_bytes().contains(&SENTINEL) {
        bail!("payload contains the frame terminator '$'");
    }

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;

    let mut buf = vec![0u8; GREETING_BUFFER_BYTES];
    let n = stream
        .read(&mut buf)
        .await
        .context("Failed to read server greeting")?;
    let greeting = String::from_utf8_lossy(&buf[..n]).into_owned();
    info!(addr = %addr, greeting = %greeting, "Connected to server");

    let frame = frame_message(marker, json);
    if chunk_bytes == 0 {
        stream.write_all(&frame).await.context("Failed to send frame")?;
    } else {
        for chunk in frame.chunks(chunk_bytes) {
            stream.write_all(chunk).await.context("Failed to send frame")?;
            debug!(bytes = chunk.len(), "Sent chunk");
        }
    }
    stream.flush().await.context("Failed to flush frame")?;
    stream.shutdown().await.context("Failed to close connection")?;

    info!(bytes = frame.len(), "Traffic data sent");
    Ok(greeting)
}
