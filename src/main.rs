use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use traffic_replay::api::{create_router, AppState};
use traffic_replay::config;
use traffic_replay::dispatch;
use traffic_replay::ingest::IngestListener;
use traffic_replay::playback::PlaybackEngine;
use traffic_replay::render::BroadcastRenderer;
use traffic_replay::visualizer::{ConsumerLoop, Visualizer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_replay=info".into()),
        )
        .init();

    info!("Traffic replay starting...");

    let config = config::load().context("Failed to load configuration")?;
    info!(
        ingest_addr = %config.ingest.bind_addr,
        api_enabled = config.api.enabled,
        api_addr = %config.api.bind_addr,
        tick_interval_seconds = config.playback.tick_interval_seconds,
        "Configuration loaded"
    );

    let engine_config = config.engine_config();
    let min_tick_interval = engine_config.min_tick_interval;

    // Renderer publishes to WebSocket clients
    let renderer = BroadcastRenderer::new(config.api.event_buffer.max(1));
    let events = renderer.sender();

    let engine = PlaybackEngine::new(engine_config, config.skin_selector());
    let mut visualizer = Visualizer::new(engine, renderer);
    visualizer.init_signals(&config.signals.initial);

    let (dispatcher, queue) = dispatch::channel();
    let (consumer, status) = ConsumerLoop::new(queue, visualizer);

    // Simulator listener on its own thread
    let listener = IngestListener::bind(config.ingest.clone())?;
    info!(addr = %listener.local_addr(), "Waiting for traffic simulation data");
    let listener = listener.spawn(
        dispatcher.clone(),
        |v: &mut Visualizer<BroadcastRenderer>, payload: String| {
            v.load_payload(&payload);
        },
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_handle = tokio::spawn(consumer.run(config.playback.render_hz, shutdown_rx));

    // Control API
    let server_handle = if config.api.enabled {
        let router = create_router(AppState {
            dispatcher,
            status,
            events,
            min_tick_interval,
        });
        let api_listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
            .await
            .with_context(|| format!("Failed to bind API on {}", config.api.bind_addr))?;
        info!(addr = %config.api.bind_addr, "Control API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(api_listener, router).await {
                error!(error = %e, "Control API server error");
            }
        }))
    } else {
        drop(dispatcher);
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    if let Some(handle) = server_handle {
        handle.abort();
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_handle.await {
        error!(error = %e, "Consumer loop task failed");
    }
    tokio::task::spawn_blocking(move || listener.shutdown())
        .await
        .context("Ingest listener shutdown failed")?;
    info!("Traffic replay stopped");

    Ok(())
}

