// Consumer side of the dispatch queue.
//
// `Visualizer` owns playback state and the renderer; `ConsumerLoop` drives it
// at render rate and publishes a status snapshot for the control API.

use crate::dispatch::DispatchQueue;
use crate::playback::{PlaybackEngine, PlaybackStatus};
use crate::render::Renderer;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Playback engine bound to the renderer it drives.
pub struct Visualizer<R> {
    engine: PlaybackEngine,
    renderer: R,
}

impl<R: Renderer> Visualizer<R> {
    pub fn new(engine: PlaybackEngine, renderer: R) -> Self {
        Self { engine, renderer }
    }

    /// Pre-set signals to red before any data arrives.
    pub fn init_signals<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.engine.init_signals(ids, &mut self.renderer);
    }

    /// Parse and load a payload from the ingest listener.
    ///
    /// A bad payload is logged and dropped; playback carries on untouched.
    pub fn load_payload(&mut self, payload: &str) -> bool {
        match self.engine.ingest(payload) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, bytes = payload.len(), "Failed to parse traffic data");
                false
            }
        }
    }

    pub fn start(&mut self) -> bool {
        self.engine.start()
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn set_tick_interval(&mut self, seconds: f64) -> Duration {
        self.engine.set_tick_interval(seconds)
    }

    /// One render frame: maybe apply a timestep, then interpolate.
    pub fn frame(&mut self, now: Instant, dt: f32) {
        self.engine.tick(now, &mut self.renderer);
        self.engine.animate(dt, &mut self.renderer);
    }

    /// Remove every vehicle from the renderer.
    pub fn clear(&mut self) {
        self.engine.clear_entities(&mut self.renderer);
    }

    pub fn status(&self) -> PlaybackStatus {
        self.engine.status()
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

/// Single-threaded loop owning the [`Visualizer`].
pub struct ConsumerLoop<R> {
    queue: DispatchQueue<Visualizer<R>>,
    visualizer: Visualizer<R>,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl<R: Renderer> ConsumerLoop<R> {
    pub fn new(
        queue: DispatchQueue<Visualizer<R>>,
        visualizer: Visualizer<R>,
    ) -> (Self, watch::Receiver<PlaybackStatus>) {
        let (status_tx, status_rx) = watch::channel(visualizer.status());
        (
            Self {
                queue,
                visualizer,
                status_tx,
            },
            status_rx,
        )
    }

    /// Drain queued actions, advance playback and publish status.
    ///
    /// Returns the number of actions executed.
    pub fn tick(&mut self, now: Instant, dt: f32) -> usize {
        let executed = self.queue.drain(&mut self.visualizer);
        if executed > 0 {
            debug!(actions = executed, "Drained dispatch queue");
        }
        self.visualizer.frame(now, dt);
        self.publish();
        executed
    }

    pub fn visualizer(&self) -> &Visualizer<R> {
        &self.visualizer
    }

    /// Tick at `render_hz` until `shutdown` becomes true or its sender drops.
    ///
    /// Clears every vehicle on the way out and hands the visualizer back.
    pub async fn run(mut self, render_hz: u32, mut shutdown: watch::Receiver<bool>) -> Visualizer<R> {
        let period = Duration::from_secs_f64(1.0 / f64::from(render_hz.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(render_hz, "Consumer loop started");
        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let dt = now.saturating_duration_since(last_frame).as_secs_f32();
                    last_frame = now;
                    self.tick(now, dt);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        // Actions queued before shutdown still run.
        self.queue.drain(&mut self.visualizer);
        self.visualizer.clear();
        self.publish();
        info!("Consumer loop stopped");
        self.visualizer
    }

    fn publish(&self) {
        let status = self.visualizer.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
