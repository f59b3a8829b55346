use crate::interpolation::MotionConfig;
use crate::playback::entities::{ActiveEntities, ActiveEntity, DiffSummary};
use crate::playback::skins::SkinSelector;
use crate::playback::store::TimestepStore;
use crate::playback::PlaybackStatus;
use crate::render::{Renderer, SignalRenderer};
use crate::timestep::{self, ParseError, SignalColor, TimestepRecord};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where playback is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No data, or stopped
    Idle,
    Running,
    /// Every timestep has been applied
    Finished,
}

/// Position and pacing of playback.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackCursor {
    pub current_index: usize,
    pub is_playing: bool,
    pub tick_interval: Duration,
    /// `None` until the first timestep of a run has been applied.
    pub last_tick: Option<Instant>,
}

/// Settings for a [`PlaybackEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    /// Floor for runtime interval changes.
    pub min_tick_interval: Duration,
    pub motion: MotionConfig,
    /// Seed for skin selection; `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            min_tick_interval: Duration::from_millis(100),
            motion: MotionConfig::default(),
            rng_seed: None,
        }
    }
}

/// Timer-driven replay of a timestep sequence.
///
/// Owned by the consumer loop and never shared across threads.
pub struct PlaybackEngine {
    store: TimestepStore,
    cursor: PlaybackCursor,
    state: PlaybackState,
    entities: ActiveEntities,
    signals: BTreeMap<String, SignalColor>,
    motion: MotionConfig,
    min_tick_interval: Duration,
}

impl PlaybackEngine {
    pub fn new(config: EngineConfig, skins: SkinSelector) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tick_interval = config.tick_interval.max(config.min_tick_interval);

        Self {
            store: TimestepStore::new(),
            cursor: PlaybackCursor {
                current_index: 0,
                is_playing: false,
                tick_interval,
                last_tick: None,
            },
            state: PlaybackState::Idle,
            entities: ActiveEntities::new(skins, rng),
            signals: BTreeMap::new(),
            motion: config.motion,
            min_tick_interval: config.min_tick_interval,
        }
    }

    /// Parse `payload` and, on success, replace the store and start over.
    ///
    /// On failure nothing changes: store, cursor and state stay as they were.
    pub fn ingest(&mut self, payload: &str) -> Result<Uuid, ParseError> {
        let records = timestep::parse(payload)?;
        Ok(self.load(records))
    }

    /// Replace the sequence and run it from index 0.
    pub fn load(&mut self, records: Vec<TimestepRecord>) -> Uuid {
        let count = records.len();
        let load_id = self.store.replace(records);
        self.rewind();
        info!(load_id = %load_id, timesteps = count, "Loaded traffic data");
        load_id
    }

    /// Restart playback from the first timestep.
    ///
    /// Returns false (and stays idle) when there is nothing to play.
    pub fn start(&mut self) -> bool {
        if self.store.is_empty() {
            warn!("Start requested with no traffic data loaded");
            return false;
        }
        self.rewind();
        info!(timesteps = self.store.len(), "Playback started");
        true
    }

    pub fn stop(&mut self) {
        if self.state != PlaybackState::Idle {
            info!(index = self.cursor.current_index, "Playback stopped");
        }
        self.state = PlaybackState::Idle;
        self.cursor.is_playing = false;
    }

    /// Change seconds-per-timestep. Values under the floor (or not finite)
    /// are clamped to it. Returns the interval now in effect.
    pub fn set_tick_interval(&mut self, seconds: f64) -> Duration {
        let interval = clamp_interval(seconds, self.min_tick_interval);
        self.cursor.tick_interval = interval;
        info!(
            requested = seconds,
            effective = interval.as_secs_f64(),
            "Tick interval changed"
        );
        interval
    }

    /// Set the listed signals to red without waiting for data.
    pub fn init_signals<S, R>(&mut self, ids: &[S], renderer: &mut R)
    where
        S: AsRef<str>,
        R: SignalRenderer + ?Sized,
    {
        for id in ids {
            set_signal(&mut self.signals, id.as_ref(), SignalColor::Red, renderer);
        }
    }

    /// Apply the next timestep if running and the interval has elapsed.
    ///
    /// Returns the index of the applied timestep.
    pub fn tick<R: Renderer + ?Sized>(&mut self, now: Instant, renderer: &mut R) -> Option<usize> {
        if self.state != PlaybackState::Running {
            return None;
        }
        if let Some(last) = self.cursor.last_tick {
            if now.saturating_duration_since(last) < self.cursor.tick_interval {
                return None;
            }
        }

        let index = self.cursor.current_index;
        let step = match self.store.get(index) {
            Some(step) => step,
            None => {
                self.finish();
                return None;
            }
        };

        for (signal_id, color) in &step.traffic_lights {
            set_signal(&mut self.signals, signal_id, *color, renderer);
        }
        let diff: DiffSummary = self.entities.apply(&step.cars, renderer);
        debug!(
            index,
            timestep = step.index,
            created = diff.created,
            updated = diff.updated,
            removed = diff.removed,
            skipped = diff.skipped,
            "Applied timestep"
        );

        self.cursor.current_index += 1;
        self.cursor.last_tick = Some(now);
        if self.cursor.current_index >= self.store.len() {
            self.finish();
        }
        Some(index)
    }

    /// Advance every vehicle toward its target by `dt` seconds of render time.
    pub fn animate<R: Renderer + ?Sized>(&mut self, dt: f32, renderer: &mut R) -> usize {
        self.entities.animate(dt, &self.motion, renderer)
    }

    /// Remove every vehicle from the renderer.
    pub fn clear_entities<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.entities.clear(renderer);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn store(&self) -> &TimestepStore {
        &self.store
    }

    pub fn signal(&self, id: &str) -> Option<SignalColor> {
        self.signals.get(id).copied()
    }

    pub fn entity(&self, id: &str) -> Option<&ActiveEntity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> &ActiveEntities {
        &self.entities
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            current_index: self.cursor.current_index,
            total_timesteps: self.store.len(),
            tick_interval_seconds: self.cursor.tick_interval.as_secs_f64(),
            active_entities: self.entities.len(),
            signals: self.signals.clone(),
            load_id: self.store.load_id(),
            loaded_at: self.store.loaded_at(),
        }
    }

    fn rewind(&mut self) {
        self.cursor.current_index = 0;
        self.cursor.last_tick = None;
        self.cursor.is_playing = true;
        self.state = PlaybackState::Running;
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Finished;
        self.cursor.is_playing = false;
        info!(timesteps = self.store.len(), "Traffic playback completed");
    }
}

/// Interval for `seconds`, never below `floor`.
///
/// Values too large for a `Duration` saturate to `Duration::MAX`.
pub fn clamp_interval(seconds: f64, floor: Duration) -> Duration {
    if !seconds.is_finite() || seconds <= floor.as_secs_f64() {
        return floor;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

fn set_signal<R: SignalRenderer + ?Sized>(
    signals: &mut BTreeMap<String, SignalColor>,
    id: &str,
    color: SignalColor,
    renderer: &mut R,
) {
    if signals.insert(id.to_string(), color) != Some(color) {
        renderer.set_signal_color(id, color);
    }
}
