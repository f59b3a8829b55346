pub mod env;
pub use env::{apply_env_overrides, CONFIG_PATH_ENV};

use crate::interpolation::MotionConfig;
use crate::playback::{EngineConfig, SkinSelector};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

// Re-export section types owned by their subsystems
pub use crate::api::ApiConfig;
pub use crate::ingest::IngestConfig;

/// Complete server configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub interpolation: InterpolationConfig,
    #[serde(default)]
    pub skins: SkinsConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Playback pacing
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Seconds between applied timesteps
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: f64,
    /// Floor for runtime interval changes
    #[serde(default = "default_min_tick_interval")]
    pub min_tick_interval_seconds: f64,
    /// Consumer loop frequency (drain, tick, interpolate)
    #[serde(default = "default_render_hz")]
    pub render_hz: u32,
}

fn default_tick_interval() -> f64 {
    0.5
}

fn default_min_tick_interval() -> f64 {
    0.1
}

fn default_render_hz() -> u32 {
    60
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval(),
            min_tick_interval_seconds: default_min_tick_interval(),
            render_hz: default_render_hz(),
        }
    }
}

/// Vehicle smoothing between timesteps
#[derive(Debug, Clone, Deserialize)]
pub struct InterpolationConfig {
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Gaps longer than this jump instead of sliding
    #[serde(default = "default_snap_distance")]
    pub snap_distance: f32,
    #[serde(default = "default_angular_speed")]
    pub angular_speed_degrees: f32,
}

fn default_speed() -> f32 {
    5.0
}

fn default_snap_distance() -> f32 {
    50.0
}

fn default_angular_speed() -> f32 {
    360.0
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            snap_distance: default_snap_distance(),
            angular_speed_degrees: default_angular_speed(),
        }
    }
}

/// Vehicle appearance pool
#[derive(Debug, Clone, Deserialize)]
pub struct SkinsConfig {
    #[serde(default = "default_skin_names")]
    pub names: Vec<String>,
    /// Relative weights, one per name. Omit for uniform selection.
    #[serde(default)]
    pub weights: Option<Vec<f32>>,
}

fn default_skin_names() -> Vec<String> {
    vec!["car".to_string()]
}

impl Default for SkinsConfig {
    fn default() -> Self {
        Self {
            names: default_skin_names(),
            weights: None,
        }
    }
}

/// Signal heads known before any data arrives
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsConfig {
    /// Set to red at startup
    #[serde(default = "default_initial_signals")]
    pub initial: Vec<String>,
}

fn default_initial_signals() -> Vec<String> {
    ["S", "E", "W"].iter().map(|s| s.to_string()).collect()
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_signals(),
        }
    }
}

impl ReplayConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let min_tick_interval = seconds_or(self.playback.min_tick_interval_seconds, 0.1);
        let tick_interval =
            crate::playback::clamp_interval(self.playback.tick_interval_seconds, min_tick_interval);

        EngineConfig {
            tick_interval,
            min_tick_interval,
            motion: self.motion_config(),
            rng_seed: None,
        }
    }

    pub fn motion_config(&self) -> MotionConfig {
        MotionConfig {
            speed: self.interpolation.speed,
            snap_distance: self.interpolation.snap_distance,
            angular_speed: self.interpolation.angular_speed_degrees.to_radians(),
        }
    }

    pub fn skin_selector(&self) -> SkinSelector {
        SkinSelector::new(self.skins.names.clone(), self.skins.weights.clone())
    }
}

fn seconds_or(seconds: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ReplayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: ReplayConfig =
        toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path))?;
    Ok(config)
}

/// File named by `TRAFFIC_REPLAY_CONFIG` (or defaults), then env overrides.
pub fn load() -> Result<ReplayConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => load_config(&path)?,
        Err(_) => ReplayConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
