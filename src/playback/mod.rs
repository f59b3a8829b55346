// Timestep store, playback state machine and the live vehicle set.

mod engine;
mod entities;
mod skins;
mod store;

pub use engine::{
    clamp_interval, EngineConfig, PlaybackCursor, PlaybackEngine, PlaybackState,
};
pub use entities::{ActiveEntities, ActiveEntity, DiffSummary};
pub use skins::{ConfigurationError, SkinSelector};
pub use store::TimestepStore;

use crate::timestep::SignalColor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Read-only view of playback published to the control API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub current_index: usize,
    pub total_timesteps: usize,
    pub tick_interval_seconds: f64,
    pub active_entities: usize,
    pub signals: BTreeMap<String, SignalColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            current_index: 0,
            total_timesteps: 0,
            tick_interval_seconds: 0.0,
            active_entities: 0,
            signals: BTreeMap::new(),
            load_id: None,
            loaded_at: None,
        }
    }
}
