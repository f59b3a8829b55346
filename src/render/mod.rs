// Narrow interface to whatever draws the intersection. The playback engine
// only ever talks to these traits; a renderer decides what a handle means.

use crate::interpolation::Pose;
use crate::timestep::SignalColor;
use serde::{Deserialize, Serialize};

mod broadcast;
mod recording;

pub use broadcast::{BroadcastRenderer, RenderEvent};
pub use recording::RecordingRenderer;

/// Opaque reference to a renderer-side vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(pub u64);

/// Vehicle lifecycle as seen by the renderer.
pub trait EntityRenderer {
    fn create_entity(&mut self, id: &str, skin: &str, pose: Pose) -> RenderHandle;
    fn update_entity_pose(&mut self, handle: RenderHandle, pose: Pose);
    fn destroy_entity(&mut self, handle: RenderHandle);
}

/// Signal heads.
pub trait SignalRenderer {
    fn set_signal_color(&mut self, signal_id: &str, color: SignalColor);
}

/// Everything the consumer loop needs from a renderer.
pub trait Renderer: EntityRenderer + SignalRenderer {}

impl<T: EntityRenderer + SignalRenderer> Renderer for T {}
