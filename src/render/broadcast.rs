use super::{EntityRenderer, RenderHandle, SignalRenderer};
use crate::interpolation::Pose;
use crate::timestep::SignalColor;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Render command published to remote renderers (WebSocket clients).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    EntityCreated {
        handle: RenderHandle,
        id: String,
        skin: String,
        pose: Pose,
    },
    EntityMoved {
        handle: RenderHandle,
        pose: Pose,
    },
    EntityDestroyed {
        handle: RenderHandle,
    },
    SignalChanged {
        signal_id: String,
        color: SignalColor,
    },
}

/// Renderer that turns every call into a [`RenderEvent`] on a broadcast channel.
///
/// Having no subscribers is normal (no viewer attached yet); events are simply dropped.
pub struct BroadcastRenderer {
    tx: broadcast::Sender<RenderEvent>,
    next_handle: u64,
}

impl BroadcastRenderer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, next_handle: 1 }
    }

    /// Sender to hand to the API layer so it can subscribe viewers.
    pub fn sender(&self) -> broadcast::Sender<RenderEvent> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: RenderEvent) {
        // Err only means nobody is listening right now
        let _ = self.tx.send(event);
    }
}

impl EntityRenderer for BroadcastRenderer {
    fn create_entity(&mut self, id: &str, skin: &str, pose: Pose) -> RenderHandle {
        let handle = RenderHandle(self.next_handle);
        self.next_handle += 1;

        debug!(car_id = %id, skin = %skin, handle = handle.0, "Creating vehicle");
        self.publish(RenderEvent::EntityCreated {
            handle,
            id: id.to_string(),
            skin: skin.to_string(),
            pose,
        });
        handle
    }

    fn update_entity_pose(&mut self, handle: RenderHandle, pose: Pose) {
        self.publish(RenderEvent::EntityMoved { handle, pose });
    }

    fn destroy_entity(&mut self, handle: RenderHandle) {
        debug!(handle = handle.0, "Destroying vehicle");
        self.publish(RenderEvent::EntityDestroyed { handle });
    }
}

impl SignalRenderer for BroadcastRenderer {
    fn set_signal_color(&mut self, signal_id: &str, color: SignalColor) {
        debug!(signal_id = %signal_id, color = ?color, "Signal changed");
        self.publish(RenderEvent::SignalChanged {
            signal_id: signal_id.to_string(),
            color,
        });
    }
}
