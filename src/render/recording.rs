use super::{EntityRenderer, RenderEvent, RenderHandle, SignalRenderer};
use crate::interpolation::Pose;
use crate::timestep::SignalColor;
use std::collections::{BTreeMap, HashMap};

/// In-memory renderer for headless runs and tests.
///
/// Keeps the live vehicle set, current poses and signal colors, plus a full
/// log of the calls it received.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next_handle: u64,
    pub live: HashMap<RenderHandle, (String, String, Pose)>,
    pub signals: BTreeMap<String, SignalColor>,
    pub log: Vec<RenderEvent>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pose of the live vehicle with simulation id `id`.
    pub fn pose_of(&self, id: &str) -> Option<Pose> {
        self.live
            .values()
            .find(|(car_id, _, _)| car_id == id)
            .map(|(_, _, pose)| *pose)
    }

    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.values().map(|(id, _, _)| id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn created(&self) -> usize {
        self.count(|e| matches!(e, RenderEvent::EntityCreated { .. }))
    }

    pub fn destroyed(&self) -> usize {
        self.count(|e| matches!(e, RenderEvent::EntityDestroyed { .. }))
    }

    fn count(&self, pred: impl Fn(&RenderEvent) -> bool) -> usize {
        self.log.iter().filter(|e| pred(e)).count()
    }
}

impl EntityRenderer for RecordingRenderer {
    fn create_entity(&mut self, id: &str, skin: &str, pose: Pose) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.live
            .insert(handle, (id.to_string(), skin.to_string(), pose));
        self.log.push(RenderEvent::EntityCreated {
            handle,
            id: id.to_string(),
            skin: skin.to_string(),
            pose,
        });
        handle
    }

    fn update_entity_pose(&mut self, handle: RenderHandle, pose: Pose) {
        if let Some(entry) = self.live.get_mut(&handle) {
            entry.2 = pose;
        }
        self.log.push(RenderEvent::EntityMoved { handle, pose });
    }

    fn destroy_entity(&mut self, handle: RenderHandle) {
        self.live.remove(&handle);
        self.log.push(RenderEvent::EntityDestroyed { handle });
    }
}

impl SignalRenderer for RecordingRenderer {
    fn set_signal_color(&mut self, signal_id: &str, color: SignalColor) {
        self.signals.insert(signal_id.to_string(), color);
        self.log.push(RenderEvent::SignalChanged {
            signal_id: signal_id.to_string(),
            color,
        });
    }
}
