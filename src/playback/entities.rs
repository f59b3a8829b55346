use crate::interpolation::{EntityMotion, MotionConfig, Pose, StepOutcome};
use crate::playback::skins::SkinSelector;
use crate::render::{EntityRenderer, RenderHandle};
use crate::timestep::CarRecord;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A vehicle currently on screen.
#[derive(Debug, Clone)]
pub struct ActiveEntity {
    pub handle: RenderHandle,
    pub skin: String,
    pub motion: EntityMotion,
}

/// Counts from one application of a timestep's car list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Cars that could not be created (see `ConfigurationError`).
    pub skipped: usize,
}

/// Live vehicles keyed by simulation car id.
pub struct ActiveEntities {
    entities: HashMap<String, ActiveEntity>,
    skins: SkinSelector,
    rng: StdRng,
}

impl ActiveEntities {
    pub fn new(skins: SkinSelector, rng: StdRng) -> Self {
        Self {
            entities: HashMap::new(),
            skins,
            rng,
        }
    }

    /// Bring the live set in line with `cars`.
    ///
    /// Ids only in the old set are destroyed, ids in both get new targets,
    /// ids only in `cars` are created at rest on their reported position.
    pub fn apply<R: EntityRenderer + ?Sized>(
        &mut self,
        cars: &[CarRecord],
        renderer: &mut R,
    ) -> DiffSummary {
        let mut summary = DiffSummary::default();

        let incoming: HashSet<&str> = cars.iter().map(|car| car.id.as_str()).collect();
        let departed: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();

        for id in departed {
            if let Some(entity) = self.entities.remove(&id) {
                renderer.destroy_entity(entity.handle);
                summary.removed += 1;
            }
        }

        for car in cars {
            let heading = car.direction.heading();

            if let Some(entity) = self.entities.get_mut(&car.id) {
                entity.motion.retarget(car.position, heading);
                summary.updated += 1;
                continue;
            }

            let skin = match self.skins.pick(&mut self.rng) {
                Ok(skin) => skin.to_string(),
                Err(e) => {
                    warn!(car_id = %car.id, error = %e, "Skipping vehicle creation");
                    summary.skipped += 1;
                    continue;
                }
            };

            let pose = Pose::new(car.position, heading.unwrap_or(0.0));
            let handle = renderer.create_entity(&car.id, &skin, pose);
            self.entities.insert(
                car.id.clone(),
                ActiveEntity {
                    handle,
                    skin,
                    motion: EntityMotion::at_rest(pose),
                },
            );
            summary.created += 1;
        }

        summary
    }

    /// Step every vehicle's motion and push changed poses to the renderer.
    pub fn animate<R: EntityRenderer + ?Sized>(
        &mut self,
        dt: f32,
        config: &MotionConfig,
        renderer: &mut R,
    ) -> usize {
        let mut redrawn = 0;
        for entity in self.entities.values_mut() {
            if entity.motion.step(dt, config) != StepOutcome::Settled {
                renderer.update_entity_pose(entity.handle, entity.motion.current());
                redrawn += 1;
            }
        }
        redrawn
    }

    /// Destroy every live vehicle.
    pub fn clear<R: EntityRenderer + ?Sized>(&mut self, renderer: &mut R) {
        for (_, entity) in self.entities.drain() {
            renderer.destroy_entity(entity.handle);
        }
    }

    pub fn get(&self, id: &str) -> Option<&ActiveEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.entities.keys().map(String::as_str).collect()
    }
}
