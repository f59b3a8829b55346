use super::{ParseError, TimestepRecord};
use std::collections::HashSet;

/// Checks the uniqueness rules serde cannot express.
///
/// - `timestep` indexes are unique within the sequence
/// - car ids are unique within a timestep
pub fn validate(timesteps: &[TimestepRecord]) -> Result<(), ParseError> {
    let mut indexes = HashSet::with_capacity(timesteps.len());

    for step in timesteps {
        if !indexes.insert(step.index) {
            return Err(ParseError::DuplicateTimestep(step.index));
        }

        let mut ids = HashSet::with_capacity(step.cars.len());
        for car in &step.cars {
            if !ids.insert(car.id.as_str()) {
                return Err(ParseError::DuplicateCar {
                    timestep: step.index,
                    car_id: car.id.clone(),
                });
            }
        }
    }

    Ok(())
}
