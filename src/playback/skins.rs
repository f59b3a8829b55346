use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fmt;
use tracing::warn;

/// A vehicle could not be created because of how the visualizer is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    NoSkins,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::NoSkins => write!(f, "no vehicle skins configured"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Picks which vehicle skin a newly created car gets.
///
/// Uniform unless usable weights were given. Weights are usable when there is
/// exactly one per skin and their non-negative parts sum to more than zero.
#[derive(Debug, Clone)]
pub struct SkinSelector {
    skins: Vec<String>,
    weighted: Option<WeightedIndex<f32>>,
}

impl SkinSelector {
    pub fn new(skins: Vec<String>, weights: Option<Vec<f32>>) -> Self {
        let weighted = weights.and_then(|weights| Self::weighting(&skins, &weights));
        Self { skins, weighted }
    }

    pub fn uniform(skins: Vec<String>) -> Self {
        Self::new(skins, None)
    }

    pub fn skins(&self) -> &[String] {
        &self.skins
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted.is_some()
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&str, ConfigurationError> {
        if self.skins.is_empty() {
            return Err(ConfigurationError::NoSkins);
        }
        let index = match &self.weighted {
            Some(dist) => dist.sample(rng),
            None => rng.gen_range(0..self.skins.len()),
        };
        Ok(&self.skins[index])
    }

    fn weighting(skins: &[String], weights: &[f32]) -> Option<WeightedIndex<f32>> {
        if weights.len() != skins.len() {
            if !skins.is_empty() {
                warn!(
                    skins = skins.len(),
                    weights = weights.len(),
                    "Skin weight count mismatch, using uniform selection"
                );
            }
            return None;
        }

        let clamped: Vec<f32> = weights
            .iter()
            .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 })
            .collect();
        if clamped.iter().sum::<f32>() <= 0.0 {
            warn!("Skin weights sum to zero, using uniform selection");
            return None;
        }

        WeightedIndex::new(clamped).ok()
    }
}
