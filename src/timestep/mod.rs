use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

mod validation;

pub use validation::validate;

/// Color shown by a signal head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalColor {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "Y")]
    Yellow,
    #[serde(rename = "G")]
    Green,
    #[serde(rename = "AR")]
    AllRed,
}

/// Movement state the simulator reports for a car.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarState {
    Approach,
    Stop,
    Go,
    Done,
    Moving,
}

/// Turn a car has chosen at its target intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "S")]
    Straight,
    #[serde(rename = "none")]
    None,
}

/// One car inside a timestep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    pub id: String,

    #[serde(default)]
    pub origin: String,

    /// Origin before any re-routing, when the simulator tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_origin: Option<String>,

    pub position: Vec2,
    pub direction: Vec2,
    pub state: CarState,
    pub turn: Turn,
    pub turned: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_intersection: Option<String>,

    pub wait_time: u32,
}

/// One simulated instant: every signal color and every live car.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestepRecord {
    #[serde(rename = "timestep")]
    pub index: u32,

    pub traffic_lights: BTreeMap<String, SignalColor>,

    pub cars: Vec<CarRecord>,
}

impl TimestepRecord {
    /// Ids of the cars present in this timestep.
    pub fn car_ids(&self) -> HashSet<&str> {
        self.cars.iter().map(|car| car.id.as_str()).collect()
    }
}

/// Why a payload could not become a timestep sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not well-formed JSON (or truncated)
    Malformed(String),
    /// Well-formed JSON that does not fit the timestep shape
    Schema(String),
    DuplicateTimestep(u32),
    DuplicateCar { timestep: u32, car_id: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(msg) => write!(f, "malformed JSON: {}", msg),
            ParseError::Schema(msg) => write!(f, "invalid timestep data: {}", msg),
            ParseError::DuplicateTimestep(index) => {
                write!(f, "timestep {} appears more than once", index)
            }
            ParseError::DuplicateCar { timestep, car_id } => {
                write!(f, "car '{}' appears twice in timestep {}", car_id, timestep)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match e.classify() {
            Category::Data => ParseError::Schema(e.to_string()),
            Category::Syntax | Category::Eof | Category::Io => ParseError::Malformed(e.to_string()),
        }
    }
}

/// Parse a payload (JSON array of timesteps) into an ordered sequence.
///
/// Pure: nothing is replaced or mutated on failure.
pub fn parse(json: &str) -> Result<Vec<TimestepRecord>, ParseError> {
    let timesteps: Vec<TimestepRecord> = serde_json::from_str(json)?;
    validate(&timesteps)?;
    Ok(timesteps)
}
