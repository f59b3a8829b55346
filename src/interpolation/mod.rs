// Per-vehicle smoothing between sparse simulation targets and the dense
// render loop. Position approaches its target exponentially, heading turns
// toward its target at a fixed angular speed.

use crate::geometry::{angle_delta, wrap_angle, Vec2};
use serde::{Deserialize, Serialize};

/// Distances below this count as "arrived".
const SETTLE_EPSILON: f32 = 1e-4;

/// Rendered placement of a vehicle on the ground plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    /// Radians about the vertical axis, `+y` is 0.
    pub heading: f32,
}

impl Pose {
    pub fn new(position: Vec2, heading: f32) -> Self {
        Self {
            position,
            heading: wrap_angle(heading),
        }
    }
}

/// Tuning for [`EntityMotion::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionConfig {
    /// Exponential approach rate (1/s).
    pub speed: f32,
    /// Straight-line gap above which the vehicle jumps instead of gliding.
    pub snap_distance: f32,
    /// Heading change limit (rad/s).
    pub angular_speed: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            snap_distance: 50.0,
            angular_speed: std::f32::consts::TAU,
        }
    }
}

/// What a single [`EntityMotion::step`] did to the rendered pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Already at target; nothing to redraw.
    Settled,
    Moved,
    /// Position jumped straight to target.
    Snapped,
}

/// Current rendered pose of one vehicle and the pose it is heading for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityMotion {
    current: Pose,
    target: Pose,
}

impl EntityMotion {
    /// Start at rest: current and target coincide.
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            current: pose,
            target: pose,
        }
    }

    pub fn current(&self) -> Pose {
        self.current
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    /// New target from a simulation frame. `heading: None` keeps the old facing.
    pub fn retarget(&mut self, position: Vec2, heading: Option<f32>) {
        self.target.position = position;
        if let Some(heading) = heading {
            self.target.heading = wrap_angle(heading);
        }
    }

    /// Remaining straight-line gap to the target position.
    pub fn distance_to_target(&self) -> f32 {
        self.current.position.distance(self.target.position)
    }

    /// Advance the rendered pose by `dt` seconds.
    pub fn step(&mut self, dt: f32, config: &MotionConfig) -> StepOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut outcome = StepOutcome::Settled;

        let gap = self.target.position - self.current.position;
        let distance = gap.length();
        if distance > config.snap_distance {
            self.current.position = self.target.position;
            outcome = StepOutcome::Snapped;
        } else if distance > SETTLE_EPSILON {
            let t = (config.speed * dt).clamp(0.0, 1.0);
            self.current.position = self.current.position + gap * t;
            outcome = StepOutcome::Moved;
        } else if distance > 0.0 {
            self.current.position = self.target.position;
        }

        let turn = angle_delta(self.current.heading, self.target.heading);
        if turn != 0.0 {
            let max_turn = config.angular_speed.max(0.0) * dt;
            if turn.abs() <= max_turn {
                self.current.heading = self.target.heading;
            } else {
                self.current.heading = wrap_angle(self.current.heading + max_turn.copysign(turn));
            }
            if max_turn > 0.0 && outcome == StepOutcome::Settled {
                outcome = StepOutcome::Moved;
            }
        }

        outcome
    }
}
