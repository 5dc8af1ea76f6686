//! Trajectory generation module
//!
//! Generators turn a [`WaypointList`] and a pair of [`Limits`] into a
//! [`SegmentList`] allocated from the caller's region. Joint-space lists
//! work on `State::q`; workspace lists work on the `State::x` pose and
//! `State::dx` twist.
mod legs;
pub mod linear;
pub mod parabolic_blend;
pub mod segment;
pub mod segment_list;
pub mod waypoints;

pub use self::linear::JointLinear;
pub use self::parabolic_blend::{BlendConfig, JointParabolicBlend, TaskParabolicBlend};
pub use self::segment::{Segment, Span};
pub use self::segment_list::{EvalStatus, Sample, Samples, SegmentList};
pub use self::waypoints::{Waypoint, WaypointList};

use std::collections::HashMap;
use std::fmt::Debug;

use crate::common::types::{QUTR_LEN, TWIST_LEN};
use crate::error::TrajectoryError;
use crate::memory::Region;
use crate::state::Limits;

/// Coordinates a trajectory is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    /// Joint positions, `n_q` values per point.
    Joint {
        /// Number of joints.
        n_q: usize,
    },
    /// Workspace pose `[qx, qy, qz, qw, x, y, z]` with twist rates.
    Task,
}

impl Space {
    /// Values per position sample.
    pub fn position_dim(&self) -> usize {
        match self {
            Space::Joint { n_q } => *n_q,
            Space::Task => QUTR_LEN,
        }
    }

    /// Values per velocity or acceleration sample.
    pub fn velocity_dim(&self) -> usize {
        match self {
            Space::Joint { n_q } => *n_q,
            Space::Task => TWIST_LEN,
        }
    }
}

/// Trait for trajectory generators
pub trait TrajectoryGenerator: Debug + Send + Sync {
    /// Build a segment list through every waypoint, allocated in `region`.
    fn generate<'r>(
        &self,
        region: &'r Region,
        waypoints: &WaypointList<'_>,
        limits: &Limits<'_>,
    ) -> Result<SegmentList<'r>, TrajectoryError>;

    /// Get the name of this generator
    fn name(&self) -> &str;

    /// Configure the generator with parameters
    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError>;
}

/// Parabolic blend through joint-space waypoints with default settings.
pub fn generate_parabolic_blend_jointspace<'r>(
    region: &'r Region,
    waypoints: &WaypointList<'_>,
    limits: &Limits<'_>,
) -> Result<SegmentList<'r>, TrajectoryError> {
    JointParabolicBlend::default().generate(region, waypoints, limits)
}

/// Parabolic blend through workspace poses with default settings.
pub fn generate_parabolic_blend_taskspace<'r>(
    region: &'r Region,
    waypoints: &WaypointList<'_>,
    limits: &Limits<'_>,
) -> Result<SegmentList<'r>, TrajectoryError> {
    TaskParabolicBlend::default().generate(region, waypoints, limits)
}

/// Straight constant-velocity legs between joint-space waypoints.
pub fn generate_linear_jointspace<'r>(
    region: &'r Region,
    waypoints: &WaypointList<'_>,
    limits: &Limits<'_>,
) -> Result<SegmentList<'r>, TrajectoryError> {
    JointLinear::default().generate(region, waypoints, limits)
}

pub(crate) fn invalid_parameter(name: &str, value: f64) -> TrajectoryError {
    TrajectoryError::InvalidParameter {
        name: name.to_string(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_follow_the_space() {
        let joint = Space::Joint { n_q: 4 };
        assert_eq!(joint.position_dim(), 4);
        assert_eq!(joint.velocity_dim(), 4);
        assert_eq!(Space::Task.position_dim(), 7);
        assert_eq!(Space::Task.velocity_dim(), 6);
    }

    #[test]
    fn generators_report_their_names() {
        let generators: Vec<Box<dyn TrajectoryGenerator>> = vec![
            Box::new(JointParabolicBlend::default()),
            Box::new(TaskParabolicBlend::default()),
            Box::new(JointLinear::default()),
        ];
        let names: Vec<_> = generators.iter().map(|g| g.name().to_string()).collect();
        assert_eq!(names, ["parabolic_blend_joint", "parabolic_blend_task", "linear_joint"]);
    }
}
