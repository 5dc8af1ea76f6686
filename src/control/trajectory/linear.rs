//! Linear joint-space generator.
//!
//! One constant-velocity segment per leg, as short as the velocity bounds
//! allow. Velocity jumps at every waypoint; only `dq` bounds are used.

use std::collections::HashMap;

use tracing::debug;

use super::segment::{Segment, Span};
use super::segment_list::SegmentList;
use super::waypoints::WaypointList;
use super::{invalid_parameter, legs, Space, TrajectoryGenerator};
use crate::error::TrajectoryError;
use crate::memory::Region;
use crate::state::limits::AxisBounds;
use crate::state::Limits;

/// Straight-line interpolation between joint-space waypoints.
#[derive(Debug, Clone)]
pub struct JointLinear {
    coincident_tolerance: f64,
}

impl Default for JointLinear {
    fn default() -> Self {
        JointLinear {
            coincident_tolerance: 1e-9,
        }
    }
}

impl TrajectoryGenerator for JointLinear {
    fn generate<'r>(
        &self,
        region: &'r Region,
        waypoints: &WaypointList<'_>,
        limits: &Limits<'_>,
    ) -> Result<SegmentList<'r>, TrajectoryError> {
        let n_q = waypoints.start_state()?.n_q;
        let space = Space::Joint { n_q };
        let bounds = AxisBounds::joint(limits, n_q, false)?;
        let points = legs::retained_points(waypoints, space, self.coincident_tolerance)?;

        let n_legs = points.len() - 1;
        let segments = if n_legs == 0 {
            region.alloc_slice_copy(&[Segment::Linear {
                span: Span { t_start: 0.0, duration: 0.0 },
                anchor: region.alloc_slice_copy(points[0]),
                offset: 0.0,
                velocity: region.alloc_slice_fill(n_q, 0.0),
            }])
        } else {
            let mut deltas = vec![0.0; n_legs * n_q];
            let mut durations = vec![0.0; n_legs];
            let mut velocities = vec![0.0; n_legs * n_q];
            legs::leg_deltas(space, &points, &mut deltas);
            legs::min_durations(&deltas, n_q, &bounds, &mut durations);
            legs::leg_velocities(&deltas, n_q, &durations, &mut velocities);

            let mut t = 0.0;
            let legs = points
                .iter()
                .zip(velocities.chunks_exact(n_q))
                .zip(&durations)
                .map(|((point, velocity), &duration)| {
                    let span = Span { t_start: t, duration };
                    t = span.t_end();
                    Segment::Linear {
                        span,
                        anchor: region.alloc_slice_copy(*point),
                        offset: 0.0,
                        velocity: region.alloc_slice_copy(velocity),
                    }
                });
            region.alloc_slice_from_iter(legs)
        };

        let list = SegmentList::new(space, segments);
        debug!(
            generator = self.name(),
            points = points.len(),
            segments = list.segments().len(),
            duration = list.duration(),
            "generated trajectory"
        );
        Ok(list)
    }

    fn name(&self) -> &str {
        "linear_joint"
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError> {
        if let Some(&tolerance) = params.get("coincident_tolerance") {
            if !(tolerance >= 0.0) || !tolerance.is_finite() {
                return Err(invalid_parameter("coincident_tolerance", tolerance));
            }
            self.coincident_tolerance = tolerance;
        }
        Ok(())
    }
}
