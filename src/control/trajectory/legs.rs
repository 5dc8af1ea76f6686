//! Leg geometry shared by the generators.
//!
//! A leg is the motion between two consecutive retained waypoints. Its
//! displacement is a plain difference in joint space and
//! `[dp; rotation vector]` in the workspace.

use tracing::warn;

use super::waypoints::WaypointList;
use super::Space;
use crate::common::pose;
use crate::error::TrajectoryError;
use crate::state::limits::AxisBounds;

/// Positions of the waypoints, minus any point coincident with the one
/// retained before it.
pub(crate) fn retained_points<'w>(
    waypoints: &'w WaypointList<'_>,
    space: Space,
    tolerance: f64,
) -> Result<Vec<&'w [f64]>, TrajectoryError> {
    if waypoints.is_empty() {
        return Err(TrajectoryError::EmptyWaypoints);
    }
    let dim = space.position_dim();
    let mut delta = vec![0.0; space.velocity_dim()];
    let mut points: Vec<&'w [f64]> = Vec::with_capacity(waypoints.len());

    for (index, state) in waypoints.iter().enumerate() {
        let (what, position): (_, &'w [f64]) = match space {
            Space::Joint { .. } => ("waypoint joint positions", &state.q[..]),
            Space::Task => ("waypoint pose", &state.x[..]),
        };
        if position.len() != dim {
            return Err(TrajectoryError::DimensionMismatch {
                what,
                expected: dim,
                found: position.len(),
            });
        }
        if position.iter().any(|v| !v.is_finite()) {
            return Err(TrajectoryError::NonFinite { what });
        }
        if let Some(previous) = points.last() {
            displacement(space, previous, position, &mut delta);
            if delta.iter().all(|d| d.abs() <= tolerance) {
                warn!(index, "skipping waypoint coincident with its predecessor");
                continue;
            }
        }
        points.push(position);
    }
    Ok(points)
}

/// Displacement from `from` to `to` in velocity coordinates.
pub(crate) fn displacement(space: Space, from: &[f64], to: &[f64], out: &mut [f64]) {
    match space {
        Space::Joint { .. } => {
            for ((d, a), b) in out.iter_mut().zip(from).zip(to) {
                *d = b - a;
            }
        }
        Space::Task => pose::displacement(from, to, out),
    }
}

/// Fill `deltas` (one row of `dim` values per leg) from consecutive points.
pub(crate) fn leg_deltas(space: Space, points: &[&[f64]], deltas: &mut [f64]) {
    let dim = space.velocity_dim();
    for (pair, row) in points.windows(2).zip(deltas.chunks_exact_mut(dim)) {
        displacement(space, pair[0], pair[1], row);
    }
}

/// Shortest time for each leg that keeps every axis within its speed bound.
pub(crate) fn min_durations(deltas: &[f64], dim: usize, bounds: &AxisBounds<'_>, out: &mut [f64]) {
    for (row, duration) in deltas.chunks_exact(dim).zip(out.iter_mut()) {
        *duration = row
            .iter()
            .enumerate()
            .map(|(axis, d)| d.abs() / bounds.speed(axis, *d))
            .fold(0.0, f64::max);
    }
}

/// Divide each leg's displacement by its duration.
pub(crate) fn leg_velocities(deltas: &[f64], dim: usize, durations: &[f64], out: &mut [f64]) {
    for ((row, v), duration) in deltas
        .chunks_exact(dim)
        .zip(out.chunks_exact_mut(dim))
        .zip(durations)
    {
        for (v, d) in v.iter_mut().zip(row) {
            *v = d / duration;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Region;
    use crate::state::{JointLimits, State};

    #[test]
    fn coincident_points_are_dropped() {
        let region = Region::new(1024);
        let mut list = WaypointList::new(&region);
        for q in [[0.0, 0.0], [0.0, 1e-12], [1.0, 0.0], [1.0, 0.0], [2.0, 0.0]] {
            list.add(&State::joint(&region, &q)).unwrap();
        }
        let points = retained_points(&list, Space::Joint { n_q: 2 }, 1e-9).unwrap();
        let firsts: Vec<f64> = points.iter().map(|p| p[0]).collect();
        assert_eq!(firsts, [0.0, 1.0, 2.0]);
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let region = Region::new(512);
        let mut list = WaypointList::new(&region);
        list.add(&State::joint(&region, &[f64::INFINITY])).unwrap();
        assert_eq!(
            retained_points(&list, Space::Joint { n_q: 1 }, 0.0).unwrap_err(),
            TrajectoryError::NonFinite { what: "waypoint joint positions" }
        );
        assert!(matches!(
            retained_points(&list, Space::Task, 0.0),
            Err(TrajectoryError::DimensionMismatch { expected: 7, found: 0, .. })
        ));
    }

    #[test]
    fn slowest_axis_sets_the_leg_time() {
        let region = Region::new(512);
        let limits = JointLimits {
            dq_min: vec![-1.0, -0.5],
            dq_max: vec![2.0, 1.0],
            ddq_min: vec![],
            ddq_max: vec![],
        }
        .alloc_in(&region);
        let bounds = AxisBounds::joint(&limits, 2, false).unwrap();
        let deltas = [2.0, 0.5, -2.0, 0.0];
        let mut durations = [0.0; 2];
        min_durations(&deltas, 2, &bounds, &mut durations);
        assert_eq!(durations, [1.0, 2.0]);

        let mut velocities = [0.0; 4];
        leg_velocities(&deltas, 2, &durations, &mut velocities);
        assert_eq!(velocities, [2.0, 0.5, -1.0, 0.0]);
    }
}
