//! Parabolic blend generators.
//!
//! Each leg cruises at constant velocity; around every waypoint a
//! constant-acceleration blend joins the incoming and outgoing velocities,
//! including the rest states before the first and after the last point.
//! All axes share each leg's duration, set by the slowest axis, so every
//! axis reaches a waypoint's neighbourhood together.

use std::collections::HashMap;
use std::mem;

use nalgebra::Vector3;
use tracing::debug;

use super::segment::{Segment, Span};
use super::segment_list::SegmentList;
use super::waypoints::WaypointList;
use super::{invalid_parameter, legs, Space, TrajectoryGenerator};
use crate::error::TrajectoryError;
use crate::memory::Region;
use crate::state::limits::AxisBounds;
use crate::state::Limits;

/// Cruise phases no longer than this are dropped.
const MIN_CRUISE: f64 = 1e-12;

/// Share of an angular acceleration bound a workspace blend may spend on
/// the coupling between its incoming and outgoing rotations.
const MAX_COUPLING_SHARE: f64 = 0.5;

/// Settings shared by both parabolic blend generators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendConfig {
    /// Refits allowed before giving up on fitting the blends.
    pub max_iterations: usize,
    /// Factor a leg that is too short for its blends is stretched by.
    pub duration_growth: f64,
    /// Consecutive points closer than this on every axis are merged.
    pub coincident_tolerance: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        BlendConfig {
            max_iterations: 10_000,
            duration_growth: 1.05,
            coincident_tolerance: 1e-9,
        }
    }
}

impl BlendConfig {
    /// Apply `max_iterations`, `duration_growth` and `coincident_tolerance`.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError> {
        if let Some(&iterations) = params.get("max_iterations") {
            if iterations < 1.0 || iterations.fract() != 0.0 {
                return Err(invalid_parameter("max_iterations", iterations));
            }
            self.max_iterations = iterations as usize;
        }

        if let Some(&growth) = params.get("duration_growth") {
            if !(growth > 1.0) || !growth.is_finite() {
                return Err(invalid_parameter("duration_growth", growth));
            }
            self.duration_growth = growth;
        }

        if let Some(&tolerance) = params.get("coincident_tolerance") {
            if !(tolerance >= 0.0) || !tolerance.is_finite() {
                return Err(invalid_parameter("coincident_tolerance", tolerance));
            }
            self.coincident_tolerance = tolerance;
        }

        Ok(())
    }
}

/// Parabolic blends through joint-space waypoints, bounded by `dq`/`ddq`.
#[derive(Debug, Clone, Default)]
pub struct JointParabolicBlend {
    config: BlendConfig,
}

impl JointParabolicBlend {
    pub fn new(config: BlendConfig) -> Self {
        JointParabolicBlend { config }
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }
}

impl TrajectoryGenerator for JointParabolicBlend {
    fn generate<'r>(
        &self,
        region: &'r Region,
        waypoints: &WaypointList<'_>,
        limits: &Limits<'_>,
    ) -> Result<SegmentList<'r>, TrajectoryError> {
        let n_q = waypoints.start_state()?.n_q;
        let bounds = AxisBounds::joint(limits, n_q, true)?;
        build(region, Space::Joint { n_q }, waypoints, &bounds, &self.config, self.name())
    }

    fn name(&self) -> &str {
        "parabolic_blend_joint"
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError> {
        self.config.configure(params)
    }
}

/// Parabolic blends through workspace poses, bounded by `dx`/`ddx`.
///
/// Orientation is blended by composing rotations, never by interpolating
/// quaternion components.
#[derive(Debug, Clone, Default)]
pub struct TaskParabolicBlend {
    config: BlendConfig,
}

impl TaskParabolicBlend {
    pub fn new(config: BlendConfig) -> Self {
        TaskParabolicBlend { config }
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }
}

impl TrajectoryGenerator for TaskParabolicBlend {
    fn generate<'r>(
        &self,
        region: &'r Region,
        waypoints: &WaypointList<'_>,
        limits: &Limits<'_>,
    ) -> Result<SegmentList<'r>, TrajectoryError> {
        let bounds = AxisBounds::task(limits, true)?;
        build(region, Space::Task, waypoints, &bounds, &self.config, self.name())
    }

    fn name(&self) -> &str {
        "parabolic_blend_task"
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError> {
        self.config.configure(params)
    }
}

fn build<'r>(
    region: &'r Region,
    space: Space,
    waypoints: &WaypointList<'_>,
    bounds: &AxisBounds<'_>,
    config: &BlendConfig,
    generator: &str,
) -> Result<SegmentList<'r>, TrajectoryError> {
    let points = legs::retained_points(waypoints, space, config.coincident_tolerance)?;
    let dim = space.velocity_dim();
    let zero: &'r [f64] = region.alloc_slice_fill(dim, 0.0);

    if points.len() == 1 {
        let hold = region.alloc_slice_copy(&[Segment::Linear {
            span: Span { t_start: 0.0, duration: 0.0 },
            anchor: region.alloc_slice_copy(points[0]),
            offset: 0.0,
            velocity: zero,
        }]);
        debug!(generator, "single waypoint, holding position");
        return Ok(SegmentList::new(space, hold));
    }

    let n_legs = points.len() - 1;
    let scratch = Region::new(
        (2 * n_legs * dim + 2 * n_legs + 1 + dim) * mem::size_of::<f64>() + n_legs + 1,
    );
    let deltas = scratch.alloc_slice_fill(n_legs * dim, 0.0);
    let durations = scratch.alloc_slice_fill(n_legs, 0.0);
    let velocities = scratch.alloc_slice_fill(n_legs * dim, 0.0);
    let blends = scratch.alloc_slice_fill(n_legs + 1, 0.0);
    let strained = scratch.alloc_slice_fill(n_legs + 1, false);
    let rest: &[f64] = scratch.alloc_slice_fill(dim, 0.0);

    legs::leg_deltas(space, &points, deltas);
    legs::min_durations(deltas, dim, bounds, durations);
    let fit = Fit {
        space,
        bounds,
        config,
        rest,
    };
    let iterations = fit.run(deltas, durations, velocities, blends, strained)?;

    let anchors: Vec<&'r [f64]> = points
        .iter()
        .map(|p| &*region.alloc_slice_copy(*p))
        .collect();
    let rates: Vec<&'r [f64]> = velocities
        .chunks_exact(dim)
        .map(|v| &*region.alloc_slice_copy(v))
        .collect();

    let mut segments = Vec::with_capacity(2 * n_legs + 1);
    let mut t = 0.0;
    for k in 0..=n_legs {
        if blends[k] > 0.0 {
            let span = Span { t_start: t, duration: blends[k] };
            segments.push(Segment::Blend {
                span,
                anchor: anchors[k],
                v_in: if k == 0 { zero } else { rates[k - 1] },
                v_out: if k == n_legs { zero } else { rates[k] },
            });
            t = span.t_end();
        }
        if k < n_legs {
            let cruise = durations[k] - (blends[k] + blends[k + 1]) / 2.0;
            if cruise > MIN_CRUISE {
                let span = Span { t_start: t, duration: cruise };
                segments.push(Segment::Linear {
                    span,
                    anchor: anchors[k],
                    offset: blends[k] / 2.0,
                    velocity: rates[k],
                });
                t = span.t_end();
            }
        }
    }

    let list = SegmentList::new(space, region.alloc_slice_copy(&segments));
    debug!(
        generator,
        points = points.len(),
        segments = segments.len(),
        iterations,
        duration = list.duration(),
        "generated trajectory"
    );
    Ok(list)
}

/// Leg timing state shared by every refit.
struct Fit<'a> {
    space: Space,
    bounds: &'a AxisBounds<'a>,
    config: &'a BlendConfig,
    rest: &'a [f64],
}

impl Fit<'_> {
    /// Stretch legs until each is long enough for half of each adjacent
    /// blend and every blend stays within its bounds.
    ///
    /// Leaves `velocities` and `blends` consistent with the final
    /// `durations` and returns the number of refits that were needed.
    fn run(
        &self,
        deltas: &[f64],
        durations: &mut [f64],
        velocities: &mut [f64],
        blends: &mut [f64],
        strained: &mut [bool],
    ) -> Result<usize, TrajectoryError> {
        let dim = self.space.velocity_dim();
        let n_legs = durations.len();
        for iteration in 0..self.config.max_iterations {
            legs::leg_velocities(deltas, dim, durations, velocities);
            for k in 0..=n_legs {
                let before = if k == 0 {
                    self.rest
                } else {
                    &velocities[(k - 1) * dim..k * dim]
                };
                let after = if k == n_legs {
                    self.rest
                } else {
                    &velocities[k * dim..(k + 1) * dim]
                };
                (blends[k], strained[k]) = self.blend(before, after);
            }

            let mut stretched = false;
            for (i, duration) in durations.iter_mut().enumerate() {
                let needed = (blends[i] + blends[i + 1]) / 2.0;
                if *duration < needed || strained[i] || strained[i + 1] {
                    *duration = (*duration * self.config.duration_growth).max(needed);
                    stretched = true;
                }
            }
            if !stretched {
                return Ok(iteration);
            }
        }
        Err(TrajectoryError::BlendDidNotConverge {
            iterations: self.config.max_iterations,
        })
    }

    /// Duration of the blend from `before` to `after`, and whether the
    /// adjacent legs must slow down for it to respect the bounds.
    fn blend(&self, before: &[f64], after: &[f64]) -> (f64, bool) {
        let coupling = self.coupling(before, after);
        let mut duration = 0.0f64;
        let mut strained = false;
        for (axis, (v0, v1)) in before.iter().zip(after).enumerate() {
            let change = v1 - v0;
            let mut budget = self.bounds.accel(axis, change);
            if self.is_rotational(axis) && coupling > 0.0 {
                let floor = self.bounds.accel(axis, 1.0).min(self.bounds.accel(axis, -1.0));
                if 0.75 * coupling > MAX_COUPLING_SHARE * floor {
                    strained = true;
                } else {
                    budget -= 0.75 * coupling;
                }
            }
            duration = duration.max(change.abs() / budget);
        }

        // The incoming rate is turned by up to `coupling·duration/2` before
        // it fades out.
        let drift = 0.5 * coupling * duration;
        if drift > 0.0 {
            for axis in (0..before.len()).filter(|&a| self.is_rotational(a)) {
                let w = before[axis];
                if w + drift > self.bounds.speed(axis, 1.0)
                    || w - drift < -self.bounds.speed(axis, -1.0)
                {
                    strained = true;
                }
            }
        }
        (duration, strained)
    }

    /// `|w_out × w_in|` for workspace blends, zero in joint space.
    ///
    /// Composing the two rotations adds at most `0.75·coupling` to each
    /// angular acceleration, whatever the blend length.
    fn coupling(&self, before: &[f64], after: &[f64]) -> f64 {
        match self.space {
            Space::Joint { .. } => 0.0,
            Space::Task => {
                let w_in = Vector3::from_column_slice(&before[3..6]);
                let w_out = Vector3::from_column_slice(&after[3..6]);
                w_out.cross(&w_in).norm()
            }
        }
    }

    fn is_rotational(&self, axis: usize) -> bool {
        matches!(self.space, Space::Task) && axis >= 3
    }
}
