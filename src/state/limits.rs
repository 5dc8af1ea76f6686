//! Velocity and acceleration bounds for trajectory generation.

use crate::common::types::{Twist, TWIST_LEN};
use crate::error::TrajectoryError;
use crate::memory::Region;
use crate::state::State;

/// Limits on robot state.
///
/// The `dq`/`ddq` groups bound joint-space generators, `dx`/`ddx` bound
/// workspace generators. Minimum rates are expected to be negative and
/// maximum rates positive.
#[derive(Debug, Clone, Copy)]
pub struct Limits<'a> {
    /// The minimum limit values.
    pub min: &'a State<'a>,
    /// The maximum limit values.
    pub max: &'a State<'a>,
}

impl<'a> Limits<'a> {
    /// Pair up minimum and maximum states.
    pub fn new(min: &'a State<'a>, max: &'a State<'a>) -> Self {
        Limits { min, max }
    }
}

/// Owned joint-space bounds that can be placed into a region on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    /// Lowest joint velocities.
    pub dq_min: Vec<f64>,
    /// Highest joint velocities.
    pub dq_max: Vec<f64>,
    /// Lowest joint accelerations.
    pub ddq_min: Vec<f64>,
    /// Highest joint accelerations.
    pub ddq_max: Vec<f64>,
}

impl JointLimits {
    /// Bounds of `±dq` and `±ddq` per joint.
    pub fn symmetric(dq: &[f64], ddq: &[f64]) -> Self {
        JointLimits {
            dq_min: dq.iter().map(|v| -v).collect(),
            dq_max: dq.to_vec(),
            ddq_min: ddq.iter().map(|v| -v).collect(),
            ddq_max: ddq.to_vec(),
        }
    }

    /// Number of joints covered by the velocity bounds.
    pub fn n_q(&self) -> usize {
        self.dq_max.len()
    }

    /// Materialize as [`Limits`] backed by `region`.
    pub fn alloc_in<'r>(&self, region: &'r Region) -> Limits<'r> {
        let n_q = self.n_q();
        let min = region.alloc_value(State {
            n_q,
            dq: region.alloc_slice_copy(&self.dq_min),
            ddq: region.alloc_slice_copy(&self.ddq_min),
            ..State::default()
        });
        let max = region.alloc_value(State {
            n_q,
            dq: region.alloc_slice_copy(&self.dq_max),
            ddq: region.alloc_slice_copy(&self.ddq_max),
            ..State::default()
        });
        Limits::new(min, max)
    }
}

/// Owned workspace bounds, twist ordered `[v; w]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLimits {
    /// Lowest twist components.
    pub dx_min: Twist,
    /// Highest twist components.
    pub dx_max: Twist,
    /// Lowest acceleration components.
    pub ddx_min: Twist,
    /// Highest acceleration components.
    pub ddx_max: Twist,
}

impl TaskLimits {
    /// The same `±dx` and `±ddx` bound on every workspace axis.
    pub fn uniform(dx: f64, ddx: f64) -> Self {
        TaskLimits {
            dx_min: [-dx; TWIST_LEN],
            dx_max: [dx; TWIST_LEN],
            ddx_min: [-ddx; TWIST_LEN],
            ddx_max: [ddx; TWIST_LEN],
        }
    }

    /// Materialize as [`Limits`] backed by `region`.
    pub fn alloc_in<'r>(&self, region: &'r Region) -> Limits<'r> {
        let min = region.alloc_value(State {
            dx: region.alloc_slice_copy(&self.dx_min),
            ddx: region.alloc_slice_copy(&self.ddx_min),
            ..State::default()
        });
        let max = region.alloc_value(State {
            dx: region.alloc_slice_copy(&self.dx_max),
            ddx: region.alloc_slice_copy(&self.ddx_max),
            ..State::default()
        });
        Limits::new(min, max)
    }
}

/// Per-axis bounds pulled out of [`Limits`] and checked for feasibility.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AxisBounds<'a> {
    v_min: &'a [f64],
    v_max: &'a [f64],
    a_min: &'a [f64],
    a_max: &'a [f64],
}

impl<'a> AxisBounds<'a> {
    /// Joint velocity (and, if `accel`, acceleration) bounds for `n_q` joints.
    pub(crate) fn joint(
        limits: &Limits<'a>,
        n_q: usize,
        accel: bool,
    ) -> Result<Self, TrajectoryError> {
        let (min, max): (&'a State<'a>, &'a State<'a>) = (limits.min, limits.max);
        let bounds = AxisBounds {
            v_min: &min.dq[..],
            v_max: &max.dq[..],
            a_min: if accel { &min.ddq[..] } else { &[] },
            a_max: if accel { &max.ddq[..] } else { &[] },
        };
        bounds.validate(n_q, accel, "joint velocity limits", "joint acceleration limits")
    }

    /// Workspace twist (and, if `accel`, acceleration) bounds.
    pub(crate) fn task(limits: &Limits<'a>, accel: bool) -> Result<Self, TrajectoryError> {
        let (min, max): (&'a State<'a>, &'a State<'a>) = (limits.min, limits.max);
        let bounds = AxisBounds {
            v_min: &min.dx[..],
            v_max: &max.dx[..],
            a_min: if accel { &min.ddx[..] } else { &[] },
            a_max: if accel { &max.ddx[..] } else { &[] },
        };
        bounds.validate(TWIST_LEN, accel, "workspace velocity limits", "workspace acceleration limits")
    }

    fn validate(
        self,
        dim: usize,
        accel: bool,
        v_what: &'static str,
        a_what: &'static str,
    ) -> Result<Self, TrajectoryError> {
        check_pair(self.v_min, self.v_max, dim, v_what, "velocity")?;
        if accel {
            check_pair(self.a_min, self.a_max, dim, a_what, "acceleration")?;
        }
        Ok(self)
    }

    /// Largest speed allowed on `axis` when moving in the sign of `direction`.
    pub(crate) fn speed(&self, axis: usize, direction: f64) -> f64 {
        if direction >= 0.0 {
            self.v_max[axis]
        } else {
            -self.v_min[axis]
        }
    }

    /// Largest acceleration allowed on `axis` in the sign of `direction`.
    pub(crate) fn accel(&self, axis: usize, direction: f64) -> f64 {
        if direction >= 0.0 {
            self.a_max[axis]
        } else {
            -self.a_min[axis]
        }
    }
}

fn check_pair(
    min: &[f64],
    max: &[f64],
    dim: usize,
    what: &'static str,
    quantity: &'static str,
) -> Result<(), TrajectoryError> {
    for found in [min.len(), max.len()] {
        if found != dim {
            return Err(TrajectoryError::DimensionMismatch {
                what,
                expected: dim,
                found,
            });
        }
    }
    for (axis, (lo, hi)) in min.iter().zip(max).enumerate() {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(TrajectoryError::NonFinite { what });
        }
        if *hi <= 0.0 {
            return Err(TrajectoryError::Infeasible {
                axis,
                reason: if quantity == "velocity" {
                    "maximum velocity must be positive"
                } else {
                    "maximum acceleration must be positive"
                },
            });
        }
        if *lo >= 0.0 {
            return Err(TrajectoryError::Infeasible {
                axis,
                reason: if quantity == "velocity" {
                    "minimum velocity must be negative"
                } else {
                    "minimum acceleration must be negative"
                },
            });
        }
    }
    Ok(())
}
