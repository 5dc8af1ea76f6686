//! Robot state snapshots.
//!
//! A [`State`] bundles joint-space and workspace quantities plus frame
//! transforms. Every array lives in a [`Region`]; groups a caller does not
//! use are simply empty.
pub mod limits;

pub use limits::{JointLimits, Limits, TaskLimits};

use std::fmt;
use std::io;

use crate::common::types::{Qutr, QUTR_IDENTITY, QUTR_LEN, TWIST_LEN};
use crate::error::TrajectoryError;
use crate::memory::Region;

/// Tolerance used by [`State::approx_eq`].
pub const STATE_EPSILON: f64 = 1e-3;

/// State description of a robot.
#[derive(Debug, Default)]
pub struct State<'r> {
    /// Number of configuration variables.
    pub n_q: usize,
    /// Number of frames.
    pub n_tf: usize,

    /// Joint positions.
    pub q: &'r mut [f64],
    /// Joint velocities.
    pub dq: &'r mut [f64],
    /// Joint accelerations.
    pub ddq: &'r mut [f64],
    /// Joint efforts.
    pub eff: &'r mut [f64],

    /// Workspace pose, `[qx, qy, qz, qw, x, y, z]`.
    pub x: &'r mut [f64],
    /// Workspace twist, `[v; w]`.
    pub dx: &'r mut [f64],
    /// Workspace acceleration, `[a; alpha]`.
    pub ddx: &'r mut [f64],

    /// Absolute frame transforms.
    pub tf_abs: &'r mut [Qutr],
    /// Relative frame transforms.
    pub tf_rel: &'r mut [Qutr],
}

impl<'r> State<'r> {
    /// Allocate a zeroed state with every group sized for `n_q` joints and
    /// `n_tf` frames. The pose and transforms start at identity.
    pub fn alloc(region: &'r Region, n_q: usize, n_tf: usize) -> Self {
        State {
            n_q,
            n_tf,
            q: region.alloc_slice_fill(n_q, 0.0),
            dq: region.alloc_slice_fill(n_q, 0.0),
            ddq: region.alloc_slice_fill(n_q, 0.0),
            eff: region.alloc_slice_fill(n_q, 0.0),
            x: region.alloc_slice_copy(&QUTR_IDENTITY),
            dx: region.alloc_slice_fill(TWIST_LEN, 0.0),
            ddx: region.alloc_slice_fill(TWIST_LEN, 0.0),
            tf_abs: region.alloc_slice_fill(n_tf, QUTR_IDENTITY),
            tf_rel: region.alloc_slice_fill(n_tf, QUTR_IDENTITY),
        }
    }

    /// A joint-space waypoint holding only positions.
    pub fn joint(region: &'r Region, q: &[f64]) -> Self {
        State {
            n_q: q.len(),
            q: region.alloc_slice_copy(q),
            ..State::default()
        }
    }

    /// A workspace waypoint holding only a pose.
    pub fn pose(region: &'r Region, x: &Qutr) -> Self {
        State {
            x: region.alloc_slice_copy(x),
            ..State::default()
        }
    }

    /// Deep copy into `region`. Empty groups stay empty.
    pub fn clone_in<'a>(&self, region: &'a Region) -> State<'a> {
        State {
            n_q: self.n_q,
            n_tf: self.n_tf,
            q: region.alloc_slice_copy(self.q),
            dq: region.alloc_slice_copy(self.dq),
            ddq: region.alloc_slice_copy(self.ddq),
            eff: region.alloc_slice_copy(self.eff),
            x: region.alloc_slice_copy(self.x),
            dx: region.alloc_slice_copy(self.dx),
            ddx: region.alloc_slice_copy(self.ddx),
            tf_abs: region.alloc_slice_copy(self.tf_abs),
            tf_rel: region.alloc_slice_copy(self.tf_rel),
        }
    }

    /// Elementwise comparison within [`STATE_EPSILON`]. Groups must have
    /// matching sizes to compare equal.
    pub fn approx_eq(&self, other: &State<'_>) -> bool {
        fn close(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= STATE_EPSILON)
        }
        self.n_q == other.n_q
            && self.n_tf == other.n_tf
            && close(self.q, other.q)
            && close(self.dq, other.dq)
            && close(self.ddq, other.ddq)
            && close(self.eff, other.eff)
            && close(self.x, other.x)
            && close(self.dx, other.dx)
            && close(self.ddx, other.ddx)
            && close(self.tf_abs.as_flattened(), other.tf_abs.as_flattened())
            && close(self.tf_rel.as_flattened(), other.tf_rel.as_flattened())
    }

    /// Set the workspace pose.
    pub fn set_pose(&mut self, pose: &Qutr) -> Result<(), TrajectoryError> {
        if self.x.len() != QUTR_LEN {
            return Err(TrajectoryError::DimensionMismatch {
                what: "state pose",
                expected: QUTR_LEN,
                found: self.x.len(),
            });
        }
        self.x.copy_from_slice(pose);
        Ok(())
    }

    /// Print the joint-space groups of the state.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl fmt::Display for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: [(&str, &[f64]); 4] = [
            ("q", self.q),
            ("dq", self.dq),
            ("ddq", self.ddq),
            ("eff", self.eff),
        ];
        for (name, values) in groups {
            if values.is_empty() {
                continue;
            }
            write!(f, "{name:<4}")?;
            for v in values {
                write!(f, " {v:.3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_sizes_every_group() {
        let region = Region::new(64);
        let state = State::alloc(&region, 3, 2);
        assert_eq!(state.q.len(), 3);
        assert_eq!(state.eff.len(), 3);
        assert_eq!(state.x, &QUTR_IDENTITY[..]);
        assert_eq!(state.dx.len(), TWIST_LEN);
        assert_eq!(state.tf_rel.len(), 2);
        assert_eq!(state.tf_abs[1], QUTR_IDENTITY);
    }

    #[test]
    fn clone_is_deep_and_equal() {
        let region = Region::new(256);
        let mut a = State::alloc(&region, 2, 1);
        a.q.copy_from_slice(&[1.0, -2.0]);
        a.tf_abs[0][4] = 3.0;

        let copy_region = Region::new(16);
        let b = a.clone_in(&copy_region);
        assert!(a.approx_eq(&b));

        a.q[1] = -2.0005;
        assert!(a.approx_eq(&b));
        a.q[1] = -2.01;
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn equality_needs_matching_groups() {
        let region = Region::new(64);
        let a = State::joint(&region, &[1.0, 2.0]);
        let b = State::alloc(&region, 2, 0);
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn set_pose_requires_a_pose_group() {
        let region = Region::new(64);
        let mut joint = State::joint(&region, &[0.0]);
        assert!(joint.set_pose(&QUTR_IDENTITY).is_err());

        let mut full = State::alloc(&region, 1, 0);
        let pose = [0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 3.0];
        full.set_pose(&pose).unwrap();
        assert_eq!(full.x, &pose[..]);
    }

    #[test]
    fn dump_prints_joint_groups() {
        let region = Region::new(64);
        let mut state = State::alloc(&region, 2, 0);
        state.q.copy_from_slice(&[1.0, 0.25]);
        let mut out = Vec::new();
        state.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("q    1.000 0.250\n"));
        assert_eq!(text.lines().count(), 4);

        let only_q = State::joint(&region, &[2.0]);
        assert_eq!(only_q.to_string(), "q    2.000\n");
    }
}
