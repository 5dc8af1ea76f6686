//! Blend and linear trajectory segments.
//!
//! Every segment is anchored to a waypoint `p` and stores the velocity rows
//! it interpolates between. Position at local time `s` is
//! `p + v_in·a(s) + v_out·b(s)`; the weights `a` and `b` are closed-form, so
//! evaluation never re-derives anything from the waypoints.

use nalgebra::{UnitQuaternion, Vector3};

use super::Space;
use crate::common::pose;

/// Time interval `[t_start, t_start + duration)` covered by a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub t_start: f64,
    pub duration: f64,
}

impl Span {
    /// End of the interval.
    pub fn t_end(&self) -> f64 {
        self.t_start + self.duration
    }
}

/// One piece of a [`SegmentList`](super::SegmentList).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'r> {
    /// Constant acceleration from `v_in` to `v_out` around waypoint `anchor`.
    ///
    /// The blend is centered on the waypoint: it starts `duration / 2`
    /// before the point would be reached at `v_in` and ends `duration / 2`
    /// after leaving it at `v_out`.
    Blend {
        span: Span,
        anchor: &'r [f64],
        v_in: &'r [f64],
        v_out: &'r [f64],
    },
    /// Constant velocity, at local time `s` located `offset + s` after
    /// `anchor` was passed.
    Linear {
        span: Span,
        anchor: &'r [f64],
        offset: f64,
        velocity: &'r [f64],
    },
}

/// Weights of the incoming and outgoing velocity and their derivatives.
#[derive(Debug, Clone, Copy)]
struct Weights {
    a: f64,
    da: f64,
    dda: f64,
    b: f64,
    db: f64,
    ddb: f64,
}

impl<'r> Segment<'r> {
    pub fn span(&self) -> Span {
        match self {
            Segment::Blend { span, .. } | Segment::Linear { span, .. } => *span,
        }
    }

    /// The waypoint position this segment is expressed relative to.
    pub fn anchor(&self) -> &'r [f64] {
        match self {
            Segment::Blend { anchor, .. } | Segment::Linear { anchor, .. } => anchor,
        }
    }

    pub fn is_blend(&self) -> bool {
        matches!(self, Segment::Blend { .. })
    }

    fn weights(&self, s: f64) -> Weights {
        match *self {
            Segment::Blend { span, .. } => {
                let tb = span.duration;
                Weights {
                    a: -tb / 2.0 + s - s * s / (2.0 * tb),
                    da: 1.0 - s / tb,
                    dda: -1.0 / tb,
                    b: s * s / (2.0 * tb),
                    db: s / tb,
                    ddb: 1.0 / tb,
                }
            }
            Segment::Linear { offset, .. } => Weights {
                a: 0.0,
                da: 0.0,
                dda: 0.0,
                b: offset + s,
                db: 1.0,
                ddb: 0.0,
            },
        }
    }

    fn rates(&self) -> (&'r [f64], &'r [f64]) {
        match *self {
            Segment::Blend { v_in, v_out, .. } => (v_in, v_out),
            Segment::Linear { velocity, .. } => (velocity, velocity),
        }
    }

    /// Evaluate at local time `s`. Output slices must be sized for `space`.
    pub(crate) fn eval(
        &self,
        space: Space,
        s: f64,
        position: &mut [f64],
        velocity: Option<&mut [f64]>,
        acceleration: Option<&mut [f64]>,
    ) {
        match space {
            Space::Joint { .. } => self.eval_joint(s, position, velocity, acceleration),
            Space::Task => self.eval_task(s, position, velocity, acceleration),
        }
    }

    fn eval_joint(
        &self,
        s: f64,
        q: &mut [f64],
        dq: Option<&mut [f64]>,
        ddq: Option<&mut [f64]>,
    ) {
        let w = self.weights(s);
        let (v_in, v_out) = self.rates();
        let anchor = self.anchor();
        for (j, q) in q.iter_mut().enumerate() {
            *q = anchor[j] + v_in[j] * w.a + v_out[j] * w.b;
        }
        if let Some(dq) = dq {
            for (j, dq) in dq.iter_mut().enumerate() {
                *dq = v_in[j] * w.da + v_out[j] * w.db;
            }
        }
        if let Some(ddq) = ddq {
            for (j, ddq) in ddq.iter_mut().enumerate() {
                *ddq = v_in[j] * w.dda + v_out[j] * w.ddb;
            }
        }
    }

    // Orientation is exp(w_out·b) * exp(w_in·a) * R_anchor; the world-frame
    // angular rates follow by differentiating that product.
    fn eval_task(
        &self,
        s: f64,
        x: &mut [f64],
        dx: Option<&mut [f64]>,
        ddx: Option<&mut [f64]>,
    ) {
        let w = self.weights(s);
        let (v_in, v_out) = self.rates();
        let (rotation, translation) = pose::from_qutr(self.anchor());
        let lin_in = Vector3::from_column_slice(&v_in[..3]);
        let lin_out = Vector3::from_column_slice(&v_out[..3]);
        let ang_in = Vector3::from_column_slice(&v_in[3..6]);
        let ang_out = Vector3::from_column_slice(&v_out[3..6]);

        let r_in = UnitQuaternion::from_scaled_axis(ang_in * w.a);
        let r_out = UnitQuaternion::from_scaled_axis(ang_out * w.b);
        let translation = translation + lin_in * w.a + lin_out * w.b;
        pose::write_qutr(&(r_out * r_in * rotation), &translation, x);

        let carried = r_out * (ang_in * w.da);
        if let Some(dx) = dx {
            let linear = lin_in * w.da + lin_out * w.db;
            let angular = ang_out * w.db + carried;
            dx[..3].copy_from_slice(linear.as_slice());
            dx[3..6].copy_from_slice(angular.as_slice());
        }
        if let Some(ddx) = ddx {
            let linear = lin_in * w.dda + lin_out * w.ddb;
            let angular =
                ang_out * w.ddb + r_out * (ang_in * w.dda) + (ang_out * w.db).cross(&carried);
            ddx[..3].copy_from_slice(linear.as_slice());
            ddx[3..6].copy_from_slice(angular.as_slice());
        }
    }
}
