//! Evaluation and checking of generated trajectories.

use nalgebra::DVector;

use super::segment::Segment;
use super::{invalid_parameter, Space};
use crate::common::pose;
use crate::error::TrajectoryError;
use crate::state::State;

/// Outcome of [`SegmentList::eval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    /// The time lies inside the trajectory.
    InRange,
    /// The time is at or past the end; the final state was written.
    Terminal,
    /// Nothing was written: the time is NaN or the output is mis-sized.
    Invalid,
}

/// One owned sample of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    /// Joint positions, or the `[qx, qy, qz, qw, x, y, z]` pose.
    pub position: DVector<f64>,
    /// Joint velocities, or the `[v; w]` twist.
    pub velocity: DVector<f64>,
    pub acceleration: DVector<f64>,
}

/// Contiguous segments with a cached total duration.
#[derive(Debug, Clone, Copy)]
pub struct SegmentList<'r> {
    space: Space,
    segments: &'r [Segment<'r>],
    duration: f64,
}

impl<'r> SegmentList<'r> {
    pub(crate) fn new(space: Space, segments: &'r [Segment<'r>]) -> Self {
        let duration = segments.last().map_or(0.0, |s| s.span().t_end());
        SegmentList {
            space,
            segments,
            duration,
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// Joint count, zero for workspace trajectories.
    pub fn n_q(&self) -> usize {
        match self.space {
            Space::Joint { n_q } => n_q,
            Space::Task => 0,
        }
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn segments(&self) -> &'r [Segment<'r>] {
        self.segments
    }

    /// Evaluate into `state` at time `t`.
    ///
    /// Joint lists write `q` and, when they are non-empty, `dq` and `ddq`;
    /// workspace lists write `x`, `dx` and `ddx` the same way. Times before
    /// zero are clamped to zero, so a zero-length hold is always terminal.
    pub fn eval(&self, state: &mut State<'_>, t: f64) -> EvalStatus {
        let (position, velocity, acceleration) = match self.space {
            Space::Joint { .. } => (&mut *state.q, &mut *state.dq, &mut *state.ddq),
            Space::Task => (&mut *state.x, &mut *state.dx, &mut *state.ddx),
        };
        let velocity = (!velocity.is_empty()).then_some(velocity);
        let acceleration = (!acceleration.is_empty()).then_some(acceleration);
        self.eval_into(t, position, velocity, acceleration)
    }

    /// Evaluate into raw slices sized by [`Space::position_dim`] and
    /// [`Space::velocity_dim`].
    pub fn eval_into(
        &self,
        t: f64,
        position: &mut [f64],
        velocity: Option<&mut [f64]>,
        acceleration: Option<&mut [f64]>,
    ) -> EvalStatus {
        let rate_dim = self.space.velocity_dim();
        let sized = position.len() == self.space.position_dim()
            && velocity.as_ref().map_or(true, |v| v.len() == rate_dim)
            && acceleration.as_ref().map_or(true, |a| a.len() == rate_dim);
        let Some(last) = self.segments.last() else {
            return EvalStatus::Invalid;
        };
        if t.is_nan() || !sized {
            return EvalStatus::Invalid;
        }

        let t = t.max(0.0);
        if t >= self.duration {
            let span = last.span();
            last.eval(self.space, span.duration, position, velocity, acceleration);
            return EvalStatus::Terminal;
        }
        let index = self
            .segments
            .partition_point(|s| s.span().t_start <= t)
            .saturating_sub(1);
        let segment = &self.segments[index];
        let span = segment.span();
        let s = (t - span.t_start).clamp(0.0, span.duration);
        segment.eval(self.space, s, position, velocity, acceleration);
        EvalStatus::InRange
    }

    /// Samples every `dt` seconds from zero, ending with one sample exactly at
    /// the duration.
    pub fn samples(&self, dt: f64) -> Result<Samples<'_, 'r>, TrajectoryError> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(invalid_parameter("dt", dt));
        }
        Ok(Samples {
            list: self,
            dt,
            step: 0,
            finished: false,
        })
    }

    /// Feed every sample to `f`, stopping at the first error.
    pub fn check<F>(&self, dt: f64, mut f: F) -> Result<(), TrajectoryError>
    where
        F: FnMut(&Sample) -> Result<(), TrajectoryError>,
    {
        self.samples(dt)?.try_for_each(|sample| f(&sample))
    }

    /// Verify position continuity.
    ///
    /// Consecutive samples `dt` apart may be at most `tolerance` apart, and
    /// the two sides of every segment boundary at most `epsilon` apart.
    /// Joint positions are compared by L1 distance, poses by translation L1
    /// distance plus rotation angle.
    pub fn check_c0(&self, dt: f64, tolerance: f64, epsilon: f64) -> Result<(), TrajectoryError> {
        if !(tolerance >= 0.0) {
            return Err(invalid_parameter("tolerance", tolerance));
        }
        if !(epsilon >= 0.0) {
            return Err(invalid_parameter("epsilon", epsilon));
        }

        let mut previous: Option<Sample> = None;
        for sample in self.samples(dt)? {
            if let Some(previous) = &previous {
                let gap = self.distance(previous.position.as_slice(), sample.position.as_slice());
                if !(gap <= tolerance) {
                    return Err(TrajectoryError::Discontinuity {
                        time: sample.time,
                        gap,
                        tolerance,
                    });
                }
            }
            previous = Some(sample);
        }

        let dim = self.space.position_dim();
        let mut left = vec![0.0; dim];
        let mut right = vec![0.0; dim];
        for pair in self.segments.windows(2) {
            pair[0].eval(self.space, pair[0].span().duration, &mut left, None, None);
            pair[1].eval(self.space, 0.0, &mut right, None, None);
            let gap = self.distance(&left, &right);
            if !(gap <= epsilon) {
                return Err(TrajectoryError::Discontinuity {
                    time: pair[1].span().t_start,
                    gap,
                    tolerance: epsilon,
                });
            }
        }
        Ok(())
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self.space {
            Space::Joint { .. } => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Space::Task => pose::distance(a, b),
        }
    }

    fn sample_at(&self, time: f64) -> Sample {
        let rate_dim = self.space.velocity_dim();
        let mut sample = Sample {
            time,
            position: DVector::zeros(self.space.position_dim()),
            velocity: DVector::zeros(rate_dim),
            acceleration: DVector::zeros(rate_dim),
        };
        self.eval_into(
            time,
            sample.position.as_mut_slice(),
            Some(sample.velocity.as_mut_slice()),
            Some(sample.acceleration.as_mut_slice()),
        );
        sample
    }
}

/// Iterator returned by [`SegmentList::samples`].
#[derive(Debug, Clone)]
pub struct Samples<'l, 'r> {
    list: &'l SegmentList<'r>,
    dt: f64,
    step: usize,
    finished: bool,
}

impl Iterator for Samples<'_, '_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.finished {
            return None;
        }
        let t = self.step as f64 * self.dt;
        if t < self.list.duration {
            self.step += 1;
            Some(self.list.sample_at(t))
        } else {
            self.finished = true;
            Some(self.list.sample_at(self.list.duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::trajectory::segment::Span;
    use crate::memory::Region;

    // q = [1, 3, 1] with |dq| <= 2 and |ddq| <= 4.
    fn triangle<'r>(region: &'r Region) -> SegmentList<'r> {
        let a: &[f64] = region.alloc_slice_copy(&[1.0]);
        let b: &[f64] = region.alloc_slice_copy(&[3.0]);
        let c: &[f64] = region.alloc_slice_copy(&[1.0]);
        let zero: &[f64] = region.alloc_slice_copy(&[0.0]);
        let up: &[f64] = region.alloc_slice_copy(&[2.0]);
        let down: &[f64] = region.alloc_slice_copy(&[-2.0]);
        let span = |t_start, duration| Span { t_start, duration };
        let segments = region.alloc_slice_copy(&[
            Segment::Blend { span: span(0.0, 0.5), anchor: a, v_in: zero, v_out: up },
            Segment::Linear { span: span(0.5, 0.25), anchor: a, offset: 0.25, velocity: up },
            Segment::Blend { span: span(0.75, 1.0), anchor: b, v_in: up, v_out: down },
            Segment::Linear { span: span(1.75, 0.25), anchor: b, offset: 0.5, velocity: down },
            Segment::Blend { span: span(2.0, 0.5), anchor: c, v_in: down, v_out: zero },
        ]);
        SegmentList::new(Space::Joint { n_q: 1 }, segments)
    }

    #[test]
    fn eval_locates_segments_and_clamps() {
        let region = Region::new(1024);
        let list = triangle(&region);
        assert_eq!(list.duration(), 2.5);
        assert_eq!(list.n_q(), 1);

        let mut state = State::alloc(&region, 1, 0);
        assert_eq!(list.eval(&mut state, 0.1), EvalStatus::InRange);
        assert!((state.q[0] - 1.02).abs() < 1e-9);
        assert!((state.dq[0] - 0.4).abs() < 1e-9);

        assert_eq!(list.eval(&mut state, -3.0), EvalStatus::InRange);
        assert_eq!(state.q[0], 1.0);

        assert_eq!(list.eval(&mut state, 2.5), EvalStatus::Terminal);
        assert!((state.q[0] - 1.0).abs() < 1e-12);
        assert_eq!(state.dq[0], 0.0);
        assert_eq!(list.eval(&mut state, 40.0), EvalStatus::Terminal);
    }

    #[test]
    fn hold_is_terminal_at_every_time() {
        let region = Region::new(512);
        let anchor: &[f64] = region.alloc_slice_copy(&[0.25]);
        let still: &[f64] = region.alloc_slice_copy(&[0.0]);
        let segments = region.alloc_slice_copy(&[Segment::Linear {
            span: Span { t_start: 0.0, duration: 0.0 },
            anchor,
            offset: 0.0,
            velocity: still,
        }]);
        let hold = SegmentList::new(Space::Joint { n_q: 1 }, segments);

        let mut state = State::alloc(&region, 1, 0);
        for t in [-1.0, 0.0, 3.0] {
            assert_eq!(hold.eval(&mut state, t), EvalStatus::Terminal);
            assert_eq!(state.q[0], 0.25);
        }
    }

    #[test]
    fn eval_rejects_bad_requests() {
        let region = Region::new(1024);
        let list = triangle(&region);
        let mut state = State::alloc(&region, 2, 0);
        assert_eq!(list.eval(&mut state, 0.5), EvalStatus::Invalid);

        let mut only_q = State::joint(&region, &[7.0]);
        assert_eq!(list.eval(&mut only_q, f64::NAN), EvalStatus::Invalid);
        assert_eq!(only_q.q[0], 7.0);
        assert_eq!(list.eval(&mut only_q, 1.0), EvalStatus::InRange);

        let mut q = [0.0];
        let mut short = [0.0; 0];
        assert_eq!(list.eval_into(1.0, &mut q, Some(&mut short), None), EvalStatus::Invalid);
    }

    #[test]
    fn samples_end_exactly_at_the_duration() {
        let region = Region::new(1024);
        let list = triangle(&region);
        let times: Vec<f64> = list.samples(0.7).unwrap().map(|s| s.time).collect();
        assert_eq!(times.len(), 5);
        assert_eq!(times[4], 2.5);
        assert!((times[3] - 2.1).abs() < 1e-12);

        let again = list.samples(0.7).unwrap().count();
        assert_eq!(again, 5);
        assert!(list.samples(0.0).is_err());
        assert!(list.samples(f64::NAN).is_err());
    }

    #[test]
    fn check_stops_at_the_first_error() {
        let region = Region::new(1024);
        let list = triangle(&region);
        let mut seen = 0;
        let result = list.check(0.01, |sample| {
            seen += 1;
            if sample.position[0] > 2.4 {
                Err(TrajectoryError::Infeasible { axis: 0, reason: "too high" })
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert!(seen < 251);

        let mut peak = f64::MIN;
        list.check(0.01, |s| {
            peak = peak.max(s.velocity[0].abs());
            Ok(())
        })
        .unwrap();
        assert!(peak <= 2.0 + 1e-12);
    }

    #[test]
    fn continuity_check_finds_gaps() {
        let region = Region::new(1024);
        let list = triangle(&region);
        list.check_c0(0.01, 0.0201, 1e-9).unwrap();
        assert!(matches!(
            list.check_c0(0.01, 0.01, 1e-9),
            Err(TrajectoryError::Discontinuity { .. })
        ));

        let anchor: &[f64] = region.alloc_slice_copy(&[0.0]);
        let jump: &[f64] = region.alloc_slice_copy(&[5.0]);
        let still: &[f64] = region.alloc_slice_copy(&[0.0]);
        let segments = region.alloc_slice_copy(&[
            Segment::Linear {
                span: Span { t_start: 0.0, duration: 1.0 },
                anchor,
                offset: 0.0,
                velocity: still,
            },
            Segment::Linear {
                span: Span { t_start: 1.0, duration: 1.0 },
                anchor: jump,
                offset: 0.0,
                velocity: still,
            },
        ]);
        let broken = SegmentList::new(Space::Joint { n_q: 1 }, segments);
        assert_eq!(
            broken.check_c0(0.01, 10.0, 1e-6),
            Err(TrajectoryError::Discontinuity {
                time: 1.0,
                gap: 5.0,
                tolerance: 1e-6
            })
        );
    }
}
