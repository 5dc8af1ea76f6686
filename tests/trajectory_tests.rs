use prometheus_motion::common::pose;
use prometheus_motion::common::types::{Qutr, QUTR_IDENTITY};
use prometheus_motion::control::trajectory::{JointParabolicBlend, Segment};
use prometheus_motion::{
    generate_linear_jointspace, generate_parabolic_blend_jointspace,
    generate_parabolic_blend_taskspace, EvalStatus, JointLimits, Region, State, TaskLimits,
    TrajectoryError, TrajectoryGenerator, WaypointList,
};

fn joint_waypoints<'r>(region: &'r Region, points: &[&[f64]]) -> WaypointList<'r> {
    let mut list = WaypointList::new(region);
    for q in points {
        list.add(&State::joint(region, q)).unwrap();
    }
    list
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn single_joint_blend_matches_known_values() {
    let region = Region::new(4096);
    let waypoints = joint_waypoints(&region, &[&[1.0], &[3.0], &[1.0]]);
    let limits = JointLimits::symmetric(&[2.0], &[4.0]).alloc_in(&region);
    let list = generate_parabolic_blend_jointspace(&region, &waypoints, &limits).unwrap();

    let mut state = State::alloc(&region, 1, 0);

    assert_eq!(list.eval(&mut state, 0.0), EvalStatus::InRange);
    assert!(close(state.q[0], 1.0, 1e-2));
    assert!(close(state.dq[0], 0.0, 1e-2));
    assert!(close(state.ddq[0], 4.0, 1e-2));

    assert_eq!(list.eval(&mut state, 0.1), EvalStatus::InRange);
    assert!(close(state.q[0], 1.02, 1e-2));
    assert!(close(state.dq[0], 0.4, 1e-2));
    assert!(close(state.ddq[0], 4.0, 1e-2));

    assert_eq!(list.eval(&mut state, 1.9), EvalStatus::InRange);
    assert!(close(state.q[0], 1.7, 1e-2));
    assert!(close(state.dq[0], -2.0, 1e-2));
    assert!(close(state.ddq[0], 0.0, 1e-2));

    assert_eq!(list.eval(&mut state, list.duration()), EvalStatus::Terminal);
    assert!(close(state.q[0], 1.0, 1e-3));
}

#[test]
fn generated_segments_are_contiguous() {
    let region = Region::new(4096);
    let waypoints = joint_waypoints(
        &region,
        &[&[0.0, 0.0], &[1.0, 2.0], &[1.5, 2.0], &[-1.0, 0.5]],
    );
    let limits = JointLimits::symmetric(&[1.0, 1.5], &[3.0, 2.0]).alloc_in(&region);
    let list = generate_parabolic_blend_jointspace(&region, &waypoints, &limits).unwrap();

    let segments = list.segments();
    assert_eq!(segments[0].span().t_start, 0.0);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].span().t_end(), pair[1].span().t_start);
    }
    assert_eq!(segments[segments.len() - 1].span().t_end(), list.duration());
    assert!(matches!(segments[0], Segment::Blend { .. }));
    list.check_c0(0.001, 2.5 * 0.001 * 1.05, 1e-9).unwrap();
}

#[test]
fn linear_generation_holds_velocity_per_leg() {
    let region = Region::new(4096);
    let waypoints = joint_waypoints(&region, &[&[0.0], &[2.0], &[1.0]]);
    let limits = JointLimits::symmetric(&[1.0], &[1.0]).alloc_in(&region);
    let list = generate_linear_jointspace(&region, &waypoints, &limits).unwrap();
    assert_eq!(list.duration(), 3.0);

    let velocities: Vec<f64> = list.samples(0.5).unwrap().map(|s| s.velocity[0]).collect();
    assert_eq!(velocities, [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0]);
    list.check_c0(0.01, 0.0101, 1e-12).unwrap();
}

#[test]
fn task_space_blend_reaches_every_pose() {
    let region = Region::new(4096);
    let quarter = std::f64::consts::FRAC_PI_4;
    let via: Qutr = [0.0, 0.0, quarter.sin(), quarter.cos(), 0.5, 0.0, 0.0];
    let goal: Qutr = [quarter.sin(), 0.0, 0.0, quarter.cos(), 0.5, 0.5, 0.25];

    let mut waypoints = WaypointList::new(&region);
    for x in [&QUTR_IDENTITY, &via, &goal] {
        waypoints.add(&State::pose(&region, x)).unwrap();
    }
    let limits = TaskLimits::uniform(0.5, 1.0).alloc_in(&region);
    let list = generate_parabolic_blend_taskspace(&region, &waypoints, &limits).unwrap();

    let mut state = State::alloc(&region, 0, 0);
    assert_eq!(list.eval(&mut state, 0.0), EvalStatus::InRange);
    assert!(pose::distance(&state.x[..], &QUTR_IDENTITY) < 1e-9);
    assert!(state.dx.iter().all(|v| v.abs() < 1e-12));

    assert_eq!(list.eval(&mut state, list.duration()), EvalStatus::Terminal);
    assert!(pose::distance(&state.x[..], &goal) < 1e-9);

    list.check(0.001, |sample| {
        let norm = sample.position.rows(0, 4).norm();
        assert!(close(norm, 1.0, 1e-9));
        for axis in 0..6 {
            assert!(sample.velocity[axis].abs() <= 0.5 + 1e-9);
            assert!(sample.acceleration[axis].abs() <= 1.0 + 1e-9);
        }
        Ok(())
    })
    .unwrap();
    list.check_c0(0.01, 0.02, 1e-9).unwrap();
}

#[test]
fn single_waypoint_is_a_hold() {
    let region = Region::new(1024);
    let waypoints = joint_waypoints(&region, &[&[0.5, -0.5]]);
    let limits = JointLimits::symmetric(&[1.0, 1.0], &[1.0, 1.0]).alloc_in(&region);
    let list = generate_parabolic_blend_jointspace(&region, &waypoints, &limits).unwrap();
    assert_eq!(list.duration(), 0.0);

    let mut state = State::alloc(&region, 2, 0);
    for t in [0.0, 1.0, 100.0] {
        assert_eq!(list.eval(&mut state, t), EvalStatus::Terminal);
        assert_eq!(&state.q[..], &[0.5, -0.5]);
        assert_eq!(&state.dq[..], &[0.0, 0.0]);
    }
    assert_eq!(list.samples(0.1).unwrap().count(), 1);
}

#[test]
fn zero_joint_waypoints_are_a_hold() {
    let region = Region::new(1024);
    let none: &[f64] = &[];
    let waypoints = joint_waypoints(&region, &[none, none]);
    let limits = JointLimits::symmetric(&[], &[]).alloc_in(&region);

    for list in [
        generate_linear_jointspace(&region, &waypoints, &limits).unwrap(),
        generate_parabolic_blend_jointspace(&region, &waypoints, &limits).unwrap(),
    ] {
        assert_eq!(list.duration(), 0.0);
        assert_eq!(list.segments().len(), 1);
        let mut state = State::alloc(&region, 0, 0);
        assert_eq!(list.eval(&mut state, 0.5), EvalStatus::Terminal);
    }
}

#[test]
fn coincident_waypoints_are_skipped() {
    let region = Region::new(4096);
    let limits = JointLimits::symmetric(&[2.0], &[4.0]).alloc_in(&region);
    let doubled = joint_waypoints(&region, &[&[1.0], &[1.0], &[3.0], &[3.0], &[1.0]]);
    let plain = joint_waypoints(&region, &[&[1.0], &[3.0], &[1.0]]);

    let a = generate_parabolic_blend_jointspace(&region, &doubled, &limits).unwrap();
    let b = generate_parabolic_blend_jointspace(&region, &plain, &limits).unwrap();
    assert_eq!(a.segments(), b.segments());
}

#[test]
fn bad_inputs_are_reported() {
    let region = Region::new(4096);
    let limits = JointLimits::symmetric(&[1.0], &[1.0]).alloc_in(&region);

    let empty = WaypointList::new(&region);
    assert_eq!(
        generate_parabolic_blend_jointspace(&region, &empty, &limits).unwrap_err(),
        TrajectoryError::EmptyWaypoints
    );

    let two_joints = joint_waypoints(&region, &[&[0.0, 0.0], &[1.0, 1.0]]);
    assert!(matches!(
        generate_parabolic_blend_jointspace(&region, &two_joints, &limits),
        Err(TrajectoryError::DimensionMismatch { expected: 2, found: 1, .. })
    ));

    let one_joint = joint_waypoints(&region, &[&[0.0], &[1.0]]);
    let stuck = JointLimits::symmetric(&[1.0], &[0.0]).alloc_in(&region);
    assert!(matches!(
        generate_parabolic_blend_jointspace(&region, &one_joint, &stuck),
        Err(TrajectoryError::Infeasible { axis: 0, .. })
    ));

    let nan = joint_waypoints(&region, &[&[0.0], &[f64::NAN]]);
    assert!(matches!(
        generate_linear_jointspace(&region, &nan, &limits),
        Err(TrajectoryError::NonFinite { .. })
    ));

    let joints_as_poses = generate_parabolic_blend_taskspace(
        &region,
        &one_joint,
        &TaskLimits::uniform(1.0, 1.0).alloc_in(&region),
    );
    assert!(matches!(
        joints_as_poses,
        Err(TrajectoryError::DimensionMismatch { expected: 7, .. })
    ));
}

#[test]
fn eval_into_a_mismatched_state_is_invalid() {
    let region = Region::new(2048);
    let waypoints = joint_waypoints(&region, &[&[0.0, 0.0], &[1.0, 1.0]]);
    let limits = JointLimits::symmetric(&[1.0, 1.0], &[1.0, 1.0]).alloc_in(&region);
    let list = JointParabolicBlend::default()
        .generate(&region, &waypoints, &limits)
        .unwrap();

    let mut wrong = State::alloc(&region, 3, 0);
    assert_eq!(list.eval(&mut wrong, 0.5), EvalStatus::Invalid);
    let mut right = State::alloc(&region, 2, 0);
    assert_eq!(list.eval(&mut right, f64::NAN), EvalStatus::Invalid);
    assert_eq!(list.eval(&mut right, -1.0), EvalStatus::InRange);
}
