use std::collections::HashMap;

use anyhow::{Context, Result};
use prometheus_motion::common::types::Qutr;
use prometheus_motion::control::MotionControlStack;
use prometheus_motion::memory::Pool;
use prometheus_motion::{
    generate_linear_jointspace, generate_parabolic_blend_taskspace, EvalStatus, JointLimits,
    PrometheusCore, Region, State, TaskLimits, WaypointList,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Initializing Prometheus motion core...");

    let mut core = PrometheusCore::new();

    // Configure the motion stack
    let mut stack = MotionControlStack::new();
    let mut params = HashMap::new();
    params.insert("sample_period".to_string(), 0.05);
    params.insert("tracking_gain".to_string(), 2.0);
    stack
        .configure(&params)
        .context("failed to configure motion stack")?;

    core.register(stack);
    core.init().context("failed to initialize core")?;

    // Joint-space parabolic blend through the registered stack
    let waypoints = vec![vec![0.0, 0.0], vec![1.0, -0.5], vec![1.5, 0.5], vec![0.0, 0.0]];
    let limits = JointLimits::symmetric(&[1.0, 0.8], &[2.0, 2.0]);
    let stack = core
        .motion_stack_mut()
        .context("motion stack is not registered")?;
    let motion = stack.plan(&waypoints, &limits)?;
    println!(
        "Planned {} samples over {:.3} s",
        motion.samples.len(),
        motion.duration
    );
    for sample in motion.samples.iter().step_by(10) {
        println!(
            "t={:.2} q={:.3?} dq={:.3?}",
            sample.time,
            sample.position.as_slice(),
            sample.velocity.as_slice()
        );
    }
    if let Some(reference) = motion.reference_at(0.5) {
        let command = stack.compute_command(reference, &[0.0, 0.0])?;
        println!("Tracking command at t=0.5 from rest: {:.3?}", command.as_slice());
    }

    // Linear joint-space motion straight from a region
    let region = Region::new(1024);
    let mut list = WaypointList::new(&region);
    for q in &waypoints {
        list.add(&State::joint(&region, q))?;
    }
    let joint_limits = limits.alloc_in(&region);
    let linear = generate_linear_jointspace(&region, &list, &joint_limits)?;
    let mut state = State::alloc(&region, 2, 0);
    let status = linear.eval(&mut state, linear.duration() / 2.0);
    println!("Linear motion half way ({status:?}):");
    print!("{state}");

    // Workspace blend between two poses
    let quarter = std::f64::consts::FRAC_PI_4;
    let goal: Qutr = [0.0, 0.0, quarter.sin(), quarter.cos(), 0.5, 0.2, 0.0];
    let mut poses = WaypointList::new(&region);
    poses.add(&State::pose(&region, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]))?;
    poses.add(&State::pose(&region, &goal))?;
    let task_limits = TaskLimits::uniform(0.5, 1.0).alloc_in(&region);
    let task = generate_parabolic_blend_taskspace(&region, &poses, &task_limits)?;
    let mut pose_state = State::alloc(&region, 0, 0);
    if task.eval(&mut pose_state, task.duration()) == EvalStatus::Terminal {
        println!("Workspace motion ends at {:.3?}", &pose_state.x[..]);
    }
    task.check_c0(0.01, 0.05, 1e-9)?;
    let label = region.alloc_fmt(format_args!(
        "{} segments, {:.3} s",
        task.segments().len(),
        task.duration()
    ));
    println!("Workspace trajectory: {label}");

    // Pool of fixed-size command buffers
    let mut pool = Pool::new(64, 4);
    let block = pool.alloc();
    pool.get_mut(block)?[..8].copy_from_slice(&1.0f64.to_le_bytes());
    pool.free(block)?;
    if pool.free(block).is_err() {
        warn!("double free was rejected");
    }

    core.shutdown().context("failed to shut down core")?;
    info!("Core shutdown successfully!");
    Ok(())
}
