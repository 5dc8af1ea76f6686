use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus_motion::control::{MotionControlStack, PlannedMotion};
use prometheus_motion::{JointLimits, PrometheusCore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Plays a planned joint motion against a simulated velocity-controlled
/// plant at a fixed control rate.
struct TrajectoryPlayer {
    core: PrometheusCore,
    motion: Option<PlannedMotion>,
    measured: Vec<f64>,
    elapsed: f64,
    control_period: f64,
}

impl TrajectoryPlayer {
    fn new(control_period: f64) -> Result<Self> {
        let mut core = PrometheusCore::new();

        let mut stack = MotionControlStack::new();
        let mut params = HashMap::new();
        params.insert("sample_period".to_string(), control_period);
        params.insert("tracking_gain".to_string(), 5.0);
        stack
            .configure(&params)
            .context("failed to configure motion stack")?;
        core.register(stack);
        core.init().context("failed to initialize core")?;

        Ok(TrajectoryPlayer {
            core,
            motion: None,
            measured: Vec::new(),
            elapsed: 0.0,
            control_period,
        })
    }

    fn goal_callback(&mut self, waypoints: &[Vec<f64>], limits: &JointLimits) -> Result<()> {
        let stack = self
            .core
            .motion_stack_mut()
            .context("motion stack is not registered")?;
        let motion = stack.plan(waypoints, limits)?;
        info!(
            duration = motion.duration,
            samples = motion.samples.len(),
            "received new motion"
        );
        self.measured = waypoints.first().cloned().unwrap_or_default();
        self.elapsed = 0.0;
        self.motion = Some(motion);
        Ok(())
    }

    /// One control step. Returns `false` once the motion has finished.
    fn timer_callback(&mut self) -> Result<bool> {
        let Some(motion) = &self.motion else {
            return Ok(false);
        };
        let Some(reference) = motion.reference_at(self.elapsed) else {
            return Ok(false);
        };
        let stack = self
            .core
            .motion_stack_mut()
            .context("motion stack is not registered")?;
        let command = stack.compute_command(reference, &self.measured)?;

        // Simulated plant: integrate the commanded velocity.
        for (q, dq) in self.measured.iter_mut().zip(command.iter()) {
            *q += dq * self.control_period;
        }
        debug!(
            t = self.elapsed,
            q = ?self.measured,
            reference = ?reference.position.as_slice(),
            "control step"
        );

        self.elapsed += self.control_period;
        if self.elapsed > motion.duration {
            let error: f64 = reference
                .position
                .iter()
                .zip(&self.measured)
                .map(|(r, q)| (r - q).abs())
                .sum();
            info!(final_error = error, "motion finished");
            self.motion = None;
            return Ok(false);
        }
        Ok(true)
    }
}

impl Drop for TrajectoryPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.core.shutdown() {
            warn!("Failed to shut down core: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Initializing Prometheus trajectory player...");

    let control_period = 0.01;
    let mut player = TrajectoryPlayer::new(control_period)?;
    let waypoints = vec![
        vec![0.0, 0.0, 0.0],
        vec![0.8, -0.4, 0.3],
        vec![1.2, 0.2, -0.3],
        vec![0.0, 0.0, 0.0],
    ];
    let limits = JointLimits::symmetric(&[1.0, 1.0, 0.5], &[2.0, 2.0, 1.0]);
    player.goal_callback(&waypoints, &limits)?;

    let mut ticker = interval(Duration::from_secs_f64(control_period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !player.timer_callback()? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping playback");
                break;
            }
        }
    }

    info!("Trajectory player finished");
    Ok(())
}
