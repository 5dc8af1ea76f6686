//! Control module for Prometheus robot
pub mod controllers;
pub mod trajectory;

use std::any::Any;
use std::collections::HashMap;

use nalgebra::DVector;
use tracing::info;

use self::controllers::JointTrackingController;
use self::trajectory::{
    invalid_parameter, JointParabolicBlend, Sample, TrajectoryGenerator, WaypointList,
};
use crate::error::MotionError;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, NodeState};
use crate::memory::Region;
use crate::state::{JointLimits, State};

/// A joint trajectory sampled at a fixed period.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMotion {
    pub duration: f64,
    pub sample_period: f64,
    /// Samples every `sample_period` seconds, the last one at `duration`.
    pub samples: Vec<Sample>,
}

impl PlannedMotion {
    /// The sample in effect at time `t`; the final sample from `duration` on.
    pub fn reference_at(&self, t: f64) -> Option<&Sample> {
        if t >= self.duration {
            return self.samples.last();
        }
        let index = (t.max(0.0) / self.sample_period) as usize;
        self.samples.get(index)
    }

    /// The state the motion comes to rest in.
    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Motion control stack for the robot
///
/// Owns a region that is allocated on configure, reused by every plan and
/// dropped on cleanup. Each plan builds its waypoints, limits and segments
/// in the region, copies the samples out, and releases the region again.
#[derive(Debug)]
pub struct MotionControlStack {
    base: LifecycleNodeBase,
    region: Option<Region>,
    region_capacity: usize,
    sample_period: f64,
    generator: JointParabolicBlend,
    controller: JointTrackingController,
}

impl Default for MotionControlStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionControlStack {
    /// Create a new motion control stack
    pub fn new() -> Self {
        MotionControlStack {
            base: LifecycleNodeBase::new("motion_control_stack"),
            region: None,
            region_capacity: 4096,
            sample_period: 0.01,
            generator: JointParabolicBlend::default(),
            controller: JointTrackingController::new(),
        }
    }

    /// Configure the stack and its generator and controller
    ///
    /// A new `region_capacity` takes effect on the next `on_configure`.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), MotionError> {
        if let Some(&capacity) = params.get("region_capacity") {
            if !(capacity >= 1.0) || capacity.fract() != 0.0 {
                return Err(invalid_parameter("region_capacity", capacity).into());
            }
            self.region_capacity = capacity as usize;
        }

        if let Some(&period) = params.get("sample_period") {
            if !(period > 0.0) || !period.is_finite() {
                return Err(invalid_parameter("sample_period", period).into());
            }
            self.sample_period = period;
        }

        self.generator.configure(params)?;
        self.controller.configure(params)?;
        Ok(())
    }

    /// Plan a blended joint motion through `waypoints`
    pub fn plan(
        &mut self,
        waypoints: &[Vec<f64>],
        limits: &JointLimits,
    ) -> Result<PlannedMotion, MotionError> {
        let Some(region) = self.region.as_mut() else {
            return Err(MotionError::NotConfigured(self.base.name.clone()));
        };
        let planned = plan_in(region, &self.generator, waypoints, limits, self.sample_period);
        region.release();
        let planned = planned?;
        info!(
            waypoints = waypoints.len(),
            duration = planned.duration,
            samples = planned.samples.len(),
            "planned joint motion"
        );
        Ok(planned)
    }

    /// Compute joint velocity commands tracking `reference`
    pub fn compute_command(
        &self,
        reference: &Sample,
        measured: &[f64],
    ) -> Result<DVector<f64>, MotionError> {
        Ok(self.controller.compute_velocity(reference, measured)?)
    }

    pub fn sample_period(&self) -> f64 {
        self.sample_period
    }

    /// The planning region, while configured.
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn state(&self) -> NodeState {
        self.base.get_state()
    }
}

fn plan_in(
    region: &Region,
    generator: &dyn TrajectoryGenerator,
    waypoints: &[Vec<f64>],
    limits: &JointLimits,
    sample_period: f64,
) -> Result<PlannedMotion, MotionError> {
    let mut list = WaypointList::new(region);
    for q in waypoints {
        list.add(&State::joint(region, q))?;
    }
    let limits = limits.alloc_in(region);
    let trajectory = generator.generate(region, &list, &limits)?;
    let samples = trajectory.samples(sample_period)?.collect();
    Ok(PlannedMotion {
        duration: trajectory.duration(),
        sample_period,
        samples,
    })
}

impl LifecycleNode for MotionControlStack {
    fn on_configure(&mut self) -> Result<(), MotionError> {
        self.region = Some(Region::new(self.region_capacity));
        self.base.set_state(NodeState::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<(), MotionError> {
        if self.region.is_none() {
            return Err(MotionError::NotConfigured(self.base.name.clone()));
        }
        self.base.set_state(NodeState::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), MotionError> {
        self.base.set_state(NodeState::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<(), MotionError> {
        self.region = None;
        self.base.set_state(NodeState::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
