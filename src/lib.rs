//! Motion core for the Prometheus robot: region and pool allocators, robot
//! state vectors, and parabolic blend / linear trajectory generation.
pub mod common;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod state;

pub use crate::control::trajectory::{
    generate_linear_jointspace, generate_parabolic_blend_jointspace,
    generate_parabolic_blend_taskspace, EvalStatus, Sample, SegmentList, Space,
    TrajectoryGenerator, WaypointList,
};
pub use crate::error::{MotionError, PoolError, RegionError, TrajectoryError};
pub use crate::memory::{Pool, Region};
pub use crate::state::{JointLimits, Limits, State, TaskLimits};

use tracing::info;

use crate::control::MotionControlStack;
use crate::lifecycle::LifecycleNode;

/// Core functionality for the Prometheus robot
#[derive(Default)]
pub struct PrometheusCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl PrometheusCore {
    /// Create a new instance of PrometheusCore
    pub fn new() -> Self {
        PrometheusCore {
            components: Vec::new(),
        }
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Initialize all registered components
    pub fn init(&mut self) -> Result<(), MotionError> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        info!(components = self.components.len(), "core initialized");
        Ok(())
    }

    /// Shutdown all registered components
    pub fn shutdown(&mut self) -> Result<(), MotionError> {
        for component in &mut self.components {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        info!(components = self.components.len(), "core shut down");
        Ok(())
    }

    /// Get a reference to the motion control stack
    pub fn motion_stack_mut(&mut self) -> Option<&mut MotionControlStack> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<MotionControlStack>())
    }
}
