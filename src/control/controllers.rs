//! Controllers for the robot

use std::collections::HashMap;

use nalgebra::DVector;

use crate::control::trajectory::{invalid_parameter, Sample};
use crate::error::TrajectoryError;

/// Joint-space trajectory tracking controller
#[derive(Debug, Clone)]
pub struct JointTrackingController {
    // Proportional gain on the position error
    tracking_gain: f64,
}

impl Default for JointTrackingController {
    fn default() -> Self {
        Self::new()
    }
}

impl JointTrackingController {
    /// Create a new controller
    pub fn new() -> Self {
        JointTrackingController { tracking_gain: 1.0 }
    }

    pub fn tracking_gain(&self) -> f64 {
        self.tracking_gain
    }

    /// Compute joint velocity commands
    ///
    /// Feeds the reference velocity forward and corrects the position error
    /// proportionally: `dq_ref + gain * (q_ref - q)`.
    pub fn compute_velocity(
        &self,
        reference: &Sample,
        measured: &[f64],
    ) -> Result<DVector<f64>, TrajectoryError> {
        if measured.len() != reference.position.len() {
            return Err(TrajectoryError::DimensionMismatch {
                what: "measured joint positions",
                expected: reference.position.len(),
                found: measured.len(),
            });
        }
        let error = &reference.position - DVector::from_column_slice(measured);
        Ok(&reference.velocity + error * self.tracking_gain)
    }

    /// Configure the controller with parameters
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<(), TrajectoryError> {
        if let Some(&gain) = params.get("tracking_gain") {
            if !(gain >= 0.0) || !gain.is_finite() {
                return Err(invalid_parameter("tracking_gain", gain));
            }
            self.tracking_gain = gain;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Sample {
        Sample {
            time: 0.5,
            position: DVector::from_vec(vec![1.0, 2.0]),
            velocity: DVector::from_vec(vec![0.5, -0.5]),
            acceleration: DVector::zeros(2),
        }
    }

    #[test]
    fn on_track_commands_the_reference_velocity() {
        let controller = JointTrackingController::new();
        let command = controller.compute_velocity(&reference(), &[1.0, 2.0]).unwrap();
        assert_eq!(command.as_slice(), &[0.5, -0.5]);
    }

    #[test]
    fn position_error_is_corrected() {
        let mut controller = JointTrackingController::new();
        let params = HashMap::from([("tracking_gain".to_string(), 2.0)]);
        controller.configure(&params).unwrap();
        let command = controller.compute_velocity(&reference(), &[0.5, 2.25]).unwrap();
        assert_eq!(command.as_slice(), &[1.5, -1.0]);

        assert!(controller.compute_velocity(&reference(), &[0.0]).is_err());
        let bad = HashMap::from([("tracking_gain".to_string(), -1.0)]);
        assert!(controller.configure(&bad).is_err());
        assert_eq!(controller.tracking_gain(), 2.0);
    }
}
