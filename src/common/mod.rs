//! Common utilities and types for the Prometheus motion core

/// Common types used across the codebase
pub mod types {
    /// A pose in quaternion-vector form: `[qx, qy, qz, qw, x, y, z]`.
    pub type Qutr = [f64; 7];

    /// A twist or spatial acceleration: `[vx, vy, vz, wx, wy, wz]`.
    pub type Twist = [f64; 6];

    /// Number of values in a [`Qutr`].
    pub const QUTR_LEN: usize = 7;

    /// Number of values in a [`Twist`].
    pub const TWIST_LEN: usize = 6;

    /// The identity pose.
    pub const QUTR_IDENTITY: Qutr = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
}

/// Conversions between quaternion-vector arrays and `nalgebra` types.
pub mod pose {
    use nalgebra::{Quaternion, UnitQuaternion, Vector3};

    /// Split a `[qx, qy, qz, qw, x, y, z]` slice into a normalized rotation
    /// and a translation. `x` must hold at least seven values.
    pub fn from_qutr(x: &[f64]) -> (UnitQuaternion<f64>, Vector3<f64>) {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(x[3], x[0], x[1], x[2]));
        (rotation, Vector3::new(x[4], x[5], x[6]))
    }

    /// Write a rotation and translation back as `[qx, qy, qz, qw, x, y, z]`.
    pub fn write_qutr(rotation: &UnitQuaternion<f64>, translation: &Vector3<f64>, out: &mut [f64]) {
        // nalgebra stores quaternion coordinates as [i, j, k, w].
        out[..4].copy_from_slice(rotation.coords.as_slice());
        out[4..7].copy_from_slice(translation.as_slice());
    }

    /// World-frame displacement between two poses as `[dx, dy, dz, rx, ry, rz]`,
    /// where `r` is the rotation vector taking `from` to `to`.
    pub fn displacement(from: &[f64], to: &[f64], out: &mut [f64]) {
        let (r0, p0) = from_qutr(from);
        let (r1, p1) = from_qutr(to);
        let dp = p1 - p0;
        let dr = (r1 * r0.inverse()).scaled_axis();
        out[..3].copy_from_slice(dp.as_slice());
        out[3..6].copy_from_slice(dr.as_slice());
    }

    /// Translation L1 distance plus rotation angle between two poses.
    pub fn distance(a: &[f64], b: &[f64]) -> f64 {
        let (ra, pa) = from_qutr(a);
        let (rb, pb) = from_qutr(b);
        let delta = ra.inverse() * rb;
        // atan2 stays accurate for nearly equal rotations, acos does not.
        let angle = 2.0 * delta.imag().norm().atan2(delta.scalar().abs());
        (pb - pa).abs().sum() + angle
    }

}
