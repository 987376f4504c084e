//! Small numeric helpers shared across the calibration pipeline

use nalgebra::Vector3;

/// Degrees-to-radians conversion factor
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
/// Radians-to-degrees conversion factor
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Normalize a vector, returning the zero vector for zero input
///
/// The gravity versor construction must not blow up on a degenerate
/// (all-zero) interval mean.
pub fn safe_normalize(vector: Vector3<f64>) -> Vector3<f64> {
    let magnitude_squared = vector.magnitude_squared();

    if magnitude_squared == 0.0 {
        return Vector3::zeros();
    }

    vector / magnitude_squared.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_normalize() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        let n = safe_normalize(v);
        assert!((n.magnitude() - 1.0).abs() < 1e-12);
        assert!((n - Vector3::new(0.6, 0.8, 0.0)).magnitude() < 1e-12);
    }

    #[test]
    fn test_safe_normalize_zero_input() {
        assert_eq!(safe_normalize(Vector3::zeros()), Vector3::zeros());
    }

    #[test]
    fn test_angle_conversions_are_inverse() {
        let angle = 37.5;
        assert!((angle * DEG_TO_RAD * RAD_TO_DEG - angle).abs() < 1e-12);
    }
}
