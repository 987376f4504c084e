//! Rotation integration of angular-rate sample windows
//!
//! The gyroscope residuals compare orientation changes across motion
//! segments, so the accumulated body rotation over a window of rate
//! samples is a contract of its own, kept separate from the optimization
//! loop.

use nalgebra::UnitQuaternion;

use crate::types::TriadSample;

/// Accumulate the body rotation described by a window of rate samples
///
/// Integrates angular rate (rad/s, body frame) with the midpoint
/// exponential-map step: for each pair of consecutive samples the mean of
/// their rates is applied over the step duration,
/// `q <- q * exp(0.5 * (w_i + w_{i+1}) * dt)`. The step duration comes
/// from `period` when given, otherwise from the samples' timestamps.
///
/// The result maps vectors from the body frame at the window's end into
/// the body frame at its start: for a world-fixed vector `v` seen as
/// `v_start` at the first sample, the view at the last sample is
/// `q.inverse() * v_start`.
///
/// Empty and single-sample windows integrate to the identity rotation. A
/// constant rate `w` held over a window of total duration `t` integrates
/// to exactly the angle `|w| * t` about `w / |w|`.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_calib::{TriadSample, integrate_gyro_interval};
///
/// // 1 rad/s about z for 1 s, sampled at 100 Hz
/// let rate = Vector3::new(0.0, 0.0, 1.0);
/// let samples: Vec<TriadSample> = (0..=100)
///     .map(|i| TriadSample::new(i as f64 * 0.01, rate))
///     .collect();
///
/// let rotation = integrate_gyro_interval(&samples, None);
/// assert!((rotation.angle() - 1.0).abs() < 1e-9);
/// ```
pub fn integrate_gyro_interval(
    samples: &[TriadSample],
    period: Option<f64>,
) -> UnitQuaternion<f64> {
    let mut rotation = UnitQuaternion::identity();

    for pair in samples.windows(2) {
        let dt = period.unwrap_or_else(|| pair[1].timestamp() - pair[0].timestamp());
        if dt <= 0.0 {
            continue;
        }

        let rate = 0.5 * (pair[0].data() + pair[1].data());
        rotation *= UnitQuaternion::from_scaled_axis(rate * dt);
    }

    rotation
}
