//! Multi-position calibration of accelerometer and gyroscope triads
//!
//! The procedure needs no external equipment: the device is placed in a
//! number of distinct static orientations connected by short motions. At
//! rest the calibrated accelerometer must read local gravity regardless of
//! orientation, which constrains its misalignment, scale, and bias. The
//! gyroscope is then constrained by the orientation changes between
//! consecutive rest positions: integrating the calibrated angular rate
//! across a motion segment must map one measured gravity direction onto
//! the next.

use log::{debug, info, warn};
use nalgebra::{DVector, Vector3};

use crate::calibration::CalibratedTriad;
use crate::error::{CalibrationError, Result};
use crate::integration::integrate_gyro_interval;
use crate::intervals::{central_sample, interval_mean, static_intervals_detector};
use crate::math::safe_normalize;
use crate::solver::{SolverConfig, solve_least_squares};
use crate::types::{DataInterval, MultiPosSettings, TriadSample};

/// Fixed minimum number of usable static intervals
///
/// Nine-plus unknowns per triad need orientations to spare; below this
/// bound the estimation is rejected outright.
pub const MIN_STATIC_INTERVALS: usize = 12;

/// Multi-position calibration of one accelerometer and, optionally, one
/// gyroscope triad
///
/// Holds the run configuration and the results of the most recent
/// successful calibration call. A failed call reports its error and leaves
/// previously stored results untouched. One instance serves one
/// calibration run at a time; independent instances are independent.
///
/// # Example
/// ```no_run
/// use imu_calib::{MultiPosCalibration, MultiPosSettings, TriadSample};
///
/// let acc_samples: Vec<TriadSample> = unimplemented!("tagged samples from a capture log");
///
/// let mut calibration = MultiPosCalibration::with_settings(MultiPosSettings {
///     gravity_magnitude: 9.80665,
///     ..Default::default()
/// });
/// calibration.calibrate_acc(&acc_samples)?;
/// calibration.acc_calibration().save("imu_acc.calib")?;
/// # Ok::<(), imu_calib::CalibrationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MultiPosCalibration {
    settings: MultiPosSettings,
    solver_config: SolverConfig,
    acc_calibration: CalibratedTriad,
    gyro_calibration: CalibratedTriad,
    calibrated_acc_samples: Vec<TriadSample>,
    calibrated_gyro_samples: Vec<TriadSample>,
}

impl MultiPosCalibration {
    /// Create a calibration with default settings
    pub fn new() -> Self {
        Self::with_settings(MultiPosSettings::default())
    }

    /// Create a calibration with the given settings
    pub fn with_settings(settings: MultiPosSettings) -> Self {
        Self {
            settings,
            solver_config: SolverConfig::default(),
            acc_calibration: CalibratedTriad::default(),
            gyro_calibration: CalibratedTriad::default(),
            calibrated_acc_samples: Vec::new(),
            calibrated_gyro_samples: Vec::new(),
        }
    }

    /// Current settings
    pub fn settings(&self) -> &MultiPosSettings {
        &self.settings
    }

    /// Replace the settings
    pub fn set_settings(&mut self, settings: MultiPosSettings) {
        self.settings = settings;
    }

    /// Current solver configuration
    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver_config
    }

    /// Replace the solver configuration
    pub fn set_solver_config(&mut self, config: SolverConfig) {
        self.solver_config = config;
    }

    /// The fixed minimum number of usable static intervals
    pub fn min_static_intervals(&self) -> usize {
        MIN_STATIC_INTERVALS
    }

    /// Accelerometer calibration from the last successful call
    pub fn acc_calibration(&self) -> &CalibratedTriad {
        &self.acc_calibration
    }

    /// Gyroscope calibration from the last successful call
    pub fn gyro_calibration(&self) -> &CalibratedTriad {
        &self.gyro_calibration
    }

    /// Calibrated accelerometer samples from the last successful call
    pub fn calibrated_acc_samples(&self) -> &[TriadSample] {
        &self.calibrated_acc_samples
    }

    /// Calibrated gyroscope samples from the last successful call
    pub fn calibrated_gyro_samples(&self) -> &[TriadSample] {
        &self.calibrated_gyro_samples
    }

    /// Calibrate the accelerometer triad from a tagged sample sequence
    ///
    /// `acc_samples` is the full capture: samples tagged with a static
    /// interval id plus untagged motion samples, which are ignored for
    /// interval detection. Intervals spanning fewer than the configured
    /// `interval_samples` are dropped; at least [`MIN_STATIC_INTERVALS`]
    /// usable intervals must remain.
    ///
    /// Each usable interval is reduced to a representative reading whose
    /// calibrated magnitude is constrained to the configured gravity.
    /// The fit refines the six misalignment coefficients and three scales,
    /// plus the bias when `optimize_acc_bias` is set; otherwise the bias
    /// stays at the initial estimate (seeded from the leading at-rest
    /// samples or taken from `init_acc_calibration`).
    ///
    /// On success the accelerometer calibration and the calibrated sample
    /// sequence are stored; on failure both keep their previous values.
    pub fn calibrate_acc(&mut self, acc_samples: &[TriadSample]) -> Result<()> {
        let (tagged, intervals) = self.detect_usable_intervals(acc_samples)?;
        debug!("accelerometer calibration: {} usable intervals", intervals.len());

        let representatives: Vec<Vector3<f64>> = intervals
            .iter()
            .map(|interval| reduce_interval(&tagged, interval, self.settings.acc_use_means))
            .collect();

        let init = self.initial_acc_guess(acc_samples);
        debug!("accelerometer calibration: initial guess built");
        let optimize_bias = self.settings.optimize_acc_bias;
        let held_bias = init.bias();
        let gravity = self.settings.gravity_magnitude;

        let residuals = move |x: &DVector<f64>| {
            let triad = triad_from_parameters(x, held_bias, optimize_bias);
            DVector::from_iterator(
                representatives.len(),
                representatives
                    .iter()
                    .map(|reading| triad.unbias_normalize(*reading).magnitude() - gravity),
            )
        };

        debug!("accelerometer calibration: optimizing");
        let (solution, report) = solve_least_squares(
            parameters_from_triad(&init, optimize_bias),
            residuals,
            &self.solver_config,
        )?;
        let calibration = triad_from_parameters(&solution, held_bias, optimize_bias);

        if self.settings.verbose {
            info!(
                "accelerometer calibration converged after {} iterations, cost {:.3e} -> {:.3e}",
                report.iterations, report.initial_cost, report.final_cost
            );
        }

        self.acc_calibration = calibration;
        self.calibrated_acc_samples = acc_samples
            .iter()
            .map(|sample| calibration.unbias_normalize_sample(sample))
            .collect();
        Ok(())
    }

    /// Calibrate the accelerometer and gyroscope triads jointly
    ///
    /// Runs [`calibrate_acc`](Self::calibrate_acc) first, then fits the
    /// gyroscope: for every pair of consecutive static intervals the
    /// candidate-calibrated angular rate is integrated across the motion
    /// segment between them (located by the static boundaries'
    /// timestamps), and the rotated gravity direction of the first
    /// interval is compared with the measured direction at the second.
    /// `gyro_samples` need not be tagged; angular rates are in rad/s.
    ///
    /// The gyroscope bias is taken from the leading at-rest samples (or
    /// `init_gyro_calibration`) and refined jointly only when
    /// `optimize_gyro_bias` is set.
    ///
    /// An accelerometer-phase failure leaves all results untouched; a
    /// gyroscope-phase failure keeps the fresh accelerometer results and
    /// the previous gyroscope results.
    pub fn calibrate_acc_gyro(
        &mut self,
        acc_samples: &[TriadSample],
        gyro_samples: &[TriadSample],
    ) -> Result<()> {
        self.calibrate_acc(acc_samples)?;

        let (tagged, intervals) = self.detect_usable_intervals(acc_samples)?;

        // Gravity direction at each rest position, as measured by the
        // freshly calibrated accelerometer
        let acc_calibration = self.acc_calibration;
        let versors: Vec<Vector3<f64>> = intervals
            .iter()
            .map(|interval| {
                safe_normalize(acc_calibration.unbias_normalize(interval_mean(&tagged, interval)))
            })
            .collect();

        let segments = motion_segments(&tagged, &intervals, gyro_samples);
        debug!(
            "gyroscope calibration: {} motion segments between {} static intervals",
            segments.len(),
            intervals.len()
        );

        let init = self.initial_gyro_guess(gyro_samples);
        debug!("gyroscope calibration: initial guess built");
        let optimize_bias = self.settings.optimize_gyro_bias;
        let held_bias = init.bias();
        let period = self.settings.gyro_period;

        let residuals = move |x: &DVector<f64>| {
            let triad = triad_from_parameters(x, held_bias, optimize_bias);
            let mut r = DVector::zeros(3 * segments.len());
            for (k, segment) in segments.iter().enumerate() {
                let calibrated: Vec<TriadSample> = segment
                    .iter()
                    .map(|sample| triad.unbias_normalize_sample(sample))
                    .collect();
                let rotation = integrate_gyro_interval(&calibrated, period);
                let difference = versors[k + 1] - rotation.inverse() * versors[k];
                r[3 * k] = difference.x;
                r[3 * k + 1] = difference.y;
                r[3 * k + 2] = difference.z;
            }
            r
        };

        debug!("gyroscope calibration: optimizing");
        let (solution, report) = solve_least_squares(
            parameters_from_triad(&init, optimize_bias),
            residuals,
            &self.solver_config,
        )?;
        let calibration = triad_from_parameters(&solution, held_bias, optimize_bias);

        if self.settings.verbose {
            info!(
                "gyroscope calibration converged after {} iterations, cost {:.3e} -> {:.3e}",
                report.iterations, report.initial_cost, report.final_cost
            );
        }

        self.gyro_calibration = calibration;
        self.calibrated_gyro_samples = gyro_samples
            .iter()
            .map(|sample| calibration.unbias_normalize_sample(sample))
            .collect();
        Ok(())
    }

    /// Detect the usable static intervals in a tagged capture
    ///
    /// Returns the tagged subset of the input and the detected intervals
    /// (indices into that subset) spanning at least `interval_samples`.
    fn detect_usable_intervals(
        &self,
        samples: &[TriadSample],
    ) -> Result<(Vec<TriadSample>, Vec<DataInterval>)> {
        let tagged: Vec<TriadSample> = samples
            .iter()
            .copied()
            .filter(TriadSample::is_tagged)
            .collect();

        let mut intervals = static_intervals_detector(&tagged);
        intervals.retain(|interval| {
            interval.is_open() && interval.sample_count() >= self.settings.interval_samples
        });

        if intervals.len() < MIN_STATIC_INTERVALS {
            return Err(CalibrationError::InsufficientIntervals {
                found: intervals.len(),
                required: MIN_STATIC_INTERVALS,
            });
        }
        Ok((tagged, intervals))
    }

    /// Initial accelerometer guess: supplied calibration, or identity with
    /// the bias seeded from the leading at-rest samples
    fn initial_acc_guess(&self, samples: &[TriadSample]) -> CalibratedTriad {
        self.settings.init_acc_calibration.unwrap_or_else(|| {
            let bias = initial_bias(samples, self.settings.init_samples);
            CalibratedTriad::new([0.0; 6], [1.0; 3], [bias.x, bias.y, bias.z])
        })
    }

    /// Initial gyroscope guess: supplied calibration, or identity with the
    /// bias seeded from the leading at-rest samples
    fn initial_gyro_guess(&self, samples: &[TriadSample]) -> CalibratedTriad {
        self.settings.init_gyro_calibration.unwrap_or_else(|| {
            let bias = initial_bias(samples, self.settings.init_samples);
            CalibratedTriad::new([0.0; 6], [1.0; 3], [bias.x, bias.y, bias.z])
        })
    }
}

impl Default for MultiPosCalibration {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the leading `init_samples` readings
///
/// Clamps to the available sample count with a warning; the caller is
/// expected to have kept the device at rest for this long.
fn initial_bias(samples: &[TriadSample], init_samples: usize) -> Vector3<f64> {
    if samples.is_empty() {
        return Vector3::zeros();
    }
    let count = if init_samples > samples.len() {
        warn!(
            "only {} samples available for the initial bias estimate, {} requested",
            samples.len(),
            init_samples
        );
        samples.len()
    } else {
        init_samples
    };
    interval_mean(samples, &DataInterval::new(0, count as isize - 1))
}

/// Reduce a static interval to one representative reading
fn reduce_interval(
    samples: &[TriadSample],
    interval: &DataInterval,
    use_means: bool,
) -> Vector3<f64> {
    if use_means {
        interval_mean(samples, interval)
    } else {
        central_sample(samples, interval).data()
    }
}

/// Slice the gyroscope stream into the motion segments between consecutive
/// static intervals
///
/// Segment k spans from the timestamp of interval k's last sample to the
/// timestamp of interval k+1's first sample, boundaries included; the rate
/// is near zero at the boundaries, so the overlap costs nothing and keeps
/// the slicing robust to timestamp jitter between the two streams.
fn motion_segments(
    tagged_acc: &[TriadSample],
    intervals: &[DataInterval],
    gyro_samples: &[TriadSample],
) -> Vec<Vec<TriadSample>> {
    intervals
        .windows(2)
        .map(|pair| {
            let begin = tagged_acc[pair[0].end_idx as usize].timestamp();
            let end = tagged_acc[pair[1].start_idx as usize].timestamp();

            let first = gyro_samples.partition_point(|s| s.timestamp() < begin);
            let last = gyro_samples.partition_point(|s| s.timestamp() <= end);
            gyro_samples[first..last].to_vec()
        })
        .collect()
}

/// Build a triad from the solver's parameter vector
///
/// Layout: six misalignment coefficients, three scales, and three biases
/// when the bias is optimized; otherwise `held_bias` is used.
fn triad_from_parameters(
    x: &DVector<f64>,
    held_bias: Vector3<f64>,
    optimize_bias: bool,
) -> CalibratedTriad {
    let misalignment = [x[0], x[1], x[2], x[3], x[4], x[5]];
    let scale = [x[6], x[7], x[8]];
    let bias = if optimize_bias {
        [x[9], x[10], x[11]]
    } else {
        [held_bias.x, held_bias.y, held_bias.z]
    };
    CalibratedTriad::new(misalignment, scale, bias)
}

/// Pack a triad into the solver's parameter vector
fn parameters_from_triad(triad: &CalibratedTriad, optimize_bias: bool) -> DVector<f64> {
    let mut x = Vec::with_capacity(if optimize_bias { 12 } else { 9 });
    x.extend_from_slice(&[
        triad.mis_yz(),
        triad.mis_zy(),
        triad.mis_zx(),
        triad.mis_xz(),
        triad.mis_xy(),
        triad.mis_yx(),
        triad.scale_x(),
        triad.scale_y(),
        triad.scale_z(),
    ]);
    if optimize_bias {
        x.extend_from_slice(&[triad.bias_x(), triad.bias_y(), triad.bias_z()]);
    }
    DVector::from_vec(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_round_trip_with_bias() {
        let triad = CalibratedTriad::new(
            [0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            [1.1, 0.9, 1.05],
            [0.2, -0.3, 0.4],
        );

        let x = parameters_from_triad(&triad, true);
        assert_eq!(x.len(), 12);
        let rebuilt = triad_from_parameters(&x, Vector3::zeros(), true);
        assert_eq!(rebuilt, triad);
    }

    #[test]
    fn test_parameter_round_trip_with_held_bias() {
        let triad = CalibratedTriad::new(
            [0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            [1.1, 0.9, 1.05],
            [0.2, -0.3, 0.4],
        );

        let x = parameters_from_triad(&triad, false);
        assert_eq!(x.len(), 9);
        let rebuilt = triad_from_parameters(&x, triad.bias(), false);
        assert_eq!(rebuilt, triad);
    }

    #[test]
    fn test_initial_bias_averages_leading_samples() {
        let samples: Vec<TriadSample> = (0..10)
            .map(|i| TriadSample::new(i as f64, Vector3::new(i as f64, 0.0, 1.0)))
            .collect();

        // Mean of x over the first 4 samples: (0 + 1 + 2 + 3) / 4
        let bias = initial_bias(&samples, 4);
        assert_eq!(bias, Vector3::new(1.5, 0.0, 1.0));

        // Requesting more than available clamps to the full sequence
        let bias = initial_bias(&samples, 100);
        assert_eq!(bias, Vector3::new(4.5, 0.0, 1.0));

        assert_eq!(initial_bias(&[], 100), Vector3::zeros());
    }

    #[test]
    fn test_reduce_interval_mean_vs_central() {
        let samples: Vec<TriadSample> = (0..5)
            .map(|i| TriadSample::tagged(i as f64, Vector3::new(i as f64, 0.0, 0.0), 0))
            .collect();
        let interval = DataInterval::new(0, 4);

        assert_eq!(
            reduce_interval(&samples, &interval, true),
            Vector3::new(2.0, 0.0, 0.0)
        );
        assert_eq!(
            reduce_interval(&samples, &interval, false),
            Vector3::new(2.0, 0.0, 0.0)
        );

        // With an even count the central sample is not the mean
        let interval = DataInterval::new(0, 3);
        assert_eq!(
            reduce_interval(&samples, &interval, true),
            Vector3::new(1.5, 0.0, 0.0)
        );
        assert_eq!(
            reduce_interval(&samples, &interval, false),
            Vector3::new(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_motion_segments_are_sliced_by_boundary_timestamps() {
        // Tagged rest samples at t = 0..2 and t = 5..7, gyro at 100 Hz-ish
        // integer timestamps across the whole span
        let tagged: Vec<TriadSample> = [0.0, 1.0, 2.0, 5.0, 6.0, 7.0]
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let id = if t < 3.0 { 0 } else { 1 };
                TriadSample::tagged(t, Vector3::new(i as f64, 0.0, 0.0), id)
            })
            .collect();
        let intervals = vec![DataInterval::new(0, 2), DataInterval::new(3, 5)];
        let gyro: Vec<TriadSample> = (0..=7)
            .map(|i| TriadSample::new(i as f64, Vector3::zeros()))
            .collect();

        let segments = motion_segments(&tagged, &intervals, &gyro);
        assert_eq!(segments.len(), 1);

        // Boundaries included: t in [2, 5]
        let times: Vec<f64> = segments[0].iter().map(TriadSample::timestamp).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_too_few_intervals_is_rejected_without_touching_state() {
        // Three static orientations only
        let mut samples = Vec::new();
        for interval in 0..3 {
            for i in 0..120 {
                let t = (interval * 200 + i) as f64 * 0.01;
                samples.push(TriadSample::tagged(t, Vector3::new(0.0, 0.0, 9.81), interval));
            }
        }

        let mut calibration = MultiPosCalibration::new();
        calibration.set_settings(MultiPosSettings {
            interval_samples: 100,
            init_samples: 100,
            ..Default::default()
        });

        let result = calibration.calibrate_acc(&samples);
        match result {
            Err(CalibrationError::InsufficientIntervals { found, required }) => {
                assert_eq!(found, 3);
                assert_eq!(required, MIN_STATIC_INTERVALS);
            }
            other => panic!("expected InsufficientIntervals, got {other:?}"),
        }

        // Stored results keep their previous (default) values
        assert_eq!(*calibration.acc_calibration(), CalibratedTriad::default());
        assert!(calibration.calibrated_acc_samples().is_empty());
    }

    #[test]
    fn test_short_intervals_do_not_qualify() {
        // Twelve intervals, but every other one is too short to use
        let mut samples = Vec::new();
        let mut t = 0.0;
        for interval in 0..12 {
            let length = if interval % 2 == 0 { 120 } else { 10 };
            for _ in 0..length {
                samples.push(TriadSample::tagged(t, Vector3::new(0.0, 0.0, 9.81), interval));
                t += 0.01;
            }
        }

        let mut calibration = MultiPosCalibration::new();
        calibration.set_settings(MultiPosSettings {
            interval_samples: 100,
            init_samples: 100,
            ..Default::default()
        });

        match calibration.calibrate_acc(&samples) {
            Err(CalibrationError::InsufficientIntervals { found, .. }) => assert_eq!(found, 6),
            other => panic!("expected InsufficientIntervals, got {other:?}"),
        }
    }
}
