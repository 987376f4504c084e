//! Core data model: raw triad samples, static intervals, and calibration settings

use nalgebra::Vector3;

use crate::calibration::CalibratedTriad;

/// One timestamped reading from a 3-axis inertial sensor
///
/// Samples are immutable values: the calibration operations on
/// [`CalibratedTriad`] produce new samples rather than mutating in place.
/// A sample may carry the id of the static interval it belongs to, assigned
/// by a motion classifier before interval detection runs;
/// [`TriadSample::UNTAGGED`] marks samples that belong to no interval
/// (e.g. motion between two orientations).
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_calib::TriadSample;
///
/// let raw = TriadSample::new(0.01, Vector3::new(0.02, -0.01, 9.81));
/// assert!(!raw.is_tagged());
///
/// let tagged = TriadSample::tagged(0.02, Vector3::new(0.02, -0.01, 9.81), 0);
/// assert_eq!(tagged.interval_id(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriadSample {
    timestamp: f64,
    data: Vector3<f64>,
    interval_id: i32,
}

impl TriadSample {
    /// Interval id of a sample not assigned to any static interval
    pub const UNTAGGED: i32 = -1;

    /// Create a sample not assigned to any static interval
    ///
    /// # Arguments
    /// * `timestamp` - Sample time in seconds, non-decreasing within a sequence
    /// * `data` - Raw 3-axis reading in sensor units
    pub fn new(timestamp: f64, data: Vector3<f64>) -> Self {
        Self::tagged(timestamp, data, Self::UNTAGGED)
    }

    /// Create a sample assigned to the static interval `interval_id`
    pub fn tagged(timestamp: f64, data: Vector3<f64>, interval_id: i32) -> Self {
        Self {
            timestamp,
            data,
            interval_id,
        }
    }

    /// Sample time in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Raw 3-axis reading
    pub fn data(&self) -> Vector3<f64> {
        self.data
    }

    /// Static interval id, [`TriadSample::UNTAGGED`] if unassigned
    pub fn interval_id(&self) -> i32 {
        self.interval_id
    }

    /// Whether the sample is assigned to a static interval
    pub fn is_tagged(&self) -> bool {
        self.interval_id >= 0
    }

    /// Derive a new sample with the same timestamp and interval id
    ///
    /// Used by the calibration operations to produce corrected readings
    /// without touching the sample's identity.
    pub fn with_data(&self, data: Vector3<f64>) -> Self {
        Self {
            timestamp: self.timestamp,
            data,
            interval_id: self.interval_id,
        }
    }
}

/// A contiguous run of sample indices forming one static interval
///
/// Indices are inclusive on both ends and refer to the sample sequence the
/// interval was detected in. The [`DataInterval::UNSET`] sentinel marks an
/// interval that has not been opened yet; the detector emits one such
/// degenerate interval for an empty input sequence, and callers must discard
/// it.
///
/// # Example
/// ```
/// use imu_calib::DataInterval;
///
/// let interval = DataInterval::new(3, 7);
/// assert!(interval.is_open());
/// assert_eq!(interval.sample_count(), 5);
/// assert_eq!(interval.central_index(), 5);
///
/// assert!(!DataInterval::default().is_open());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataInterval {
    /// Index of the first sample in the interval, inclusive
    pub start_idx: isize,
    /// Index of the last sample in the interval, inclusive
    pub end_idx: isize,
}

impl DataInterval {
    /// Sentinel index of an interval bound that has not been set
    pub const UNSET: isize = -1;

    /// Create an interval covering `[start_idx, end_idx]`
    pub fn new(start_idx: isize, end_idx: isize) -> Self {
        Self { start_idx, end_idx }
    }

    /// Whether the interval has been opened (its start index is set)
    pub fn is_open(&self) -> bool {
        self.start_idx != Self::UNSET
    }

    /// Number of samples covered, zero for an unopened interval
    pub fn sample_count(&self) -> usize {
        if self.is_open() && self.end_idx >= self.start_idx {
            (self.end_idx - self.start_idx + 1) as usize
        } else {
            0
        }
    }

    /// Index of the sample at the middle of the interval
    ///
    /// Meaningful only for opened intervals.
    pub fn central_index(&self) -> usize {
        ((self.start_idx + self.end_idx) / 2).max(0) as usize
    }

    /// Inclusive index range covered by the interval
    ///
    /// Meaningful only for opened intervals.
    pub fn indices(&self) -> core::ops::RangeInclusive<usize> {
        self.start_idx.max(0) as usize..=self.end_idx.max(0) as usize
    }
}

impl Default for DataInterval {
    fn default() -> Self {
        Self {
            start_idx: Self::UNSET,
            end_idx: Self::UNSET,
        }
    }
}

/// Multi-position calibration settings
///
/// Configuration for one calibration run. The defaults are correct for the
/// common capture protocol: the device rests for several seconds at the
/// start of the log, then is moved through a series of distinct static
/// orientations separated by short motions.
///
/// # Example
/// ```
/// use imu_calib::MultiPosSettings;
///
/// let settings = MultiPosSettings {
///     gravity_magnitude: 9.80665,      // local gravity, m/s^2
///     init_samples: 2000,              // 20 s at 100 Hz
///     gyro_period: Some(0.01),         // fixed 100 Hz gyroscope stream
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPosSettings {
    /// Magnitude of local gravity in the accelerometer's calibrated units
    ///
    /// Every static interval constrains the calibrated reading to this
    /// magnitude.
    pub gravity_magnitude: f64,
    /// Number of leading samples used to seed the first bias estimate
    ///
    /// The device is assumed at rest while these samples were recorded.
    pub init_samples: usize,
    /// Minimum number of samples a static interval must span to be used
    pub interval_samples: usize,
    /// Reduce each static interval to its mean instead of a central sample
    pub acc_use_means: bool,
    /// Fixed gyroscope sampling period in seconds
    ///
    /// `None` derives the integration step from consecutive sample
    /// timestamps.
    pub gyro_period: Option<f64>,
    /// Optimize the accelerometer bias jointly with misalignment and scale
    ///
    /// When disabled the bias is held at the seeded initial estimate.
    pub optimize_acc_bias: bool,
    /// Optimize the gyroscope bias jointly with misalignment and scale
    ///
    /// When disabled the bias is held at the initial estimate taken from
    /// the leading at-rest samples.
    pub optimize_gyro_bias: bool,
    /// Emit `info`-level progress output during calibration
    pub verbose: bool,
    /// Initial accelerometer calibration guess
    ///
    /// `None` seeds identity misalignment/scale with the bias estimated
    /// from the leading at-rest samples.
    pub init_acc_calibration: Option<CalibratedTriad>,
    /// Initial gyroscope calibration guess
    ///
    /// `None` seeds identity misalignment/scale with the bias estimated
    /// from the leading at-rest samples.
    pub init_gyro_calibration: Option<CalibratedTriad>,
}

impl Default for MultiPosSettings {
    fn default() -> Self {
        Self {
            gravity_magnitude: 9.81,
            init_samples: 3000,
            interval_samples: 100,
            acc_use_means: false,
            gyro_period: None,
            optimize_acc_bias: true,
            optimize_gyro_bias: false,
            verbose: false,
            init_acc_calibration: None,
            init_gyro_calibration: None,
        }
    }
}
