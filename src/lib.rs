//! imu-calib - multi-position calibration for IMU sensor triads
//!
//! Calibrates a 3-axis accelerometer and gyroscope without external
//! equipment, following the multi-position scheme of Tedaldi, Pretto and
//! Menegatti ("A robust and easy to implement method for IMU calibration
//! without external equipments", ICRA 2014): the device is placed in a
//! series of distinct static orientations separated by short motions, and
//! the misalignment, per-axis scale, and bias of each triad are recovered
//! by nonlinear least squares.
//!
//! - At rest, the calibrated accelerometer must read local gravity in any
//!   orientation: one magnitude constraint per static interval.
//! - Between rest positions, integrating the calibrated angular rate must
//!   carry the measured gravity direction of one interval onto the next:
//!   one orientation-change constraint per motion segment.
//!
//! # Quick Start
//!
//! ```no_run
//! use imu_calib::{MultiPosCalibration, TriadSample};
//!
//! // Tagged capture: a motion classifier assigned each at-rest sample the
//! // id of its static interval; motion samples are left untagged.
//! let acc_samples: Vec<TriadSample> = unimplemented!("load from your capture");
//! let gyro_samples: Vec<TriadSample> = unimplemented!("load from your capture");
//!
//! let mut calibration = MultiPosCalibration::new();
//! calibration.calibrate_acc_gyro(&acc_samples, &gyro_samples)?;
//!
//! calibration.acc_calibration().save("imu_acc.calib")?;
//! calibration.gyro_calibration().save("imu_gyro.calib")?;
//! # Ok::<(), imu_calib::CalibrationError>(())
//! ```
//!
//! Applying a stored calibration later:
//!
//! ```no_run
//! use nalgebra::Vector3;
//! use imu_calib::CalibratedTriad;
//!
//! let triad = CalibratedTriad::load("imu_acc.calib")?;
//! let calibrated = triad.unbias_normalize(Vector3::new(0.12, -0.04, 9.93));
//! # Ok::<(), imu_calib::CalibrationError>(())
//! ```

pub mod calibration;
pub mod error;
pub mod integration;
pub mod intervals;
mod math;
pub mod multipos;
pub mod solver;
mod types;

// Re-export all public types and functions
pub use calibration::CalibratedTriad;
pub use error::{CalibrationError, Result};
pub use integration::integrate_gyro_interval;
pub use intervals::{central_sample, interval_mean, static_intervals_detector};
pub use math::{DEG_TO_RAD, RAD_TO_DEG};
pub use multipos::{MIN_STATIC_INTERVALS, MultiPosCalibration};
pub use solver::{SolverConfig, SolverReport, solve_least_squares};
pub use types::{DataInterval, MultiPosSettings, TriadSample};
