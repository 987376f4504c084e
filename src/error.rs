//! Error types for calibration and calibration-file I/O

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by calibration runs and calibration-file access
///
/// All recoverable failures flow through this enum; precondition violations
/// (such as an untagged sample reaching the static interval detector) are
/// programming errors and fail fast with an assertion instead.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// Calibration file cannot be opened, read, or written
    #[error("calibration file {}: {source}", .path.display())]
    Io {
        /// Path of the offending file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Calibration file holds fewer scalars than the format requires
    #[error("calibration file {} is truncated: expected {expected} values, found {found}", .path.display())]
    TruncatedFile {
        /// Path of the offending file
        path: PathBuf,
        /// Number of scalars the format requires
        expected: usize,
        /// Number of scalars actually present
        found: usize,
    },

    /// A token in the calibration file does not parse as a float
    #[error("calibration file {}: invalid scalar {token:?}", .path.display())]
    MalformedScalar {
        /// Path of the offending file
        path: PathBuf,
        /// The token that failed to parse
        token: String,
    },

    /// Fewer usable static intervals than the calibration requires
    #[error("{found} static intervals detected, at least {required} required")]
    InsufficientIntervals {
        /// Usable static intervals found in the input
        found: usize,
        /// Fixed minimum the estimation needs
        required: usize,
    },

    /// The optimizer exhausted its iteration budget without converging
    #[error("optimizer did not converge within {iterations} iterations (final cost {final_cost:.3e})")]
    SolverDiverged {
        /// Iterations performed before giving up
        iterations: usize,
        /// Residual cost at the last accepted step
        final_cost: f64,
    },

    /// The optimizer produced a non-finite cost or parameter vector
    #[error("optimizer produced a non-finite solution")]
    NonFiniteSolution,
}

/// Crate-wide result alias
pub type Result<T> = core::result::Result<T, CalibrationError>;
