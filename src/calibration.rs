//! The misalignment, scale, and bias correction model for a sensor triad
//!
//! A raw triad reading `X` is mapped to a calibrated reading `X'` by
//!
//! ```text
//!     [    1     -mis_yz   mis_zy ]        [ s_x   0     0  ]
//! T = [  mis_xz     1     -mis_zx ]    K = [  0   s_y    0  ]
//!     [ -mis_xy   mis_yx     1    ]        [  0    0    s_z ]
//!
//! X' = T * K * (X - B)
//! ```
//!
//! where `T` corrects the non-orthogonality of the physical axes, `K` the
//! per-axis sensitivities, and `B` is the constant bias.

use std::fmt;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Vector3};

use crate::error::{CalibrationError, Result};
use crate::types::TriadSample;

/// Number of scalars in a calibration file: two 3x3 matrices and a 3-vector
const FILE_SCALARS: usize = 21;

/// Calibration parameters of one sensor triad
///
/// Holds the six misalignment coefficients, three scales, and three biases
/// together with the derived matrices, including the composed correction
/// `M = T * K`. The derived matrices are recomputed inside every mutation,
/// so they are always consistent with the scalar coefficients.
///
/// The default triad is the identity transform: applying it returns the
/// input unchanged.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_calib::CalibratedTriad;
///
/// let triad = CalibratedTriad::default();
/// let raw = Vector3::new(0.1, -0.2, 9.8);
/// assert_eq!(triad.unbias_normalize(raw), raw);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedTriad {
    // Misalignment coefficients
    mis_yz: f64,
    mis_zy: f64,
    mis_zx: f64,
    mis_xz: f64,
    mis_xy: f64,
    mis_yx: f64,
    // Per-axis scales
    s_x: f64,
    s_y: f64,
    s_z: f64,
    // Biases
    b_x: f64,
    b_y: f64,
    b_z: f64,
    // Derived matrices, kept consistent with the coefficients above
    mis_mat: Matrix3<f64>,
    scale_mat: Matrix3<f64>,
    bias_vec: Vector3<f64>,
    ms_mat: Matrix3<f64>,
}

impl CalibratedTriad {
    /// Create a triad from its twelve scalar coefficients
    ///
    /// # Arguments
    /// * `misalignment` - `[mis_yz, mis_zy, mis_zx, mis_xz, mis_xy, mis_yx]`
    /// * `scale` - `[s_x, s_y, s_z]`
    /// * `bias` - `[b_x, b_y, b_z]`
    pub fn new(misalignment: [f64; 6], scale: [f64; 3], bias: [f64; 3]) -> Self {
        let [mis_yz, mis_zy, mis_zx, mis_xz, mis_xy, mis_yx] = misalignment;
        let [s_x, s_y, s_z] = scale;
        let [b_x, b_y, b_z] = bias;

        let mut triad = Self {
            mis_yz,
            mis_zy,
            mis_zx,
            mis_xz,
            mis_xy,
            mis_yx,
            s_x,
            s_y,
            s_z,
            b_x,
            b_y,
            b_z,
            mis_mat: Matrix3::identity(),
            scale_mat: Matrix3::identity(),
            bias_vec: Vector3::zeros(),
            ms_mat: Matrix3::identity(),
        };
        triad.rebuild_matrices();
        triad
    }

    /// Recompute the derived matrices from the scalar coefficients
    fn rebuild_matrices(&mut self) {
        self.mis_mat = Matrix3::new(
            1.0,
            -self.mis_yz,
            self.mis_zy,
            self.mis_xz,
            1.0,
            -self.mis_zx,
            -self.mis_xy,
            self.mis_yx,
            1.0,
        );
        self.scale_mat = Matrix3::from_diagonal(&Vector3::new(self.s_x, self.s_y, self.s_z));
        self.bias_vec = Vector3::new(self.b_x, self.b_y, self.b_z);
        self.ms_mat = self.mis_mat * self.scale_mat;
    }

    /// Misalignment coefficient `mis_yz`
    pub fn mis_yz(&self) -> f64 {
        self.mis_yz
    }

    /// Misalignment coefficient `mis_zy`
    pub fn mis_zy(&self) -> f64 {
        self.mis_zy
    }

    /// Misalignment coefficient `mis_zx`
    pub fn mis_zx(&self) -> f64 {
        self.mis_zx
    }

    /// Misalignment coefficient `mis_xz`
    pub fn mis_xz(&self) -> f64 {
        self.mis_xz
    }

    /// Misalignment coefficient `mis_xy`
    pub fn mis_xy(&self) -> f64 {
        self.mis_xy
    }

    /// Misalignment coefficient `mis_yx`
    pub fn mis_yx(&self) -> f64 {
        self.mis_yx
    }

    /// Scale of the x axis
    pub fn scale_x(&self) -> f64 {
        self.s_x
    }

    /// Scale of the y axis
    pub fn scale_y(&self) -> f64 {
        self.s_y
    }

    /// Scale of the z axis
    pub fn scale_z(&self) -> f64 {
        self.s_z
    }

    /// Bias of the x axis
    pub fn bias_x(&self) -> f64 {
        self.b_x
    }

    /// Bias of the y axis
    pub fn bias_y(&self) -> f64 {
        self.b_y
    }

    /// Bias of the z axis
    pub fn bias_z(&self) -> f64 {
        self.b_z
    }

    /// The misalignment matrix `T`
    pub fn misalignment_matrix(&self) -> Matrix3<f64> {
        self.mis_mat
    }

    /// The diagonal scale matrix `K`
    pub fn scale_matrix(&self) -> Matrix3<f64> {
        self.scale_mat
    }

    /// The bias vector `B`
    pub fn bias(&self) -> Vector3<f64> {
        self.bias_vec
    }

    /// The composed correction matrix `M = T * K`
    pub fn combined_matrix(&self) -> Matrix3<f64> {
        self.ms_mat
    }

    /// Replace the per-axis scales and recompute the derived matrices
    pub fn set_scale(&mut self, scale: Vector3<f64>) {
        self.s_x = scale.x;
        self.s_y = scale.y;
        self.s_z = scale.z;
        self.rebuild_matrices();
    }

    /// Replace the bias vector and recompute the derived matrices
    pub fn set_bias(&mut self, bias: Vector3<f64>) {
        self.b_x = bias.x;
        self.b_y = bias.y;
        self.b_z = bias.z;
        self.rebuild_matrices();
    }

    /// Apply misalignment and scale only: `M * raw`
    pub fn normalize(&self, raw: Vector3<f64>) -> Vector3<f64> {
        self.ms_mat * raw
    }

    /// Remove the bias only: `raw - B`
    ///
    /// One-shot: applying it twice subtracts the bias twice.
    pub fn unbias(&self, raw: Vector3<f64>) -> Vector3<f64> {
        raw - self.bias_vec
    }

    /// Full calibration: `M * (raw - B)`
    pub fn unbias_normalize(&self, raw: Vector3<f64>) -> Vector3<f64> {
        self.ms_mat * (raw - self.bias_vec)
    }

    /// [`normalize`](Self::normalize) applied to a sample's payload
    ///
    /// The timestamp and interval id carry over unchanged.
    pub fn normalize_sample(&self, sample: &TriadSample) -> TriadSample {
        sample.with_data(self.normalize(sample.data()))
    }

    /// [`unbias`](Self::unbias) applied to a sample's payload
    ///
    /// The timestamp and interval id carry over unchanged.
    pub fn unbias_sample(&self, sample: &TriadSample) -> TriadSample {
        sample.with_data(self.unbias(sample.data()))
    }

    /// [`unbias_normalize`](Self::unbias_normalize) applied to a sample's payload
    ///
    /// The timestamp and interval id carry over unchanged.
    pub fn unbias_normalize_sample(&self, sample: &TriadSample) -> TriadSample {
        sample.with_data(self.unbias_normalize(sample.data()))
    }

    /// Read a triad from a calibration file
    ///
    /// The file holds 21 whitespace-separated scalars in fixed order: the
    /// 3x3 misalignment matrix row-major, the 3x3 scale matrix row-major,
    /// and the 3x1 bias vector. Scalars are read by count, so line breaks
    /// and blank lines between blocks are cosmetic. The misalignment block
    /// is assumed to carry a unit diagonal and the scale block to be
    /// diagonal, matching what [`save`](Self::save) writes.
    ///
    /// Fails without constructing anything if the file cannot be read,
    /// holds fewer than 21 scalars, or holds a token that is not a float.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut values = [0.0f64; FILE_SCALARS];
        let mut found = 0;
        for token in contents.split_whitespace().take(FILE_SCALARS) {
            values[found] = token
                .parse()
                .map_err(|_| CalibrationError::MalformedScalar {
                    path: path.to_path_buf(),
                    token: token.to_string(),
                })?;
            found += 1;
        }
        if found < FILE_SCALARS {
            return Err(CalibrationError::TruncatedFile {
                path: path.to_path_buf(),
                expected: FILE_SCALARS,
                found,
            });
        }

        let misalignment = [
            -values[1], // mis_yz from -T(0,1)
            values[2],  // mis_zy from T(0,2)
            -values[5], // mis_zx from -T(1,2)
            values[3],  // mis_xz from T(1,0)
            -values[6], // mis_xy from -T(2,0)
            values[7],  // mis_yx from T(2,1)
        ];
        let scale = [values[9], values[13], values[17]];
        let bias = [values[18], values[19], values[20]];

        Ok(Self::new(misalignment, scale, bias))
    }

    /// Write the triad to a calibration file
    ///
    /// Writes the misalignment matrix, the scale matrix, and the bias
    /// vector in that order, one matrix row (or bias component) per line,
    /// each block followed by a blank line. Floats use the shortest
    /// representation that parses back to the same value, so
    /// `load(save(t)) == t` exactly.
    ///
    /// # Example
    /// ```
    /// use imu_calib::CalibratedTriad;
    ///
    /// let triad = CalibratedTriad::new(
    ///     [0.01, -0.02, 0.003, 0.0, 0.0, 0.0],
    ///     [1.02, 0.98, 1.0],
    ///     [0.2, -0.1, 0.05],
    /// );
    ///
    /// let path = std::env::temp_dir().join("imu_calib_doc.calib");
    /// triad.save(&path).unwrap();
    /// assert_eq!(CalibratedTriad::load(&path).unwrap(), triad);
    /// ```
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut out = String::new();

        for matrix in [&self.mis_mat, &self.scale_mat] {
            for row in 0..3 {
                out.push_str(&format!(
                    "{} {} {}\n",
                    matrix[(row, 0)],
                    matrix[(row, 1)],
                    matrix[(row, 2)]
                ));
            }
            out.push('\n');
        }
        for component in self.bias_vec.iter() {
            out.push_str(&format!("{component}\n"));
        }
        out.push('\n');

        fs::write(path, out).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for CalibratedTriad {
    fn default() -> Self {
        Self::new([0.0; 6], [1.0; 3], [0.0; 3])
    }
}

impl fmt::Display for CalibratedTriad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Misalignment Matrix")?;
        for row in 0..3 {
            writeln!(
                f,
                "{:12.6} {:12.6} {:12.6}",
                self.mis_mat[(row, 0)],
                self.mis_mat[(row, 1)],
                self.mis_mat[(row, 2)]
            )?;
        }
        writeln!(f, "Scale Matrix")?;
        for row in 0..3 {
            writeln!(
                f,
                "{:12.6} {:12.6} {:12.6}",
                self.scale_mat[(row, 0)],
                self.scale_mat[(row, 1)],
                self.scale_mat[(row, 2)]
            )?;
        }
        writeln!(f, "Bias Vector")?;
        for component in self.bias_vec.iter() {
            writeln!(f, "{component:12.6}")?;
        }
        Ok(())
    }
}
