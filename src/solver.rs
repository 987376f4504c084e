//! Damped least-squares refinement for the calibration problems
//!
//! Both calibration fits are small dense problems (a dozen parameters, one
//! residual block per static interval), so a Levenberg-Marquardt loop with
//! forward-difference Jacobians is all the machinery needed. The residual
//! function is a closure, letting the accelerometer and gyroscope problems
//! share the same solver.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::{CalibrationError, Result};

/// Step size for forward-difference Jacobian columns
const JACOBIAN_EPS: f64 = 1e-8;
/// Floor applied to diagonal entries before damping
const DIAGONAL_FLOOR: f64 = 1e-10;

/// Levenberg-Marquardt configuration
///
/// # Example
/// ```
/// use imu_calib::SolverConfig;
///
/// let config = SolverConfig {
///     max_iterations: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Maximum number of iterations before reporting divergence
    pub max_iterations: usize,
    /// Initial damping factor
    pub initial_lambda: f64,
    /// Damping multiplier applied when a step increases the cost
    pub lambda_increase: f64,
    /// Damping multiplier applied when a step decreases the cost
    pub lambda_decrease: f64,
    /// Lower clamp on the damping factor
    pub min_lambda: f64,
    /// Upper bound on the damping factor; exceeding it aborts the solve
    pub max_lambda: f64,
    /// Step-norm threshold below which the solve is converged
    pub convergence_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            initial_lambda: 1e-4,
            lambda_increase: 10.0,
            lambda_decrease: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e8,
            convergence_threshold: 1e-10,
        }
    }
}

/// Outcome summary of a converged solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverReport {
    /// Iterations performed
    pub iterations: usize,
    /// Sum of squared residuals at the initial guess
    pub initial_cost: f64,
    /// Sum of squared residuals at the solution
    pub final_cost: f64,
}

/// Minimize the squared norm of a residual vector over its parameters
///
/// Runs Levenberg-Marquardt from `initial`: each iteration builds the
/// forward-difference Jacobian, damps the Gauss-Newton normal equations,
/// and accepts the step only if the cost decreases. Convergence is a step
/// norm below the configured threshold.
///
/// # Arguments
/// * `initial` - Starting parameter vector
/// * `residuals` - Maps a parameter vector to the residual vector; must
///   return the same length for every input
/// * `config` - Iteration and damping schedule
///
/// # Errors
/// [`CalibrationError::SolverDiverged`] when the iteration budget is
/// exhausted or the damping factor blows up without convergence;
/// [`CalibrationError::NonFiniteSolution`] when the cost or the parameter
/// vector stops being finite.
pub fn solve_least_squares<F>(
    initial: DVector<f64>,
    residuals: F,
    config: &SolverConfig,
) -> Result<(DVector<f64>, SolverReport)>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let num_params = initial.len();
    let mut x = initial;
    let mut lambda = config.initial_lambda;

    let r = residuals(&x);
    let initial_cost = r.norm_squared();
    if !initial_cost.is_finite() {
        return Err(CalibrationError::NonFiniteSolution);
    }
    let mut current_cost = initial_cost;

    for iteration in 1..=config.max_iterations {
        let r = residuals(&x);
        let jacobian = forward_difference_jacobian(&residuals, &x, &r);

        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &r;

        // Damped normal equations: (J^T J + lambda * diag(J^T J)) dx = -J^T r
        let mut damped = jtj.clone();
        for j in 0..num_params {
            damped[(j, j)] += lambda * jtj[(j, j)].max(DIAGONAL_FLOOR);
        }

        let Some(dx) = damped.lu().solve(&(-&jtr)) else {
            lambda *= config.lambda_increase;
            if lambda > config.max_lambda {
                return Err(CalibrationError::SolverDiverged {
                    iterations: iteration,
                    final_cost: current_cost,
                });
            }
            continue;
        };

        // An (almost) zero step means the gradient is exhausted at the
        // current damping; the solve is converged whether or not one more
        // step would be accepted.
        if dx.norm() < config.convergence_threshold {
            debug!(
                "solver converged after {iteration} iterations, cost {initial_cost:.6e} -> {current_cost:.6e}"
            );
            return Ok((
                x,
                SolverReport {
                    iterations: iteration,
                    initial_cost,
                    final_cost: current_cost,
                },
            ));
        }

        let x_new = &x + &dx;
        let new_cost = residuals(&x_new).norm_squared();
        if !new_cost.is_finite() || x_new.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFiniteSolution);
        }

        if new_cost < current_cost {
            x = x_new;
            current_cost = new_cost;
            lambda = (lambda * config.lambda_decrease).max(config.min_lambda);
        } else {
            lambda *= config.lambda_increase;
            if lambda > config.max_lambda {
                return Err(CalibrationError::SolverDiverged {
                    iterations: iteration,
                    final_cost: current_cost,
                });
            }
        }
    }

    Err(CalibrationError::SolverDiverged {
        iterations: config.max_iterations,
        final_cost: current_cost,
    })
}

/// Forward-difference Jacobian of the residual function at `x`
fn forward_difference_jacobian<F>(
    residuals: &F,
    x: &DVector<f64>,
    r0: &DVector<f64>,
) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jacobian = DMatrix::zeros(r0.len(), x.len());

    for col in 0..x.len() {
        let mut x_plus = x.clone();
        x_plus[col] += JACOBIAN_EPS;
        let r_plus = residuals(&x_plus);

        for row in 0..r0.len() {
            jacobian[(row, col)] = (r_plus[row] - r0[row]) / JACOBIAN_EPS;
        }
    }

    jacobian
}
