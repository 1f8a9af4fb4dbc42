//! Damped least squares
//!
//! Gantree: L2_Readout → Levenberg
//!
//! Levenberg–Marquardt over `nalgebra` dense matrices with a forward-difference
//! Jacobian. Damping is scaled per parameter by the largest column norm seen
//! so far, so a component whose amplitude collapses keeps its earlier scale
//! and stops wandering. Stops on the first of: small relative cost reduction
//! (actual and predicted), small scaled step, or a gradient orthogonal to
//! every Jacobian column.

use nalgebra::{Cholesky, DMatrix, DVector};
use qro_core::{fit, QroError, QroResult};
use serde::{Deserialize, Serialize};

/// Dense covariance matrix
pub type Matrix = DMatrix<f64>;

// ============================================================================
// Options
// ============================================================================

/// Solver tolerances
/// Gantree: LmOptions // 옵션
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmOptions {
    /// Maximum outer iterations
    pub max_iterations: usize,
    /// Relative cost reduction treated as converged
    pub ftol: f64,
    /// Relative step size treated as converged
    pub xtol: f64,
    /// Scaled gradient cosine treated as converged
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: fit::MAX_ITERATIONS,
            ftol: fit::FTOL,
            xtol: fit::XTOL,
            gtol: fit::GTOL,
        }
    }
}

/// Converged solution
/// Gantree: LeastSquaresFit // 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquaresFit {
    /// Best-fit parameters
    pub params: Vec<f64>,
    /// `s²·(JᵀJ)⁻¹`, infinite when `JᵀJ` is singular
    pub covariance: Matrix,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Iterations used
    pub iterations: usize,
}

// ============================================================================
// Solver
// ============================================================================

/// Fit `model(x, params)` to `(x, y)` starting from `p0`
/// Gantree: levenberg_marquardt(model,x,y,p0,opts) -> Result<LeastSquaresFit> // LM
pub fn levenberg_marquardt<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    options: &LmOptions,
) -> QroResult<LeastSquaresFit>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len().min(y.len());
    let m = p0.len();
    if n <= m {
        return Err(QroError::InsufficientData {
            needed: m + 1,
            got: n,
        });
    }
    if p0.iter().any(|p| !p.is_finite()) {
        return Err(QroError::NonFiniteFit);
    }
    let (x, y) = (&x[..n], &y[..n]);

    // r = y − f(x)
    let residuals = |p: &DVector<f64>| -> DVector<f64> {
        DVector::from_iterator(
            n,
            x.iter()
                .zip(y)
                .map(|(&xi, &yi)| yi - model(xi, p.as_slice())),
        )
    };

    let mut params = DVector::from_column_slice(p0);
    let mut r = residuals(&params);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(QroError::NonFiniteFit);
    }

    let mut scale = DVector::<f64>::zeros(m);
    let mut lambda = fit::INITIAL_LAMBDA;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let jac = jacobian(&model, x, &params);
        let jtj = jac.tr_mul(&jac);
        let gradient = jac.tr_mul(&r);

        for k in 0..m {
            scale[k] = scale[k].max(jac.column(k).norm());
        }
        let d2 = damping_scale(&scale);

        if cost == 0.0 || gradient_cosine(&gradient, &d2, cost) <= options.gtol {
            converged = true;
            break;
        }

        let mut stepped = false;
        while lambda <= fit::MAX_LAMBDA {
            let mut damped = jtj.clone();
            for k in 0..m {
                damped[(k, k)] += lambda * d2[k];
            }

            let delta = match solve_damped(damped, &gradient) {
                Some(delta) => delta,
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let trial = &params + &delta;
            let trial_r = residuals(&trial);
            let trial_cost = trial_r.norm_squared();

            // ‖r‖² − ‖r − Jδ‖² under the damped normal equations
            let predicted = delta.dot(&gradient) + lambda * delta.component_mul(&delta).dot(&d2);
            let actual = cost - trial_cost;

            if trial_cost.is_finite() && predicted > 0.0 && actual > fit::MIN_GAIN_RATIO * predicted
            {
                let step = scaled_norm(&delta, &d2);
                let size = scaled_norm(&params, &d2);
                let small_reduction =
                    actual <= options.ftol * cost && predicted <= options.ftol * cost;

                params = trial;
                r = trial_r;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(fit::MIN_LAMBDA);
                stepped = true;

                if small_reduction || step <= options.xtol * (size + options.xtol) {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        // No damped step lowers the cost: at a minimum to working precision
        if !stepped {
            converged = true;
        }
        if converged {
            break;
        }
    }

    if !converged {
        return Err(QroError::FitDidNotConverge { iterations });
    }
    if params.iter().any(|p| !p.is_finite()) {
        return Err(QroError::NonFiniteFit);
    }

    let jac = jacobian(&model, x, &params);
    let covariance = covariance(jac.tr_mul(&jac), cost, n);
    log::trace!("LM converged in {} iterations, ssr={:.4e}", iterations, cost);

    Ok(LeastSquaresFit {
        params: params.as_slice().to_vec(),
        covariance,
        ssr: cost,
        iterations,
    })
}

/// Forward-difference Jacobian of the model, `n × m`
fn jacobian<F>(model: &F, x: &[f64], params: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let base: Vec<f64> = x.iter().map(|&xi| model(xi, params.as_slice())).collect();
    let mut jac = DMatrix::zeros(x.len(), params.len());
    let mut shifted = params.clone();

    for j in 0..params.len() {
        let h = {
            let h = fit::JACOBIAN_STEP * params[j].abs();
            if h == 0.0 {
                fit::JACOBIAN_STEP
            } else {
                h
            }
        };
        shifted[j] = params[j] + h;
        for (i, &xi) in x.iter().enumerate() {
            jac[(i, j)] = (model(xi, shifted.as_slice()) - base[i]) / h;
        }
        shifted[j] = params[j];
    }
    jac
}

/// Squared damping scale per parameter, floored relative to the largest
fn damping_scale(scale: &DVector<f64>) -> DVector<f64> {
    let floor = scale.max() * fit::DAMPING_FLOOR;
    scale.map(|s| {
        let s = s.max(floor);
        if s > 0.0 {
            s * s
        } else {
            1.0
        }
    })
}

/// `max_k |g_k| / (D_k·‖r‖)`
fn gradient_cosine(gradient: &DVector<f64>, d2: &DVector<f64>, cost: f64) -> f64 {
    let rnorm = cost.sqrt();
    gradient
        .iter()
        .zip(d2.iter())
        .map(|(g, d)| g.abs() / (d.sqrt() * rnorm))
        .fold(0.0, f64::max)
}

fn scaled_norm(v: &DVector<f64>, d2: &DVector<f64>) -> f64 {
    v.component_mul(v).dot(d2).sqrt()
}

/// Solve the damped normal equations, Cholesky first then LU
fn solve_damped(damped: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    let delta = match Cholesky::new(damped.clone()) {
        Some(chol) => chol.solve(rhs),
        None => damped.lu().solve(rhs)?,
    };
    delta.iter().all(|d| d.is_finite()).then_some(delta)
}

/// `s²·(JᵀJ)⁻¹` with `s² = ssr / (n − m)`
fn covariance(jtj: DMatrix<f64>, ssr: f64, n: usize) -> Matrix {
    let m = jtj.nrows();
    let s2 = ssr / (n - m) as f64;
    let inverse = match Cholesky::new(jtj.clone()) {
        Some(chol) => Some(chol.inverse()),
        None => jtj.try_inverse(),
    };
    match inverse {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => inv * s2,
        _ => DMatrix::from_element(m, m, f64::INFINITY),
    }
}

// ============================================================================
// Tests
// ============================================================================
