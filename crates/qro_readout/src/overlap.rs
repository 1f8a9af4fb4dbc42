//! Gaussian-overlap fidelity
//!
//! Gantree: L2_Readout → Overlap
//!
//! `1 − ∫ min(N(b_g, c_g), N(b_e, c_e))` over a ±5σ window, integrated with
//! adaptive Simpson quadrature.

use qro_core::{fit, QroError, QroResult};
use statrs::distribution::{Continuous, Normal};

/// Adaptive Simpson integral of `f` over `[a, b]`
/// Gantree: adaptive_simpson(f,a,b,tol,depth) -> f64 // 적응 심프슨
pub fn adaptive_simpson<F>(f: &F, a: f64, b: f64, tol: f64, max_depth: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    if b <= a {
        return 0.0;
    }
    let fa = f(a);
    let fb = f(b);
    let m = 0.5 * (a + b);
    let fm = f(m);
    let whole = simpson(a, b, fa, fm, fb);
    refine(f, a, b, fa, fm, fb, whole, tol, max_depth)
}

#[inline]
fn simpson(a: f64, b: f64, fa: f64, fm: f64, fb: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn refine<F>(
    f: &F,
    a: f64,
    b: f64,
    fa: f64,
    fm: f64,
    fb: f64,
    whole: f64,
    tol: f64,
    depth: usize,
) -> f64
where
    F: Fn(f64) -> f64,
{
    let m = 0.5 * (a + b);
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = f(lm);
    let frm = f(rm);
    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;

    if depth == 0 || delta.abs() <= 15.0 * tol {
        return left + right + delta / 15.0;
    }
    refine(f, a, m, fa, flm, fm, left, tol / 2.0, depth - 1)
        + refine(f, m, b, fm, frm, fb, right, tol / 2.0, depth - 1)
}

/// Shared area under two normalized Gaussians
/// Gantree: overlap_area(b1,c1,b2,c2) -> Result<f64> // 중첩 면적
pub fn overlap_area(b1: f64, c1: f64, b2: f64, c2: f64) -> QroResult<f64> {
    if !(c1 > 0.0 && c2 > 0.0) || !c1.is_finite() || !c2.is_finite() {
        return Err(QroError::NonFiniteFit);
    }
    if !b1.is_finite() || !b2.is_finite() {
        return Err(QroError::NonFiniteFit);
    }

    let k = fit::OVERLAP_WINDOW_SIGMAS;
    let lo = (b1 - k * c1).min(b2 - k * c2);
    let hi = (b1 + k * c1).max(b2 + k * c2);
    let g1 = Normal::new(b1, c1).map_err(|_| QroError::NonFiniteFit)?;
    let g2 = Normal::new(b2, c2).map_err(|_| QroError::NonFiniteFit)?;
    let min_pdf = |x: f64| g1.pdf(x).min(g2.pdf(x));

    // Split at both means so the kink and peaks sit on panel boundaries
    let mut cuts = vec![lo, b1.min(b2), b1.max(b2), hi];
    cuts.dedup();
    let area = cuts
        .windows(2)
        .map(|w| {
            adaptive_simpson(
                &min_pdf,
                w[0],
                w[1],
                fit::QUADRATURE_TOL,
                fit::QUADRATURE_MAX_DEPTH,
            )
        })
        .sum();
    Ok(area)
}

/// `1 − overlap_area`
/// Gantree: overlap_fidelity(b1,c1,b2,c2) -> Result<f64> // 중첩 충실도
pub fn overlap_fidelity(b1: f64, c1: f64, b2: f64, c2: f64) -> QroResult<f64> {
    Ok(1.0 - overlap_area(b1, c1, b2, c2)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // 1 − 2Φ(−1)
    const ONE_SIGMA_MASS: f64 = 0.682_689_492_137_085_9;

    #[test]
    fn test_pdf_normalized() {
        let g = Normal::new(1.0, 0.3).unwrap();
        let area = adaptive_simpson(&|x| g.pdf(x), -5.0, 7.0, 1e-12, 50);
        assert_relative_eq!(area, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_simpson_polynomial_exact() {
        let area = adaptive_simpson(&|x: f64| x * x * x - x, 0.0, 2.0, 1e-12, 10);
        assert_relative_eq!(area, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unit_gaussians_two_apart() {
        let fid = overlap_fidelity(0.0, 1.0, 2.0, 1.0).unwrap();
        assert_relative_eq!(fid, ONE_SIGMA_MASS, epsilon = 1e-6);
    }

    #[test]
    fn test_identical_gaussians() {
        let fid = overlap_fidelity(3.0, 0.5, 3.0, 0.5).unwrap();
        assert_relative_eq!(fid, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_far_apart() {
        let fid = overlap_fidelity(0.0, 1.0, 50.0, 1.0).unwrap();
        assert_relative_eq!(fid, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_symmetric_in_arguments() {
        let a = overlap_fidelity(0.0, 1.0, 1.5, 0.6).unwrap();
        let b = overlap_fidelity(1.5, 0.6, 0.0, 1.0).unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_width_rejected() {
        assert_eq!(
            overlap_fidelity(0.0, 0.0, 1.0, 1.0).unwrap_err(),
            QroError::NonFiniteFit
        );
    }
}
