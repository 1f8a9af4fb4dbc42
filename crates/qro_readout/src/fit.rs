//! Mixture fit engine
//!
//! Gantree: L2_Readout → MixtureFit
//!
//! Single- and double-Gaussian models fitted to per-state histograms with
//! seeds taken from the data. A double fit that fails is retried as a single
//! Gaussian, since only the dominant component feeds the overlap. A fit that
//! still fails is reported per state and never aborts the analysis.

use crate::histogram::StateHistograms;
use crate::levenberg::{levenberg_marquardt, LmOptions, Matrix};
use qro_core::{fit, QroError, QroResult, StateRole};
use serde::{Deserialize, Serialize};

// ============================================================================
// Models
// ============================================================================

/// `a·exp(−(x−b)²/(2c²)) + d`
/// Gantree: gaussian(x,a,b,c,d) -> f64 // 단일 모델
#[inline]
pub fn gaussian(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    a * (-(x - b).powi(2) / (2.0 * c * c)).exp() + d
}

/// Sum of two offset-free Gaussians
/// Gantree: double_gaussian(x,a1,b1,c1,a2,b2,c2) -> f64 // 이중 모델
#[inline]
pub fn double_gaussian(x: f64, a1: f64, b1: f64, c1: f64, a2: f64, b2: f64, c2: f64) -> f64 {
    gaussian(x, a1, b1, c1, 0.0) + gaussian(x, a2, b2, c2, 0.0)
}

/// Model family
/// Gantree: MixtureModel // Single | Double
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixtureModel {
    /// `[a, b, c, d]`
    Single,
    /// `[a1, b1, c1, a2, b2, c2]`
    Double,
}

impl MixtureModel {
    /// Parameter count
    pub fn num_params(&self) -> usize {
        match self {
            MixtureModel::Single => 4,
            MixtureModel::Double => 6,
        }
    }

    /// Evaluate at `x`
    pub fn evaluate(&self, x: f64, p: &[f64]) -> f64 {
        match self {
            MixtureModel::Single => gaussian(x, p[0], p[1], p[2], p[3]),
            MixtureModel::Double => double_gaussian(x, p[0], p[1], p[2], p[3], p[4], p[5]),
        }
    }
}

// ============================================================================
// Result
// ============================================================================

/// Fitted parameters and covariance for one state
/// Gantree: MixtureFitResult // 피팅 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureFitResult {
    /// Model fitted
    pub model: MixtureModel,
    /// Parameter vector
    pub params: Vec<f64>,
    /// Covariance estimate
    pub covariance: Matrix,
    /// Solver iterations
    pub iterations: usize,
}

impl MixtureFitResult {
    /// `(mean, |width|)` of the larger-amplitude component
    /// Gantree: dominant() -> (b,c) // 주 피크
    pub fn dominant(&self) -> (f64, f64) {
        let p = &self.params;
        match self.model {
            MixtureModel::Single => (p[1], p[2].abs()),
            MixtureModel::Double => {
                if p[0] > p[3] {
                    (p[1], p[2].abs())
                } else {
                    (p[4], p[5].abs())
                }
            }
        }
    }

    /// One-sigma parameter uncertainties
    pub fn std_errors(&self) -> Vec<f64> {
        self.covariance
            .diagonal()
            .iter()
            .map(|v| v.abs().sqrt())
            .collect()
    }

    /// Model value at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        self.model.evaluate(x, &self.params)
    }
}

// ============================================================================
// Seeds
// ============================================================================

/// Peak statistics used to seed both ground and excited fits
/// Gantree: FitSeeds // 초기값 재료
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSeeds {
    /// Bin centre at the ground peak
    pub peak_ground: f64,
    /// Bin centre at the excited peak
    pub peak_excited: f64,
    /// Ground peak count
    pub max_ground: f64,
    /// Excited peak count
    pub max_excited: f64,
    /// Shared width seed
    pub sigma: f64,
}

impl FitSeeds {
    /// Derive seeds from ground and excited counts over shared centres
    /// Gantree: from_counts(centers,g,e,range) -> Option<Self> // 시드 계산
    pub fn from_counts(
        centers: &[f64],
        ground: &[f64],
        excited: &[f64],
        range_width: f64,
    ) -> Option<Self> {
        let ig = crate::threshold::argmax_first(ground)?;
        let ie = crate::threshold::argmax_first(excited)?;
        let peak_ground = *centers.get(ig)?;
        let peak_excited = *centers.get(ie)?;
        Some(Self {
            peak_ground,
            peak_excited,
            max_ground: ground[ig],
            max_excited: excited[ie],
            sigma: seed_width(peak_ground, peak_excited, range_width),
        })
    }

    /// Initial guess for `role` under `model`
    /// Gantree: guess(model,role) -> Vec<f64> // 초기 추정
    pub fn guess(&self, model: MixtureModel, role: StateRole) -> Vec<f64> {
        let (max, peak, other_peak, leakage) = match role {
            StateRole::Ground => (
                self.max_ground,
                self.peak_ground,
                self.peak_excited,
                fit::GROUND_LEAKAGE_SEED,
            ),
            _ => (
                self.max_excited,
                self.peak_excited,
                self.peak_ground,
                fit::EXCITED_LEAKAGE_SEED,
            ),
        };
        match model {
            MixtureModel::Single => vec![max, peak, self.sigma, 0.0],
            MixtureModel::Double => vec![
                max,
                peak,
                self.sigma,
                leakage * max,
                other_peak,
                self.sigma,
            ],
        }
    }
}

/// `|peak_g − peak_e| / 5`, or `range / 20` when that is below 1e-3
pub fn seed_width(peak_ground: f64, peak_excited: f64, range_width: f64) -> f64 {
    let sigma = (peak_excited - peak_ground).abs() / fit::SEED_WIDTH_DIVISOR;
    if sigma < fit::MIN_SEED_WIDTH {
        range_width / fit::SEED_RANGE_DIVISOR
    } else {
        sigma
    }
}

// ============================================================================
// Fitting
// ============================================================================

/// Fit one histogram
/// Gantree: fit_state_histogram(centers,counts,model,guess) -> Result<MixtureFitResult> // 피팅
pub fn fit_state_histogram(
    bin_centers: &[f64],
    counts: &[f64],
    model: MixtureModel,
    initial_guess: &[f64],
) -> QroResult<MixtureFitResult> {
    if initial_guess.len() != model.num_params() {
        return Err(QroError::InvalidConfig(format!(
            "{:?} model needs {} parameters, got {}",
            model,
            model.num_params(),
            initial_guess.len()
        )));
    }

    let solution = levenberg_marquardt(
        |x, p| model.evaluate(x, p),
        bin_centers,
        counts,
        initial_guess,
        &LmOptions::default(),
    )?;

    Ok(MixtureFitResult {
        model,
        params: solution.params,
        covariance: solution.covariance,
        iterations: solution.iterations,
    })
}

/// Ground and excited fits; `None` where the fit failed
/// Gantree: StateFits // g/e 피팅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFits {
    /// Model requested for both states; a fit may fall back to `Single`
    pub model: MixtureModel,
    /// Seeds used
    pub seeds: FitSeeds,
    /// Ground fit
    pub ground: Option<MixtureFitResult>,
    /// Excited fit
    pub excited: Option<MixtureFitResult>,
}

impl StateFits {
    /// Both fits succeeded
    pub fn both(&self) -> Option<(&MixtureFitResult, &MixtureFitResult)> {
        Some((self.ground.as_ref()?, self.excited.as_ref()?))
    }
}

/// Fit the ground and excited categories with data-derived seeds
///
/// Returns `None` when either category is absent or empty.
///
/// Gantree: fit_ground_excited(hists,model) -> Option<StateFits> // g/e 피팅
pub fn fit_ground_excited(hists: &StateHistograms, model: MixtureModel) -> Option<StateFits> {
    let ground = hists.category_counts(StateRole::Ground)?;
    let excited = hists.category_counts(StateRole::Excited)?;
    let centers = hists.bin_centers();
    let edges = hists.edges();
    let range_width = edges.last()? - edges.first()?;
    let seeds = FitSeeds::from_counts(&centers, ground, excited, range_width)?;

    let run = |role: StateRole, counts: &[f64]| {
        let fitted = fit_state_histogram(&centers, counts, model, &seeds.guess(model, role))
            .or_else(|err| match model {
                MixtureModel::Double => {
                    log::debug!("{} double fit failed ({}), retrying single", role, err);
                    let single = MixtureModel::Single;
                    fit_state_histogram(&centers, counts, single, &seeds.guess(single, role))
                }
                MixtureModel::Single => Err(err),
            });
        match fitted {
            Ok(result) => Some(result),
            Err(err) => {
                log::warn!("{} fit failed ({:?} model): {}", role, model, err);
                None
            }
        }
    };

    Some(StateFits {
        model,
        seeds,
        ground: run(StateRole::Ground, ground),
        excited: run(StateRole::Excited, excited),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qro_core::readout;

    fn sampled(model: MixtureModel, params: &[f64], lo: f64, hi: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let x = readout::linspace(lo, hi, n);
        let y = x.iter().map(|&xi| model.evaluate(xi, params)).collect();
        (x, y)
    }

    #[test]
    fn test_models() {
        assert_relative_eq!(gaussian(1.0, 2.0, 1.0, 0.5, 0.3), 2.3);
        assert_relative_eq!(
            double_gaussian(0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 2.0),
            2.0
        );
        assert_eq!(MixtureModel::Double.num_params(), 6);
    }

    #[test]
    fn test_seed_width_floor() {
        assert_relative_eq!(seed_width(0.0, 5.0, 10.0), 1.0);
        // Coincident peaks fall back to range / 20
        assert_relative_eq!(seed_width(2.0, 2.0, 10.0), 0.5);
    }

    #[test]
    fn test_guesses() {
        let seeds = FitSeeds {
            peak_ground: 0.0,
            peak_excited: 5.0,
            max_ground: 100.0,
            max_excited: 80.0,
            sigma: 1.0,
        };
        assert_eq!(
            seeds.guess(MixtureModel::Single, StateRole::Ground),
            vec![100.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(
            seeds.guess(MixtureModel::Double, StateRole::Ground),
            vec![100.0, 0.0, 1.0, 10.0, 5.0, 1.0]
        );
        assert_eq!(
            seeds.guess(MixtureModel::Double, StateRole::Excited),
            vec![80.0, 5.0, 1.0, 16.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_single_fit_recovers_parameters() {
        let truth = [50.0, 1.2, 0.7, 2.0];
        let (x, y) = sampled(MixtureModel::Single, &truth, -3.0, 5.0, 120);
        let fit = fit_state_histogram(&x, &y, MixtureModel::Single, &[40.0, 1.0, 1.0, 0.0]).unwrap();

        for (p, t) in fit.params.iter().zip(truth) {
            assert_relative_eq!(p.abs(), t, epsilon = 1e-4);
        }
        let (mean, width) = fit.dominant();
        assert_relative_eq!(mean, 1.2, epsilon = 1e-4);
        assert_relative_eq!(width, 0.7, epsilon = 1e-4);
    }

    #[test]
    fn test_double_fit_recovers_parameters() {
        let truth = [100.0, 0.0, 1.0, 12.0, 5.0, 1.0];
        let (x, y) = sampled(MixtureModel::Double, &truth, -4.0, 9.0, 200);
        let guess = [100.0, 0.2, 1.0, 10.0, 4.8, 1.0];
        let fit = fit_state_histogram(&x, &y, MixtureModel::Double, &guess).unwrap();

        assert_relative_eq!(fit.params[0], 100.0, epsilon = 1e-3);
        assert_relative_eq!(fit.params[1], 0.0, epsilon = 1e-4);
        assert_relative_eq!(fit.params[2].abs(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(fit.params[3], 12.0, epsilon = 1e-3);
        assert_relative_eq!(fit.params[4], 5.0, epsilon = 1e-3);
        assert_eq!(fit.std_errors().len(), 6);
    }

    #[test]
    fn test_dominant_picks_larger_amplitude() {
        let fit = MixtureFitResult {
            model: MixtureModel::Double,
            params: vec![10.0, 0.0, 1.0, 40.0, 3.0, -0.5],
            covariance: Matrix::zeros(6, 6),
            iterations: 1,
        };
        assert_eq!(fit.dominant(), (3.0, 0.5));
    }

    #[test]
    fn test_ground_fit_without_secondary_population() {
        use crate::rotation::{project, ProjectionMode};
        use qro_core::{StateLabel, StateSample};
        use statrs::distribution::{ContinuousCDF, Normal};

        // Clean clouds 5σ apart: no leakage for the second component to fit
        let cloud = |label: StateLabel, mean: f64| {
            let dist = Normal::new(mean, 1.0).unwrap();
            let i: Vec<f64> = (0..5000)
                .map(|k| dist.inverse_cdf((k as f64 + 0.5) / 5000.0))
                .collect();
            StateSample::new(label, i, vec![0.0; 5000]).unwrap()
        };
        let states = vec![
            cloud(StateLabel::ground(), 0.0),
            cloud(StateLabel::excited(), 5.0),
        ];
        let rot = project(&states, ProjectionMode::RotatedPhase { angle_deg: Some(0.0) });
        let hists = StateHistograms::build(&rot, 100);

        let fits = fit_ground_excited(&hists, MixtureModel::Double).unwrap();
        let (g, e) = fits.both().unwrap();
        let (gm, gw) = g.dominant();
        let (em, ew) = e.dominant();
        assert_relative_eq!(gm, 0.0, epsilon = 0.05);
        assert_relative_eq!(em, 5.0, epsilon = 0.05);
        assert_relative_eq!(gw, 1.0, epsilon = 0.05);
        assert_relative_eq!(ew, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_wrong_guess_length() {
        let err = fit_state_histogram(&[0.0; 10], &[0.0; 10], MixtureModel::Single, &[1.0])
            .unwrap_err();
        assert!(matches!(err, QroError::InvalidConfig(_)));
    }

    #[test]
    fn test_too_few_bins_is_reported_not_raised() {
        let err = fit_state_histogram(&[0.0, 1.0], &[1.0, 2.0], MixtureModel::Single, &[1.0, 0.0, 1.0, 0.0])
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
