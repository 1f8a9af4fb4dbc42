//! Readout analyzer
//!
//! Gantree: L2_Readout → ReadoutAnalyzer
//!
//! Runs rotation, histogramming, optional mixture fits and the threshold
//! solver over one set of state samples and returns an owned
//! [`ClassificationResult`].

use crate::config::{FitMode, ReadoutConfig};
use crate::fit::{fit_ground_excited, MixtureModel, StateFits};
use crate::histogram::StateHistograms;
use crate::overlap::overlap_fidelity;
use crate::rotation::{project, ProjectionMode, RotatedState};
use crate::threshold::{solve, ConfusionMatrix, Threshold};
use qro_core::{
    readout, QroError, QroResult, RawShots, RotationAngle, StateRole, StateSample,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Estimator behind the reported fidelity
/// Gantree: FidelityEstimator // Threshold | GaussianOverlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FidelityEstimator {
    /// Threshold contrast or averaged policy
    Threshold,
    /// `1 − overlap` of the dominant fitted peaks
    GaussianOverlap,
}

/// Classification result
/// Gantree: ClassificationResult // 분류 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Reported fidelity
    pub fidelity: f64,

    /// Estimator that produced `fidelity`
    pub estimator: FidelityEstimator,

    /// Threshold fidelity, always computed
    pub threshold_fidelity: f64,

    /// Thresholds between adjacent categories (ADC units)
    pub thresholds: Vec<Threshold>,

    /// Ground-vs-excited threshold
    pub ground_excited: Threshold,

    /// Confusion matrix
    pub confusion: ConfusionMatrix,

    /// Rotation angle (radians)
    pub angle: RotationAngle,

    /// Projection used
    pub projection: ProjectionMode,

    /// Per-category histograms over the shared edges
    pub histograms: StateHistograms,

    /// Rotated scatter per input state
    pub rotated: Vec<RotatedState>,

    /// Raw shots aggregated by category
    pub data: RawShots,

    /// Mixture fits, when requested
    pub fits: Option<StateFits>,
}

impl ClassificationResult {
    /// Rotation angle in degrees
    pub fn angle_deg(&self) -> f64 {
        readout::rad_to_deg(self.angle)
    }

    /// Threshold values in ADC units, axis order
    pub fn threshold_values(&self) -> Vec<f64> {
        self.thresholds.iter().map(|t| t.value).collect()
    }

    /// Number of categories
    pub fn num_categories(&self) -> usize {
        self.confusion.size()
    }

    /// Whether a second excited category was analyzed
    pub fn is_three_state(&self) -> bool {
        self.confusion.roles().contains(&StateRole::Other)
    }

    /// Fidelity in percent
    pub fn fidelity_percent(&self) -> f64 {
        100.0 * self.fidelity
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> QroResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> QroResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Theta: {:.2} deg", self.angle_deg())?;
        writeln!(
            f,
            "Fidelity: {:.3}% ({:?})",
            self.fidelity_percent(),
            self.estimator
        )?;
        writeln!(f, "Thresholds: {:?}", self.threshold_values())?;
        write!(f, "Fidelity Matrix (%):\n{}", self.confusion)
    }
}

/// Single-shot readout analyzer
/// Gantree: ReadoutAnalyzer // 분석기
#[derive(Debug, Clone, Default)]
pub struct ReadoutAnalyzer {
    config: ReadoutConfig,
}

impl ReadoutAnalyzer {
    /// Create analyzer
    /// Gantree: new(config) -> Self // 생성자
    pub fn new(config: ReadoutConfig) -> Self {
        Self { config }
    }

    /// Configuration
    pub fn config(&self) -> &ReadoutConfig {
        &self.config
    }

    /// Analyze the raw-shots contract
    /// Gantree: analyze_raw(shots) -> Result<ClassificationResult> // 원시 분석
    pub fn analyze_raw(&self, shots: &RawShots) -> QroResult<ClassificationResult> {
        self.analyze(&shots.to_states()?)
    }

    /// Analyze role-tagged samples
    /// Gantree: analyze(states) -> Result<ClassificationResult> // 분석
    pub fn analyze(&self, states: &[StateSample]) -> QroResult<ClassificationResult> {
        self.config.validate().map_err(QroError::InvalidConfig)?;
        for role in [StateRole::Ground, StateRole::Excited] {
            if !states.iter().any(|s| s.role() == role) {
                return Err(QroError::MissingRole(role.to_string()));
            }
        }

        // 1. Rotation
        let rotation = project(states, self.config.projection);

        // 2. Histograms
        let histograms = StateHistograms::build(&rotation, self.config.effective_bins());

        // 3. Fits
        let fits = match self.config.fit {
            FitMode::Off => None,
            FitMode::Single => fit_ground_excited(&histograms, MixtureModel::Single),
            FitMode::DoubleOverlap => fit_ground_excited(&histograms, MixtureModel::Double),
        };

        // 4. Thresholds
        let solution = solve(&histograms, self.config.fidelity_mode)?;

        let overlap = match (&self.config.fit, &fits) {
            (FitMode::DoubleOverlap, Some(fits)) => fits.both().and_then(|(g, e)| {
                let (bg, cg) = g.dominant();
                let (be, ce) = e.dominant();
                overlap_fidelity(bg, cg, be, ce)
                    .map_err(|err| log::warn!("Overlap fidelity unavailable: {}", err))
                    .ok()
            }),
            _ => None,
        };
        if self.config.fit == FitMode::DoubleOverlap && overlap.is_none() {
            log::warn!("Double-Gaussian fit unavailable, reporting threshold fidelity");
        }

        let (fidelity, estimator) = match overlap {
            Some(f) => (f, FidelityEstimator::GaussianOverlap),
            None => (solution.fidelity, FidelityEstimator::Threshold),
        };

        let result = ClassificationResult {
            fidelity,
            estimator,
            threshold_fidelity: solution.fidelity,
            thresholds: solution.thresholds,
            ground_excited: solution.ground_excited,
            confusion: solution.confusion,
            angle: rotation.angle,
            projection: rotation.mode,
            histograms: if self.config.normalize {
                histograms.normalized()
            } else {
                histograms
            },
            rotated: rotation.states,
            data: aggregate_by_role(states),
            fits,
        };

        log::info!(
            "Readout analysis: theta={:.2} deg, fidelity={:.3}% ({:?}), {} categories",
            result.angle_deg(),
            result.fidelity_percent(),
            result.estimator,
            result.num_categories()
        );
        log::debug!("Fidelity matrix (%):\n{}", result.confusion);

        Ok(result)
    }
}

/// Concatenate shots of each role under `I{g,e,f}` / `Q{g,e,f}`
fn aggregate_by_role(states: &[StateSample]) -> RawShots {
    let mut shots = RawShots::new();
    for role in StateRole::ALL {
        let (mut i, mut q) = (Vec::new(), Vec::new());
        for s in states.iter().filter(|s| s.role() == role) {
            i.extend_from_slice(s.i());
            q.extend_from_slice(s.q());
        }
        if !i.is_empty() {
            shots.insert(format!("I{}", role.symbol()), i);
            shots.insert(format!("Q{}", role.symbol()), q);
        }
    }
    shots
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FidelityMode;
    use approx::assert_relative_eq;
    use qro_core::StateLabel;

    fn line(label: StateLabel, start: f64, n: usize, step: f64) -> StateSample {
        let i: Vec<f64> = (0..n).map(|k| start + step * k as f64).collect();
        StateSample::new(label, i, vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_missing_role() {
        let analyzer = ReadoutAnalyzer::default();
        let err = analyzer
            .analyze(&[line(StateLabel::ground(), 0.0, 10, 0.1)])
            .unwrap_err();
        assert_eq!(err, QroError::MissingRole("excited".into()));
    }

    #[test]
    fn test_invalid_config() {
        let analyzer = ReadoutAnalyzer::new(ReadoutConfig::standard().with_angle_deg(f64::INFINITY));
        let err = analyzer
            .analyze(&[
                line(StateLabel::ground(), 0.0, 10, 0.1),
                line(StateLabel::excited(), 5.0, 10, 0.1),
            ])
            .unwrap_err();
        assert!(matches!(err, QroError::InvalidConfig(_)));
    }

    #[test]
    fn test_degenerate_input_single_bin() {
        let analyzer = ReadoutAnalyzer::default();
        let result = analyzer
            .analyze(&[
                line(StateLabel::ground(), 1.0, 5, 0.0),
                line(StateLabel::excited(), 1.0, 5, 0.0),
            ])
            .unwrap();

        assert_eq!(result.histograms.num_bins(), 1);
        assert_eq!(result.fidelity, 0.0);
        assert!(result.fidelity.is_finite());
    }

    #[test]
    fn test_overlap_falls_back_without_fits() {
        // Two bins leave too few points for a six-parameter fit
        let analyzer = ReadoutAnalyzer::new(ReadoutConfig::gaussian_overlap().with_num_bins(2));
        let result = analyzer
            .analyze(&[
                line(StateLabel::ground(), 0.0, 20, 0.1),
                line(StateLabel::excited(), 8.0, 20, 0.1),
            ])
            .unwrap();

        assert_eq!(result.estimator, FidelityEstimator::Threshold);
        assert_eq!(result.fidelity, result.threshold_fidelity);
        let fits = result.fits.as_ref().unwrap();
        assert!(fits.ground.is_none() && fits.excited.is_none());
    }

    #[test]
    fn test_data_bundle_aggregates_by_role() {
        let analyzer = ReadoutAnalyzer::new(ReadoutConfig::autorun());
        let result = analyzer
            .analyze(&[
                line(StateLabel::ground(), 0.0, 3, 0.1),
                line(StateLabel::excited(), 5.0, 4, 0.1),
                line(StateLabel::new("e2", StateRole::Excited), 5.0, 2, 0.1),
            ])
            .unwrap();

        assert_eq!(result.data.get("Ig").unwrap().len(), 3);
        assert_eq!(result.data.get("Ie").unwrap().len(), 6);
        assert!(result.data.get("If").is_none());
        assert_eq!(result.rotated.len(), 3);
        assert!(!result.is_three_state());
    }

    #[test]
    fn test_json_roundtrip() {
        let analyzer = ReadoutAnalyzer::new(
            ReadoutConfig::standard()
                .with_num_bins(16)
                .with_fidelity_mode(FidelityMode::Averaged),
        );
        let result = analyzer
            .analyze(&[
                line(StateLabel::ground(), 0.0, 8, 0.1),
                line(StateLabel::excited(), 3.0, 8, 0.1),
            ])
            .unwrap();
        let back = ClassificationResult::from_json(&result.to_json().unwrap()).unwrap();
        assert_relative_eq!(back.fidelity, result.fidelity);
        assert_eq!(back.confusion, result.confusion);
        assert!(result.to_string().contains("Fidelity Matrix"));
    }
}
