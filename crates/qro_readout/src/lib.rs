//! # QRO Readout
//!
//! Single-shot IQ classification and readout fidelity estimation.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qro_readout // L2: Readout analysis (완료)
//!     ReadoutConfig // 설정 (완료)
//!         num_bins, projection, fidelity_mode, fit, normalize
//!     Rotation // 회전 (완료)
//!         discrimination_angle() - g→e 축 정렬
//!         project() - RotatedPhase | Amplitude
//!     StateHistograms // 히스토그램 (완료)
//!         bin_edges() - 공유 구간
//!         build() - 상태별 카운트
//!     Levenberg // 최소제곱 (완료)
//!         levenberg_marquardt() - 감쇠 최소제곱 (nalgebra Cholesky/LU)
//!     MixtureFit // 가우시안 적합 (완료)
//!         Single | Double
//!         fit_ground_excited()
//!     Overlap // 중첩 충실도 (완료)
//!         overlap_fidelity() - 적응 심프슨
//!     Threshold // 임계값 (완료)
//!         contrast(), find_threshold()
//!         solve() - N 상태 임계값 + 혼동 행렬
//!     ReadoutAnalyzer // 분석기 (완료)
//!         analyze(), analyze_raw()
//!         ClassificationResult - 결과
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qro_readout::prelude::*;
//! use qro_core::{StateLabel, StateSample};
//!
//! let ground = StateSample::new(StateLabel::ground(), vec![0.0, 0.1, 0.2], vec![0.0; 3]).unwrap();
//! let excited = StateSample::new(StateLabel::excited(), vec![5.0, 5.1, 5.2], vec![0.0; 3]).unwrap();
//!
//! let analyzer = ReadoutAnalyzer::new(ReadoutConfig::standard().with_num_bins(20));
//! let result = analyzer.analyze(&[ground, excited]).unwrap();
//!
//! assert!(result.fidelity > 0.99);
//! println!("{}", result);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Analysis configuration (Gantree: L2_Readout → ReadoutConfig)
pub mod config;

/// IQ rotation and projection (Gantree: L2_Readout → Rotation)
pub mod rotation;

/// Shared-edge histograms (Gantree: L2_Readout → StateHistograms)
pub mod histogram;

/// Damped least squares (Gantree: L2_Readout → Levenberg)
pub mod levenberg;

/// Gaussian mixture fits (Gantree: L2_Readout → MixtureFit)
pub mod fit;

/// Gaussian-overlap fidelity (Gantree: L2_Readout → Overlap)
pub mod overlap;

/// Thresholds and confusion matrix (Gantree: L2_Readout → Threshold)
pub mod threshold;

/// Readout analyzer (Gantree: L2_Readout → ReadoutAnalyzer)
pub mod analyzer;

// ============================================================================
// Re-exports
// ============================================================================

pub use analyzer::{ClassificationResult, FidelityEstimator, ReadoutAnalyzer};
pub use config::{FidelityMode, FitMode, ReadoutConfig};
pub use fit::{MixtureFitResult, MixtureModel, StateFits};
pub use histogram::{Histogram, StateHistograms};
pub use levenberg::{levenberg_marquardt, LeastSquaresFit, LmOptions};
pub use overlap::overlap_fidelity;
pub use rotation::{project, ProjectionMode, RotatedState, Rotation};
pub use threshold::{ConfusionMatrix, Threshold, ThresholdSolution};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qro_readout::prelude::*;
    //! ```

    pub use crate::analyzer::{ClassificationResult, FidelityEstimator, ReadoutAnalyzer};
    pub use crate::config::{FidelityMode, FitMode, ReadoutConfig};
    pub use crate::fit::{MixtureModel, StateFits};
    pub use crate::rotation::ProjectionMode;
    pub use crate::threshold::{ConfusionMatrix, Threshold};
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use approx::assert_relative_eq;
    use qro_core::{RawShots, StateLabel, StateRole, StateSample};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn normal(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
        Normal::new(mean, sigma).unwrap().sample(rng)
    }

    fn cluster(rng: &mut StdRng, label: StateLabel, mean_i: f64, n: usize) -> StateSample {
        let i: Vec<f64> = (0..n).map(|_| normal(rng, mean_i, 1.0)).collect();
        StateSample::new(label, i, vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_well_separated_states() {
        let mut rng = StdRng::seed_from_u64(7);
        let states = vec![
            cluster(&mut rng, StateLabel::ground(), 0.0, 5000),
            cluster(&mut rng, StateLabel::excited(), 5.0, 5000),
        ];

        let result = ReadoutAnalyzer::default().analyze(&states).unwrap();

        assert!(result.fidelity > 0.95, "fidelity {}", result.fidelity);
        assert_eq!(result.estimator, FidelityEstimator::Threshold);
        assert_eq!(result.thresholds.len(), 1);
        let t = result.thresholds[0].value;
        assert!(t > 2.0 && t < 3.0, "threshold {}", t);
        assert!(result.angle.abs() < 0.1);
    }

    #[test]
    fn test_indistinguishable_states() {
        let mut rng = StdRng::seed_from_u64(11);
        let states = vec![
            cluster(&mut rng, StateLabel::ground(), 0.0, 5000),
            cluster(&mut rng, StateLabel::excited(), 0.0, 5000),
        ];

        let result = ReadoutAnalyzer::default().analyze(&states).unwrap();
        assert!(result.fidelity < 0.06, "fidelity {}", result.fidelity);

        // Both rows split the same way
        let p = result.confusion.percent();
        assert!((p[0][0] - p[1][0]).abs() < 6.0);
        assert!((p[0][1] - p[1][1]).abs() < 6.0);
    }

    #[test]
    fn test_three_state_assignment() {
        let mut rng = StdRng::seed_from_u64(3);
        let states = vec![
            cluster(&mut rng, StateLabel::ground(), 0.0, 2000),
            cluster(&mut rng, StateLabel::excited(), 5.0, 2000),
            cluster(&mut rng, StateLabel::other(), 10.0, 2000),
        ];

        let result = ReadoutAnalyzer::default().analyze(&states).unwrap();

        assert!(result.is_three_state());
        assert_eq!(result.thresholds.len(), 2);
        for d in result.confusion.diagonal() {
            assert!(d > 90.0, "diagonal {}", d);
        }
        let values = result.threshold_values();
        assert!(values[0] < values[1]);
    }

    #[test]
    fn test_double_overlap_end_to_end() {
        let mut rng = StdRng::seed_from_u64(5);
        let states = vec![
            cluster(&mut rng, StateLabel::ground(), 0.0, 5000),
            cluster(&mut rng, StateLabel::excited(), 4.0, 5000),
        ];

        let result = ReadoutAnalyzer::new(ReadoutConfig::gaussian_overlap())
            .analyze(&states)
            .unwrap();

        assert_eq!(result.estimator, FidelityEstimator::GaussianOverlap);
        // 1 − 2Φ(−2)
        assert_relative_eq!(result.fidelity, 0.9545, epsilon = 0.03);
        assert!(result.threshold_fidelity > 0.9);
    }

    #[test]
    fn test_double_overlap_across_seeds_and_populations() {
        use statrs::distribution::{ContinuousCDF, Normal as Gauss};
        let unit = Gauss::new(0.0, 1.0).unwrap();

        for seed in 1..=6 {
            for separation in [3.0, 4.0, 5.0] {
                for (ng, ne) in [(5000, 5000), (7000, 3000), (2000, 6000)] {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let states = vec![
                        cluster(&mut rng, StateLabel::ground(), -0.5, ng),
                        cluster(&mut rng, StateLabel::excited(), separation - 0.5, ne),
                    ];

                    let result = ReadoutAnalyzer::new(ReadoutConfig::gaussian_overlap())
                        .analyze(&states)
                        .unwrap();

                    let case = format!("seed {} separation {} shots {}/{}", seed, separation, ng, ne);
                    assert_eq!(result.estimator, FidelityEstimator::GaussianOverlap, "{}", case);
                    // 1 − 2Φ(−d/2) for unit widths
                    let expected = 1.0 - 2.0 * unit.cdf(-separation / 2.0);
                    assert!((result.fidelity - expected).abs() < 0.06, "{}: {}", case, result.fidelity);
                }
            }
        }
    }

    #[test]
    fn test_histograms_cover_all_shots() {
        let mut rng = StdRng::seed_from_u64(9);
        let states = vec![
            cluster(&mut rng, StateLabel::ground(), 0.0, 700),
            cluster(&mut rng, StateLabel::excited(), 3.0, 300),
        ];

        let result = ReadoutAnalyzer::new(ReadoutConfig::autorun().with_num_bins(50))
            .analyze(&states)
            .unwrap();

        let g: f64 = result.histograms.category_counts(StateRole::Ground).unwrap().iter().sum();
        let e: f64 = result.histograms.category_counts(StateRole::Excited).unwrap().iter().sum();
        assert_relative_eq!(g, 700.0);
        assert_relative_eq!(e, 300.0);

        for row in result.confusion.percent() {
            assert_relative_eq!(row.iter().sum::<f64>(), 100.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut shots = RawShots::new();
        let ig: Vec<f64> = (0..500).map(|_| normal(&mut rng, 0.0, 1.0)).collect();
        let qg: Vec<f64> = (0..500).map(|_| normal(&mut rng, 0.0, 1.0)).collect();
        let ie: Vec<f64> = (0..500).map(|_| normal(&mut rng, 3.0, 1.0)).collect();
        let qe: Vec<f64> = (0..500).map(|_| normal(&mut rng, 3.0, 1.0)).collect();
        shots.insert("Ig", ig);
        shots.insert("Qg", qg);
        shots.insert("Ie", ie);
        shots.insert("Qe", qe);

        let analyzer = ReadoutAnalyzer::default();
        let a = analyzer.analyze_raw(&shots).unwrap();
        let b = analyzer.analyze_raw(&shots).unwrap();

        assert_eq!(a.fidelity, b.fidelity);
        assert_eq!(a.threshold_values(), b.threshold_values());
        assert_eq!(a.confusion, b.confusion);
        assert_eq!(a.data, shots);
    }
}
