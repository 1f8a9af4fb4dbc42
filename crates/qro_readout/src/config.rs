//! Readout analysis configuration
//!
//! Gantree: L2_Readout → ReadoutConfig
//!
//! Selects projection, bin count, fidelity policy and mixture fit for one
//! analysis run.

use crate::rotation::ProjectionMode;
use qro_core::readout;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Threshold fidelity policy
/// Gantree: FidelityMode // 충실도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FidelityMode {
    /// Contrast at the threshold index
    /// Gantree: Contrast // 대비
    #[default]
    Contrast,

    /// Balanced error rate over both populations
    /// Gantree: Averaged // 평균
    Averaged,
}

/// Mixture fit request
/// Gantree: FitMode // 피팅 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FitMode {
    /// No fit
    #[default]
    Off,

    /// Gaussian plus offset per state, reported only
    /// Gantree: Single // 단일 가우시안
    Single,

    /// Double Gaussian per state, fidelity from the overlap of dominant peaks
    /// Gantree: DoubleOverlap // 이중 가우시안 + 중첩
    DoubleOverlap,
}

impl FitMode {
    /// Whether any fit runs
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FitMode::Off)
    }
}

/// Readout analysis configuration
/// Gantree: ReadoutConfig // 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadoutConfig {
    /// Histogram bins (0 = default)
    /// Gantree: num_bins: usize // 빈 수 (200)
    pub num_bins: usize,

    /// Projection onto the discrimination axis
    /// Gantree: projection: ProjectionMode // 투영 모드
    pub projection: ProjectionMode,

    /// Threshold fidelity policy
    /// Gantree: fidelity_mode: FidelityMode // contrast/averaged
    pub fidelity_mode: FidelityMode,

    /// Mixture fit request
    /// Gantree: fit: FitMode // off/single/double
    pub fit: FitMode,

    /// Report normalized histograms in the result
    pub normalize: bool,
}

impl ReadoutConfig {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Interactive analysis: rotated phase, contrast fidelity, no fit
    /// Gantree: standard() -> Self // 기본값
    pub fn standard() -> Self {
        Self {
            num_bins: readout::DEFAULT_NUM_BINS,
            projection: ProjectionMode::default(),
            fidelity_mode: FidelityMode::Contrast,
            fit: FitMode::Off,
            normalize: true,
        }
    }

    /// Unattended analysis used by sweeps: raw counts, no fit
    pub fn autorun() -> Self {
        Self {
            normalize: false,
            ..Self::standard()
        }
    }

    /// Gaussian-overlap fidelity with double fits
    pub fn gaussian_overlap() -> Self {
        Self {
            fit: FitMode::DoubleOverlap,
            ..Self::standard()
        }
    }

    /// Amplitude projection
    pub fn amplitude() -> Self {
        Self {
            projection: ProjectionMode::Amplitude,
            ..Self::standard()
        }
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Set bin count
    /// Gantree: with_num_bins(n) -> Self // 빈 수 설정
    pub fn with_num_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins;
        self
    }

    /// Set projection mode
    pub fn with_projection(mut self, projection: ProjectionMode) -> Self {
        self.projection = projection;
        self
    }

    /// Use an external rotation angle in degrees
    pub fn with_angle_deg(mut self, angle_deg: f64) -> Self {
        self.projection = ProjectionMode::RotatedPhase {
            angle_deg: Some(angle_deg),
        };
        self
    }

    /// Set fidelity policy
    pub fn with_fidelity_mode(mut self, mode: FidelityMode) -> Self {
        self.fidelity_mode = mode;
        self
    }

    /// Set fit mode
    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = fit;
        self
    }

    /// Enable/disable histogram normalization in the result
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    // ========================================================================
    // Derived Values
    // ========================================================================

    /// Bin count after applying the default
    pub fn effective_bins(&self) -> usize {
        if self.num_bins == 0 {
            readout::DEFAULT_NUM_BINS
        } else {
            self.num_bins
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate configuration
    /// Gantree: validate(&self) -> Result // 검증
    pub fn validate(&self) -> Result<(), String> {
        if let ProjectionMode::RotatedPhase {
            angle_deg: Some(angle),
        } = self.projection
        {
            if !angle.is_finite() {
                return Err(format!("angle must be finite, got {}", angle));
            }
        }

        if self.effective_bins() > 1_000_000 {
            return Err(format!(
                "num_bins must be <= 1000000, got {}",
                self.num_bins
            ));
        }

        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for ReadoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReadoutConfig(bins={}, projection={}, fidelity={:?}, fit={:?})",
            self.effective_bins(),
            self.projection,
            self.fidelity_mode,
            self.fit
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
