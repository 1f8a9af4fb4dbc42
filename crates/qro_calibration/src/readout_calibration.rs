//! Readout calibration record
//!
//! Gantree: L4_Calibration → ReadoutCalibration
//!
//! What a finished analysis or optimization hands back to the host: the
//! rotation angle, discrimination thresholds, fidelity and, when known, the
//! readout pulse parameters that produced them.

use qro_core::{readout, QroError, QroResult, ReadoutParams};
use qro_readout::{ClassificationResult, ProjectionMode, ReadoutConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Calibrated readout of one qubit
/// Gantree: ReadoutCalibration // 판독 캘리브레이션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadoutCalibration {
    /// Qubit name
    /// Gantree: qubit: String // 큐비트
    pub qubit: String,

    /// When the calibration was taken
    #[serde(with = "system_time_serde")]
    pub timestamp: SystemTime,

    /// Rotation angle (degrees)
    /// Gantree: angle_deg: f64 // 회전각
    pub angle_deg: f64,

    /// Ground-vs-excited threshold (ADC units)
    pub ge_threshold: f64,

    /// All thresholds along the axis (ADC units)
    pub thresholds: Vec<f64>,

    /// Readout fidelity (0..1)
    /// Gantree: fidelity: f64 // 충실도
    pub fidelity: f64,

    /// Confusion-matrix diagonal (%)
    pub assignment: Vec<f64>,

    /// Readout pulse parameters, when known
    pub params: Option<ReadoutParams>,
}

impl ReadoutCalibration {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Empty calibration for `qubit`
    pub fn new(qubit: &str) -> Self {
        Self {
            qubit: qubit.to_string(),
            timestamp: SystemTime::now(),
            angle_deg: 0.0,
            ge_threshold: 0.0,
            thresholds: Vec::new(),
            fidelity: 0.0,
            assignment: Vec::new(),
            params: None,
        }
    }

    /// Capture a classification result
    /// Gantree: from_result(qubit, result) -> Self // 결과 반영
    pub fn from_result(qubit: &str, result: &ClassificationResult) -> Self {
        Self {
            qubit: qubit.to_string(),
            timestamp: SystemTime::now(),
            angle_deg: result.angle_deg(),
            ge_threshold: result.ground_excited.value,
            thresholds: result.threshold_values(),
            fidelity: result.fidelity,
            assignment: result.confusion.diagonal(),
            params: None,
        }
    }

    /// Attach readout parameters
    pub fn with_params(mut self, params: ReadoutParams) -> Self {
        self.params = Some(params);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Rotation angle in radians
    pub fn angle_rad(&self) -> f64 {
        readout::deg_to_rad(self.angle_deg)
    }

    /// Fidelity in percent
    pub fn fidelity_percent(&self) -> f64 {
        100.0 * self.fidelity
    }

    /// Whether the calibration is younger than `ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        match self.timestamp.elapsed() {
            Ok(elapsed) => elapsed < ttl,
            Err(_) => false,
        }
    }

    /// Age of the calibration
    pub fn age(&self) -> Option<Duration> {
        self.timestamp.elapsed().ok()
    }

    /// Check that the stored values are usable
    pub fn validate(&self) -> QroResult<()> {
        if !self.angle_deg.is_finite() {
            return Err(QroError::InvalidAngle(self.angle_deg));
        }
        if !(0.0..=1.0).contains(&self.fidelity) {
            return Err(QroError::CalibrationError(format!(
                "fidelity {} outside [0, 1]",
                self.fidelity
            )));
        }
        if let Some(params) = &self.params {
            params.validate()?;
        }
        Ok(())
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Analysis config that reuses the calibrated angle
    /// Gantree: apply_to(config) -> ReadoutConfig // 각도 재사용
    pub fn apply_to(&self, config: ReadoutConfig) -> ReadoutConfig {
        config.with_projection(ProjectionMode::RotatedPhase {
            angle_deg: Some(self.angle_deg),
        })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> QroResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> QroResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ReadoutCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReadoutCalibration({}, theta={:.2} deg, threshold={:.3}, F={:.2}%",
            self.qubit,
            self.angle_deg,
            self.ge_threshold,
            self.fidelity_percent()
        )?;
        if let Some(params) = &self.params {
            write!(f, ", {}", params)?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// SystemTime Serde Helper
// ============================================================================

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

// ============================================================================
// Tests
// ============================================================================
