//! Error types for QRO
//!
//! Gantree: L0_Foundation → Errors
//!
//! Error taxonomy shared by every QRO crate. Degenerate inputs are handled by
//! policy and never reach this type; fit failures are recovered locally.

// Error variant fields are self-documenting via error messages
#![allow(missing_docs)]

use thiserror::Error;

/// Main error type for QRO
/// Gantree: QroError // enum
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QroError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Sample has no shots
    /// Gantree: EmptySample(label) // 빈 샘플
    #[error("State '{0}' has no shots")]
    EmptySample(String),

    /// I and Q sequences differ in length
    /// Gantree: LengthMismatch{{i,q}} // 길이 불일치
    #[error("I/Q length mismatch for state '{label}': I has {i_len}, Q has {q_len}")]
    LengthMismatch {
        label: String,
        i_len: usize,
        q_len: usize,
    },

    /// Required role is missing from the state set
    #[error("No state carries the {0} role")]
    MissingRole(String),

    /// Required raw-shots key is missing
    #[error("Raw shots are missing key '{0}'")]
    MissingKey(String),

    /// Non-finite value in input data
    #[error("Invalid value {value} in state '{label}': must be finite")]
    NonFiniteValue { label: String, value: f64 },

    /// Invalid angle
    #[error("Invalid angle {0}: must be finite")]
    InvalidAngle(f64),

    /// Invalid configuration
    /// Gantree: InvalidConfig(String) // 설정 오류
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Fit Errors
    // ========================================================================
    /// Least-squares fit did not converge
    /// Gantree: FitDidNotConverge{{iters}} // 수렴 실패
    #[error("Fit did not converge after {iterations} iterations")]
    FitDidNotConverge { iterations: usize },

    /// Normal equations are singular
    #[error("Singular matrix in fit normal equations")]
    SingularMatrix,

    /// Fit produced NaN or infinite parameters
    #[error("Fit produced non-finite parameters")]
    NonFiniteFit,

    /// Not enough points for the requested model
    #[error("Fit needs at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    // ========================================================================
    // Acquisition Errors
    // ========================================================================
    /// Acquisition round failed
    /// Gantree: AcquisitionFailed(String) // 획득 실패
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// Instrument reported an error
    #[error("Instrument error: {0}")]
    InstrumentError(String),

    /// Round buffer size changed between rounds
    #[error("Round {round} returned {got} points, expected {expected}")]
    RoundSizeMismatch {
        round: usize,
        expected: usize,
        got: usize,
    },

    // ========================================================================
    // Calibration Errors
    // ========================================================================
    /// Calibration error
    #[error("Calibration error: {0}")]
    CalibrationError(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(String),

    /// File I/O error
    #[error("File error: {0}")]
    FileError(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for QRO operations
/// Gantree: QroResult<T> // type alias
pub type QroResult<T> = Result<T, QroError>;

// ============================================================================
// Error Conversion Helpers
// ============================================================================

impl From<serde_json::Error> for QroError {
    fn from(err: serde_json::Error) -> Self {
        QroError::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for QroError {
    fn from(err: std::io::Error) -> Self {
        QroError::FileError(err.to_string())
    }
}

// ============================================================================
// Error Helpers
// ============================================================================

impl QroError {
    /// Check if error is recovered locally (fit failures)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QroError::FitDidNotConverge { .. }
                | QroError::SingularMatrix
                | QroError::NonFiniteFit
                | QroError::InsufficientData { .. }
        )
    }

    /// Check if error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            QroError::EmptySample(_)
                | QroError::LengthMismatch { .. }
                | QroError::MissingRole(_)
                | QroError::MissingKey(_)
                | QroError::NonFiniteValue { .. }
                | QroError::InvalidAngle(_)
                | QroError::InvalidConfig(_)
        )
    }

    /// Check if error came from the acquisition path
    pub fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            QroError::AcquisitionFailed(_)
                | QroError::InstrumentError(_)
                | QroError::RoundSizeMismatch { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QroError::LengthMismatch {
            label: "g".into(),
            i_len: 10,
            q_len: 9,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(QroError::FitDidNotConverge { iterations: 100 }.is_recoverable());
        assert!(QroError::SingularMatrix.is_recoverable());
        assert!(!QroError::AcquisitionFailed("timeout".into()).is_recoverable());
    }

    #[test]
    fn test_is_validation_error() {
        assert!(QroError::EmptySample("e".into()).is_validation_error());
        assert!(!QroError::InstrumentError("test".into()).is_validation_error());
    }

    #[test]
    fn test_is_acquisition_error() {
        let err = QroError::RoundSizeMismatch {
            round: 2,
            expected: 11,
            got: 10,
        };
        assert!(err.is_acquisition_error());
        assert!(!QroError::NonFiniteFit.is_acquisition_error());
    }

    #[test]
    fn test_json_conversion() {
        let err: QroError = serde_json::from_str::<f64>("not json").unwrap_err().into();
        assert!(matches!(err, QroError::JsonError(_)));
    }
}
