//! # QRO Calibration
//!
//! Readout calibration records and their cache.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qro_calibration // L4: Calibration (완료)
//!     ReadoutCalibration // 판독 캘리브레이션 (완료)
//!         qubit, timestamp, angle_deg, thresholds, fidelity, params
//!         from_result() - 분석 결과 반영
//!         apply_to() - 각도 재사용
//!     CalibrationCache // TTL 캐싱 (완료)
//!         get(), set(), invalidate()
//!         get_or_fetch() - 캐시 또는 조회
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qro_calibration::prelude::*;
//! use qro_core::ReadoutParams;
//!
//! let cache = CalibrationCache::new(3600);
//!
//! let calibration = ReadoutCalibration::new("Q1").with_params(ReadoutParams::default());
//! cache.set(calibration);
//!
//! if let Some(cached) = cache.get("Q1") {
//!     println!("{}", cached);
//! }
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Readout calibration record (Gantree: L4_Calibration → ReadoutCalibration)
pub mod readout_calibration;

/// Calibration caching (Gantree: L4_Calibration → CalibrationCache)
pub mod calibration_cache;

// ============================================================================
// Re-exports
// ============================================================================

pub use calibration_cache::CalibrationCache;
pub use readout_calibration::ReadoutCalibration;

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qro_calibration::prelude::*;
    //! ```

    pub use crate::calibration_cache::CalibrationCache;
    pub use crate::readout_calibration::ReadoutCalibration;
}

// ============================================================================
// Integration Tests
// ============================================================================
