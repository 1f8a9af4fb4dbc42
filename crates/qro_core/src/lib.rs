//! # QRO Core
//!
//! Foundation types, constants, and errors for the Qubit Readout Optimizer.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qro_core // L0: Foundation (완료)
//!     L0_Foundation // 기반 타입/상수/에러 (완료)
//!         CoreTypes // 상태 라벨, IQ 샘플, 원시 샷 (완료)
//!         Constants // 리드아웃/피팅/획득/스윕 상수 (완료)
//!         Errors // 에러 타입 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qro_core::prelude::*;
//!
//! let shots = RawShots::new()
//!     .with("Ig", vec![0.0, 0.1, -0.1])
//!     .with("Qg", vec![0.0, 0.0, 0.1])
//!     .with("Ie", vec![1.0, 1.1, 0.9])
//!     .with("Qe", vec![1.0, 0.9, 1.0]);
//!
//! let states = shots.to_states().unwrap();
//! assert_eq!(states.len(), 2);
//! assert_eq!(states[0].role(), StateRole::Ground);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Core types (Gantree: L0_Foundation → CoreTypes)
pub mod types;

/// Constants (Gantree: L0_Foundation → Constants)
pub mod constants;

/// Error types (Gantree: L0_Foundation → Errors)
pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use constants::{acquisition, fit, readout, sweep};
pub use error::{QroError, QroResult};
pub use types::{
    Counts, PreparedState, RawShots, ReadoutParams, RotationAngle, StateLabel, StateRole,
    StateSample,
};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use qro_core::prelude::*;
    //! ```

    pub use crate::constants::{acquisition, fit, readout, sweep};
    pub use crate::error::{QroError, QroResult};
    pub use crate::types::{
        Counts, PreparedState, RawShots, ReadoutParams, RotationAngle, StateLabel, StateRole,
        StateSample,
    };
}

// ============================================================================
// Version Information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_raw_shots_roundtrip_through_states() {
        let shots = RawShots::new()
            .with("Ig", vec![0.0, 0.2])
            .with("Qg", vec![0.1, 0.0])
            .with("Ie", vec![2.0, 2.1])
            .with("Qe", vec![1.9, 2.0])
            .with("If", vec![4.0, 4.2])
            .with("Qf", vec![3.9, 4.1]);

        let states = shots.to_states().unwrap();
        let rebuilt = RawShots::from_states(&states);
        assert_eq!(rebuilt, shots);
    }

    #[test]
    fn test_validation_errors_are_classified() {
        let err = RawShots::new().to_states().unwrap_err();
        assert!(err.is_validation_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_readout_defaults() {
        assert_eq!(readout::DEFAULT_NUM_BINS, 200);
        assert_eq!(readout::DEFAULT_GROUND_CENTROID, (0.0, 0.0));
        assert_eq!(readout::DEFAULT_EXCITED_CENTROID, (1.0, 1.0));
        assert_eq!(fit::OVERLAP_WINDOW_SIGMAS, 5.0);
    }

    #[test]
    fn test_prepared_state_roles_cover_all() {
        let roles: Vec<StateRole> = [PreparedState::G, PreparedState::E, PreparedState::F]
            .iter()
            .map(|s| s.role())
            .collect();
        assert_eq!(roles, StateRole::ALL.to_vec());
    }
}
