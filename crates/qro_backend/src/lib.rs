//! # QRO Backend
//!
//! Instrument contracts and simulated readout hardware.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qro_backend // L3: Instrument abstraction (완료)
//!     IqBuffer // IQ 버퍼 (완료)
//!         to_complex() - I·1 + Q·1j
//!     RoundSource // 라운드 획득 (완료)
//!         acquire_round() - 블로킹
//!     Instrument // 단일 샷 획득 (완료)
//!         acquire_shots(), acquire_states()
//!     SimulatedReadout // 단일 샷 시뮬레이터 (완료)
//!         separation() - 파라미터 의존 분리
//!     SimulatedSweep // 라운드 시뮬레이터 (완료)
//!         transmission() - 공진기 응답
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qro_backend::prelude::*;
//! use qro_core::{PreparedState, ReadoutParams};
//!
//! let params = ReadoutParams::default();
//! let instrument = SimulatedReadout::new(params).with_seed(42);
//!
//! let ground = instrument.acquire_shots(PreparedState::G, 1000, &params).unwrap();
//! assert_eq!(ground.len(), 1000);
//! ```
//!
//! ## Averaging Rounds
//!
//! ```rust
//! use qro_backend::prelude::*;
//!
//! let sweep = SimulatedSweep::new(7000.0, 10.0).with_seed(1);
//! let round = sweep.acquire_round().unwrap();
//! let trace = round.to_complex();
//! assert_eq!(trace.len(), sweep.frequencies().len());
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Instrument contracts (Gantree: L3_Backend → InstrumentTrait)
pub mod execution;

/// Simulated hardware (Gantree: L3_Backend → SimulatedReadout)
pub mod simulator;

// ============================================================================
// Re-exports
// ============================================================================

pub use execution::{Instrument, IqBuffer, RoundSource};
pub use simulator::{SimulatedReadout, SimulatedSweep};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qro_backend::prelude::*;
    //! ```

    pub use crate::execution::{Instrument, IqBuffer, RoundSource};
    pub use crate::simulator::{SimulatedReadout, SimulatedSweep};
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use qro_core::{PreparedState, ReadoutParams, StateRole};
    use std::sync::Arc;

    #[test]
    fn test_instrument_as_trait_object() {
        let params = ReadoutParams::default();
        let instrument: Arc<dyn Instrument> =
            Arc::new(SimulatedReadout::new(params).with_seed(3));

        let samples = instrument
            .acquire_states(
                &[PreparedState::G, PreparedState::E, PreparedState::F],
                200,
                &params,
            )
            .unwrap();

        let roles: Vec<StateRole> = samples.iter().map(|s| s.role()).collect();
        assert_eq!(
            roles,
            vec![StateRole::Ground, StateRole::Excited, StateRole::Other]
        );
        assert!(instrument.is_simulator());
    }

    #[test]
    fn test_excited_further_than_other_states() {
        let params = ReadoutParams::default();
        let sim = SimulatedReadout::new(params).with_phase_deg(0.0).with_ground(0.0, 0.0);

        let (ei, _) = sim.centroid(PreparedState::E, &params);
        let (fi, _) = sim.centroid(PreparedState::F, &params);
        assert!((fi - 2.0 * ei).abs() < 1e-12);
    }

    #[test]
    fn test_round_source_shared_across_threads() {
        let sweep = Arc::new(SimulatedSweep::new(7000.0, 10.0).with_points(5).with_seed(9));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sweep = Arc::clone(&sweep);
                std::thread::spawn(move || sweep.acquire_round().map(|r| r.len()))
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 5);
        }
        assert_eq!(sweep.rounds_served(), 4);
    }
}
