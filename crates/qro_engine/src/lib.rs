//! # QRO Engine
//!
//! Acquisition loops and readout experiments on top of the analysis core.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qro_engine // L5: Experiments (완료)
//!     EngineConfig // 설정 (완료)
//!         AveragingConfig, SingleShotConfig, SweepConfig
//!     Progress // 진행 (완료)
//!         CancelToken, ProgressTracker
//!         AveragingObserver - on_plot, on_progress, should_stop, on_complete
//!     Averager // 평균 루프 (완료)
//!         RunningAverage - 복소 누적
//!         run() - spawn_blocking 획득 → 누적 → 보고
//!     SingleShotRunner // 단일 샷 (완료)
//!         acquire(), run(), autorun()
//!     ReadoutOptimizer // 판독 최적화 (완료)
//!         run() - 길이 × 게인 × 주파수 격자
//!         update_result()
//! ```
//!
//! ## Averaging
//!
//! ```rust
//! use qro_engine::prelude::*;
//! use qro_backend::SimulatedSweep;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let source = Arc::new(SimulatedSweep::new(7000.0, 10.0).with_seed(1));
//! let averager = Averager::new(source, AveragingConfig::new(3));
//!
//! let outcome = averager.run(&mut NoopObserver).await.unwrap();
//! assert_eq!(outcome.rounds_completed, 3);
//! assert!(!outcome.interrupted);
//! # });
//! ```
//!
//! ## Single Shot
//!
//! ```rust
//! use qro_engine::prelude::*;
//! use qro_backend::SimulatedReadout;
//! use qro_core::ReadoutParams;
//! use std::sync::Arc;
//!
//! let sim = Arc::new(SimulatedReadout::new(ReadoutParams::default()).with_seed(3));
//! let runner = SingleShotRunner::new(sim, SingleShotConfig::ge().with_shots(500));
//!
//! let result = runner.run().unwrap();
//! assert!(result.fidelity > 0.9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Engine configuration (Gantree: L5_Engine → EngineConfig)
pub mod config;

/// Progress and cancellation (Gantree: L5_Engine → Progress)
pub mod progress;

/// Averaging loop (Gantree: L5_Engine → Averager)
pub mod averager;

/// Single-shot runner (Gantree: L5_Engine → SingleShotRunner)
pub mod singleshot;

/// Readout optimizer (Gantree: L5_Engine → ReadoutOptimizer)
pub mod optimizer;

// ============================================================================
// Re-exports
// ============================================================================

pub use averager::{Averager, AveragingOutcome, LoopState, RunningAverage};
pub use config::{AveragingConfig, SingleShotConfig, SweepAxes, SweepConfig};
pub use optimizer::{
    grid_argmax, FidelityGrid, OptimalPoint, OptimizationResult, ReadoutOptimizer, SweepMetrics,
};
pub use progress::{AveragingObserver, CallbackObserver, CancelToken, NoopObserver, ProgressTracker};
pub use singleshot::SingleShotRunner;

// ============================================================================
// Prelude
// ============================================================================

/// Prelude for convenient imports
pub mod prelude {
    //! Common imports for QRO engine
    //!
    //! ```rust
    //! use qro_engine::prelude::*;
    //! ```

    pub use crate::averager::{Averager, AveragingOutcome, LoopState};
    pub use crate::config::{AveragingConfig, SingleShotConfig, SweepConfig};
    pub use crate::optimizer::{OptimizationResult, ReadoutOptimizer};
    pub use crate::progress::{AveragingObserver, CallbackObserver, CancelToken, NoopObserver};
    pub use crate::singleshot::SingleShotRunner;
}

// ============================================================================
// Integration Tests
// ============================================================================
