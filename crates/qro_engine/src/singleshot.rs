//! Single-shot experiment runner
//!
//! Gantree: L5_Engine → SingleShotRunner
//!
//! Acquires g/e(/f) shots through an instrument and classifies them.

use crate::config::SingleShotConfig;
use qro_backend::Instrument;
use qro_calibration::{CalibrationCache, ReadoutCalibration};
use qro_core::{PreparedState, QroError, QroResult, RawShots};
use qro_readout::{ClassificationResult, ReadoutAnalyzer, ReadoutConfig};
use std::sync::Arc;

/// Single-shot g/e(/f) experiment
/// Gantree: SingleShotRunner // 단일 샷 실행기
pub struct SingleShotRunner<I: Instrument + 'static> {
    instrument: Arc<I>,
    config: SingleShotConfig,
    publish: Option<(CalibrationCache, String)>,
}

impl<I: Instrument + 'static> SingleShotRunner<I> {
    /// Create runner
    pub fn new(instrument: Arc<I>, config: SingleShotConfig) -> Self {
        Self {
            instrument,
            config,
            publish: None,
        }
    }

    /// Publish each analysis to `cache` under `qubit`
    pub fn with_calibration_cache(mut self, cache: CalibrationCache, qubit: &str) -> Self {
        self.publish = Some((cache, qubit.to_string()));
        self
    }

    /// Configuration
    pub fn config(&self) -> &SingleShotConfig {
        &self.config
    }

    fn states(&self) -> Vec<PreparedState> {
        if self.config.include_f {
            vec![PreparedState::G, PreparedState::E, PreparedState::F]
        } else {
            vec![PreparedState::G, PreparedState::E]
        }
    }

    /// Acquire raw shots (blocking)
    /// Gantree: acquire() -> Result<RawShots> // 획득
    pub fn acquire(&self) -> QroResult<RawShots> {
        self.config.validate().map_err(QroError::InvalidConfig)?;
        let samples =
            self.instrument
                .acquire_states(&self.states(), self.config.shots, &self.config.params)?;
        Ok(RawShots::from_states(&samples))
    }

    /// Acquire raw shots on the blocking pool
    pub async fn acquire_async(&self) -> QroResult<RawShots> {
        self.config.validate().map_err(QroError::InvalidConfig)?;
        let instrument = Arc::clone(&self.instrument);
        let states = self.states();
        let shots = self.config.shots;
        let params = self.config.params;

        let samples = tokio::task::spawn_blocking(move || {
            instrument.acquire_states(&states, shots, &params)
        })
        .await
        .map_err(|e| QroError::InternalError(format!("acquisition task failed: {}", e)))??;
        Ok(RawShots::from_states(&samples))
    }

    /// Classify shots with `readout`, publishing the calibration if enabled
    pub fn analyze(&self, shots: &RawShots, readout: ReadoutConfig) -> QroResult<ClassificationResult> {
        let result = ReadoutAnalyzer::new(readout).analyze_raw(shots)?;
        if let Some((cache, qubit)) = &self.publish {
            cache.set(ReadoutCalibration::from_result(qubit, &result).with_params(self.config.params));
        }
        Ok(result)
    }

    /// Acquire and classify with the interactive config
    /// Gantree: run() -> Result<ClassificationResult> // 실행
    pub fn run(&self) -> QroResult<ClassificationResult> {
        let shots = self.acquire()?;
        self.analyze(&shots, self.config.readout.clone())
    }

    /// Acquire and classify unattended: raw counts, no fit
    /// Gantree: autorun() -> Result<ClassificationResult> // 자동 실행
    pub fn autorun(&self) -> QroResult<ClassificationResult> {
        let shots = self.acquire()?;
        self.analyze(&shots, ReadoutConfig::autorun())
    }
}

// ============================================================================
// Tests
// ============================================================================
