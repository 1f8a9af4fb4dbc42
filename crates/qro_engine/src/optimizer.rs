//! Readout-parameter optimizer
//!
//! Gantree: L5_Engine → ReadoutOptimizer
//!
//! Grid search over readout length × gain × frequency. Every point acquires
//! g and e shots, classifies them unattended and records the fidelity; the
//! best point becomes the new readout setting.

use crate::config::{SweepAxes, SweepConfig};
use crate::progress::CancelToken;
use qro_backend::Instrument;
use qro_calibration::{CalibrationCache, ReadoutCalibration};
use qro_core::{PreparedState, QroError, QroResult, RawShots, ReadoutParams};
use qro_readout::{ClassificationResult, ReadoutAnalyzer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Fidelity grid indexed `[length][gain][freq]`; `None` where not measured
pub type FidelityGrid = Vec<Vec<Vec<Option<f64>>>>;

/// Best grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalPoint {
    /// Readout parameters at the optimum
    pub params: ReadoutParams,

    /// Fidelity at the optimum
    pub fidelity: f64,

    /// Grid index `[length, gain, freq]`
    pub index: [usize; 3],
}

/// Sweep execution metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepMetrics {
    /// Wall time
    pub total_time_ms: u64,

    /// Grid points measured
    pub points_measured: usize,

    /// Shots acquired across all points and states
    pub total_shots: u64,

    /// Stopped before the grid was exhausted
    pub cancelled: bool,
}

/// Optimization result
/// Gantree: OptimizationResult // 최적화 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Swept axes
    pub axes: SweepAxes,

    /// Fidelity at every grid point
    pub fid_array: FidelityGrid,

    /// Best point among those measured
    pub optimum: Option<OptimalPoint>,

    /// Full classification at the optimum
    pub best_result: Option<ClassificationResult>,

    /// Execution metrics
    pub metrics: SweepMetrics,
}

impl OptimizationResult {
    /// Whether the sweep was stopped early
    pub fn cancelled(&self) -> bool {
        self.metrics.cancelled
    }

    /// Best parameters, if any point was measured
    pub fn best_params(&self) -> Option<ReadoutParams> {
        self.optimum.as_ref().map(|o| o.params)
    }

    /// Calibration record for `qubit` at the optimum
    pub fn to_calibration(&self, qubit: &str) -> Option<ReadoutCalibration> {
        let optimum = self.optimum.as_ref()?;
        let result = self.best_result.as_ref()?;
        Some(ReadoutCalibration::from_result(qubit, result).with_params(optimum.params))
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

/// First maximum of the grid in `[length][gain][freq]` order
pub fn grid_argmax(grid: &FidelityGrid) -> Option<([usize; 3], f64)> {
    let mut best: Option<([usize; 3], f64)> = None;
    for (l, gains) in grid.iter().enumerate() {
        for (g, freqs) in gains.iter().enumerate() {
            for (f, value) in freqs.iter().enumerate() {
                let Some(v) = value.filter(|v| v.is_finite()) else {
                    continue;
                };
                if best.map_or(true, |(_, b)| v > b) {
                    best = Some(([l, g, f], v));
                }
            }
        }
    }
    best
}

/// Readout-parameter grid search
/// Gantree: ReadoutOptimizer // 판독 최적화
pub struct ReadoutOptimizer<I: Instrument + 'static> {
    instrument: Arc<I>,
    config: SweepConfig,
    publish: Option<(CalibrationCache, String)>,
    current: Option<ReadoutParams>,
}

impl<I: Instrument + 'static> ReadoutOptimizer<I> {
    /// Create optimizer
    pub fn new(instrument: Arc<I>, config: SweepConfig) -> Self {
        Self {
            instrument,
            config,
            publish: None,
            current: None,
        }
    }

    /// Publish the optimum to `cache` under `qubit`
    pub fn with_calibration_cache(mut self, cache: CalibrationCache, qubit: &str) -> Self {
        self.publish = Some((cache, qubit.to_string()));
        self
    }

    /// Configuration
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Readout parameters applied by the last `update_result`
    pub fn current_params(&self) -> Option<ReadoutParams> {
        self.current
    }

    fn measure(&self, params: &ReadoutParams) -> QroResult<ClassificationResult> {
        let samples = self.instrument.acquire_states(
            &[PreparedState::G, PreparedState::E],
            self.config.shots,
            params,
        )?;
        ReadoutAnalyzer::new(self.config.readout.clone())
            .analyze_raw(&RawShots::from_states(&samples))
    }

    /// Sweep the grid, checking `cancel` before every point
    ///
    /// `progress(done, total)` is called after each measured point.
    ///
    /// Gantree: run(cancel, progress) -> Result<OptimizationResult> // 스윕 실행
    pub fn run<P>(&self, cancel: &CancelToken, mut progress: P) -> QroResult<OptimizationResult>
    where
        P: FnMut(usize, usize),
    {
        self.config.validate().map_err(QroError::InvalidConfig)?;
        let start = Instant::now();
        let axes = self.config.axes();
        let [nl, ng, nf] = axes.shape();
        let total = axes.total_points();

        log::info!(
            "Readout sweep on {}: {} points, {} shots per state",
            self.instrument.name(),
            total,
            self.config.shots
        );

        let mut fid_array: FidelityGrid = vec![vec![vec![None; nf]; ng]; nl];
        let mut best: Option<(OptimalPoint, ClassificationResult)> = None;
        let mut done = 0;
        let mut cancelled = false;

        'sweep: for l in 0..nl {
            for g in 0..ng {
                for f in 0..nf {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        break 'sweep;
                    }
                    let index = [l, g, f];
                    let params = axes.params_at(index).ok_or_else(|| {
                        QroError::InternalError(format!("grid index {:?} out of range", index))
                    })?;

                    let result = self.measure(&params)?;
                    log::debug!("Sweep point {}: fidelity={:.4}", params, result.fidelity);
                    fid_array[l][g][f] = Some(result.fidelity);

                    if best
                        .as_ref()
                        .map_or(true, |(p, _)| result.fidelity > p.fidelity)
                    {
                        let point = OptimalPoint {
                            params,
                            fidelity: result.fidelity,
                            index,
                        };
                        best = Some((point, result));
                    }

                    done += 1;
                    progress(done, total);
                }
            }
        }

        if cancelled {
            log::warn!("Readout sweep cancelled after {}/{} points", done, total);
        }

        let (optimum, best_result) = match best {
            Some((point, result)) => (Some(point), Some(result)),
            None => (None, None),
        };

        let result = OptimizationResult {
            axes,
            fid_array,
            optimum,
            best_result,
            metrics: SweepMetrics {
                total_time_ms: start.elapsed().as_millis() as u64,
                points_measured: done,
                total_shots: (done * 2 * self.config.shots) as u64,
                cancelled,
            },
        };

        if let Some(optimum) = &result.optimum {
            log::info!(
                "Readout optimum: {} (fidelity {:.4})",
                optimum.params,
                optimum.fidelity
            );
        }

        if !cancelled {
            if let Some((cache, qubit)) = &self.publish {
                if let Some(cal) = result.to_calibration(qubit) {
                    cache.set(cal);
                }
            }
        }

        Ok(result)
    }

    /// Adopt the optimum as the current readout setting
    /// Gantree: update_result(result) -> Option<ReadoutParams> // 결과 적용
    pub fn update_result(&mut self, result: &OptimizationResult) -> Option<ReadoutParams> {
        let params = result.best_params()?;
        log::info!("Readout parameters updated: {}", params);
        self.current = Some(params);
        Some(params)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qro_backend::SimulatedReadout;

    fn small_sweep() -> SweepConfig {
        SweepConfig::full(7000.0)
            .with_freq(8.0, 5)
            .with_gain(0.1, 0.3, 3)
            .with_length(0.1, 0.3, 3)
            .with_shots(4000)
    }

    fn optimizer(config: SweepConfig) -> ReadoutOptimizer<SimulatedReadout> {
        let sim = SimulatedReadout::new(ReadoutParams::new(7000.0, 0.2, 0.2)).with_seed(5);
        ReadoutOptimizer::new(Arc::new(sim), config)
    }

    #[test]
    fn test_grid_argmax_first_max() {
        let grid = vec![vec![vec![Some(0.5), None, Some(0.9)], vec![Some(0.9), Some(0.1), None]]];
        assert_eq!(grid_argmax(&grid), Some(([0, 0, 2], 0.9)));
        assert_eq!(grid_argmax(&vec![vec![vec![None]]]), None);
    }

    #[test]
    fn test_finds_simulator_optimum() {
        let mut calls = 0;
        let mut opt = optimizer(small_sweep());
        let result = opt.run(&CancelToken::new(), |_, _| calls += 1).unwrap();

        assert_eq!(calls, 45);
        assert_eq!(result.metrics.points_measured, 45);
        assert!(!result.cancelled());

        let optimum = result.optimum.clone().unwrap();
        assert_eq!(optimum.index, [1, 1, 2]);
        assert_relative_eq!(optimum.params.frequency_mhz, 7000.0);
        assert_relative_eq!(optimum.params.gain, 0.2, epsilon = 1e-12);
        assert_relative_eq!(optimum.params.length_us, 0.2, epsilon = 1e-12);
        assert_eq!(
            grid_argmax(&result.fid_array).map(|(i, _)| i),
            Some(optimum.index)
        );

        assert_eq!(opt.update_result(&result), Some(optimum.params));
        assert_eq!(opt.current_params(), Some(optimum.params));
    }

    #[test]
    fn test_disabled_axes_collapse() {
        let config = SweepConfig::frequency_only(7000.0)
            .with_freq(4.0, 3)
            .fixed_gain(0.25)
            .with_shots(200);
        let result = optimizer(config).run(&CancelToken::new(), |_, _| {}).unwrap();

        assert_eq!(result.axes.shape(), [1, 1, 3]);
        assert_eq!(result.fid_array.len(), 1);
        let best = result.best_params().unwrap();
        assert_eq!(best.gain, 0.25);

        let restored = OptimizationResult::from_json(&result.to_json().unwrap()).unwrap();
        let (a, b) = (restored.optimum.unwrap(), result.optimum.unwrap());
        assert_eq!(a.index, b.index);
        assert_relative_eq!(a.fidelity, b.fidelity, epsilon = 1e-12);
        assert_eq!(restored.metrics.points_measured, 3);
    }

    #[test]
    fn test_cancel_mid_sweep() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let cache = CalibrationCache::default();

        let result = optimizer(small_sweep().with_shots(100))
            .with_calibration_cache(cache.clone(), "Q1")
            .run(&cancel, move |done, _| {
                if done == 3 {
                    trigger.cancel();
                }
            })
            .unwrap();

        assert!(result.cancelled());
        assert_eq!(result.metrics.points_measured, 3);
        let measured = result
            .fid_array
            .iter()
            .flatten()
            .flatten()
            .filter(|v| v.is_some())
            .count();
        assert_eq!(measured, 3);
        assert!(result.optimum.is_some());
        assert!(cache.get("Q1").is_none());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut opt = optimizer(small_sweep());
        let result = opt.run(&cancel, |_, _| {}).unwrap();

        assert!(result.cancelled());
        assert!(result.optimum.is_none());
        assert!(result.to_calibration("Q0").is_none());
        assert_eq!(opt.update_result(&result), None);
    }

    #[test]
    fn test_publishes_optimum() {
        let cache = CalibrationCache::default();
        let config = SweepConfig::frequency_only(7000.0)
            .with_freq(4.0, 3)
            .with_shots(500);
        let result = optimizer(config)
            .with_calibration_cache(cache.clone(), "Q2")
            .run(&CancelToken::new(), |_, _| {})
            .unwrap();

        let cal = cache.get("Q2").unwrap();
        assert_eq!(cal.params, result.best_params());
        assert_eq!(cal.fidelity, result.optimum.unwrap().fidelity);
    }

    #[test]
    fn test_invalid_config() {
        let err = optimizer(small_sweep().with_shots(0))
            .run(&CancelToken::new(), |_, _| {})
            .unwrap_err();
        assert!(matches!(err, QroError::InvalidConfig(_)));
    }
}
