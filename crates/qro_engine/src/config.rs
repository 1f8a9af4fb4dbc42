//! Engine configuration
//!
//! Gantree: L5_Engine → EngineConfig
//!
//! Typed settings for the averaging loop, the single-shot runner and the
//! readout-parameter sweep.

use qro_core::{acquisition, readout, sweep, ReadoutParams};
use qro_readout::ReadoutConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// AveragingConfig
// ============================================================================

/// Averaging loop settings
/// Gantree: AveragingConfig // 평균 설정
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragingConfig {
    /// Software averages (rounds)
    pub rounds: usize,

    /// Pause after each round, in milliseconds
    pub yield_interval_ms: u64,
}

impl AveragingConfig {
    /// Create with `rounds` and the default yield interval
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            yield_interval_ms: acquisition::YIELD_INTERVAL_MS,
        }
    }

    /// Set rounds
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set yield interval
    pub fn with_yield_interval_ms(mut self, ms: u64) -> Self {
        self.yield_interval_ms = ms;
        self
    }

    /// Yield interval as a duration
    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.yield_interval_ms > 60_000 {
            return Err(format!(
                "yield_interval_ms must be <= 60000, got {}",
                self.yield_interval_ms
            ));
        }
        Ok(())
    }
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self::new(acquisition::DEFAULT_ROUNDS)
    }
}

impl fmt::Display for AveragingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AveragingConfig(rounds={}, yield={}ms)",
            self.rounds, self.yield_interval_ms
        )
    }
}

// ============================================================================
// SingleShotConfig
// ============================================================================

/// Single-shot experiment settings
/// Gantree: SingleShotConfig // 단일 샷 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleShotConfig {
    /// Shots per prepared state
    pub shots: usize,

    /// Also prepare the second excited state
    pub include_f: bool,

    /// Readout pulse parameters
    pub params: ReadoutParams,

    /// Analysis settings for interactive runs
    pub readout: ReadoutConfig,
}

impl SingleShotConfig {
    /// g/e experiment with default parameters
    pub fn ge() -> Self {
        Self {
            shots: readout::DEFAULT_SHOTS,
            include_f: false,
            params: ReadoutParams::default(),
            readout: ReadoutConfig::standard(),
        }
    }

    /// g/e/f experiment
    pub fn gef() -> Self {
        Self {
            include_f: true,
            ..Self::ge()
        }
    }

    /// Set shots
    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    /// Set readout parameters
    pub fn with_params(mut self, params: ReadoutParams) -> Self {
        self.params = params;
        self
    }

    /// Set analysis config
    pub fn with_readout(mut self, readout: ReadoutConfig) -> Self {
        self.readout = readout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.shots == 0 {
            return Err("shots must be > 0".to_string());
        }
        self.params.validate().map_err(|e| e.to_string())?;
        self.readout.validate()
    }
}

impl Default for SingleShotConfig {
    fn default() -> Self {
        Self::ge()
    }
}

impl fmt::Display for SingleShotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SingleShotConfig({}, shots={}, {})",
            if self.include_f { "gef" } else { "ge" },
            self.shots,
            self.params
        )
    }
}

// ============================================================================
// SweepConfig
// ============================================================================

/// Grid axes of a readout sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxes {
    /// Readout lengths (µs), outermost
    pub length: Vec<f64>,
    /// Readout gains
    pub gain: Vec<f64>,
    /// Readout frequencies (MHz), innermost
    pub freq: Vec<f64>,
}

impl SweepAxes {
    /// Grid shape `[length, gain, freq]`
    pub fn shape(&self) -> [usize; 3] {
        [self.length.len(), self.gain.len(), self.freq.len()]
    }

    /// Number of grid points
    pub fn total_points(&self) -> usize {
        self.length.len() * self.gain.len() * self.freq.len()
    }

    /// Parameters at grid index `[l, g, f]`
    pub fn params_at(&self, index: [usize; 3]) -> Option<ReadoutParams> {
        Some(ReadoutParams::new(
            *self.freq.get(index[2])?,
            *self.gain.get(index[1])?,
            *self.length.get(index[0])?,
        ))
    }
}

/// Readout-parameter sweep settings
///
/// A disabled axis collapses to one value: the frequency centre, or the
/// default gain / length.
///
/// Gantree: SweepConfig // 스윕 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Sweep frequency
    pub sweep_freq: bool,
    /// Frequency centre (MHz)
    pub freq_center: f64,
    /// Frequency span (MHz)
    pub freq_span: f64,
    /// Frequency steps
    pub freq_steps: usize,

    /// Sweep gain
    pub sweep_gain: bool,
    /// First gain
    pub gain_start: f64,
    /// Last gain
    pub gain_stop: f64,
    /// Gain steps
    pub gain_steps: usize,
    /// Gain used when not swept
    pub default_gain: f64,

    /// Sweep length
    pub sweep_length: bool,
    /// First length (µs)
    pub length_start: f64,
    /// Last length (µs)
    pub length_stop: f64,
    /// Length steps
    pub length_steps: usize,
    /// Length used when not swept
    pub default_length: f64,

    /// Shots per state per grid point
    pub shots: usize,

    /// Analysis settings at each point
    pub readout: ReadoutConfig,
}

impl SweepConfig {
    /// Full three-axis sweep around `freq_center`
    pub fn full(freq_center: f64) -> Self {
        Self {
            sweep_freq: true,
            freq_center,
            freq_span: sweep::FREQ_SPAN_MHZ,
            freq_steps: sweep::FREQ_STEPS,
            sweep_gain: true,
            gain_start: sweep::GAIN_START,
            gain_stop: sweep::GAIN_STOP,
            gain_steps: sweep::GAIN_STEPS,
            default_gain: readout::DEFAULT_GAIN,
            sweep_length: true,
            length_start: sweep::LENGTH_START_US,
            length_stop: sweep::LENGTH_STOP_US,
            length_steps: sweep::LENGTH_STEPS,
            default_length: readout::DEFAULT_LENGTH_US,
            shots: sweep::SHOTS_PER_POINT,
            readout: ReadoutConfig::autorun(),
        }
    }

    /// Frequency-only sweep
    pub fn frequency_only(freq_center: f64) -> Self {
        Self {
            sweep_gain: false,
            sweep_length: false,
            ..Self::full(freq_center)
        }
    }

    /// Set frequency axis
    pub fn with_freq(mut self, span: f64, steps: usize) -> Self {
        self.sweep_freq = true;
        self.freq_span = span;
        self.freq_steps = steps;
        self
    }

    /// Set gain axis
    pub fn with_gain(mut self, start: f64, stop: f64, steps: usize) -> Self {
        self.sweep_gain = true;
        self.gain_start = start;
        self.gain_stop = stop;
        self.gain_steps = steps;
        self
    }

    /// Set length axis
    pub fn with_length(mut self, start: f64, stop: f64, steps: usize) -> Self {
        self.sweep_length = true;
        self.length_start = start;
        self.length_stop = stop;
        self.length_steps = steps;
        self
    }

    /// Disable the gain axis, holding `gain`
    pub fn fixed_gain(mut self, gain: f64) -> Self {
        self.sweep_gain = false;
        self.default_gain = gain;
        self
    }

    /// Disable the length axis, holding `length_us`
    pub fn fixed_length(mut self, length_us: f64) -> Self {
        self.sweep_length = false;
        self.default_length = length_us;
        self
    }

    /// Set shots per point
    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    /// Grid axes
    /// Gantree: axes() -> SweepAxes // 축 생성
    pub fn axes(&self) -> SweepAxes {
        let freq = if self.sweep_freq {
            readout::linspace(
                self.freq_center - self.freq_span / 2.0,
                self.freq_center + self.freq_span / 2.0,
                self.freq_steps,
            )
        } else {
            vec![self.freq_center]
        };
        let gain = if self.sweep_gain {
            readout::linspace(self.gain_start, self.gain_stop, self.gain_steps)
        } else {
            vec![self.default_gain]
        };
        let length = if self.sweep_length {
            readout::linspace(self.length_start, self.length_stop, self.length_steps)
        } else {
            vec![self.default_length]
        };
        SweepAxes { length, gain, freq }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.shots == 0 {
            return Err("shots must be > 0".to_string());
        }
        if self.sweep_freq && self.freq_steps == 0 {
            return Err("freq_steps must be > 0".to_string());
        }
        if self.sweep_gain && self.gain_steps == 0 {
            return Err("gain_steps must be > 0".to_string());
        }
        if self.sweep_length && self.length_steps == 0 {
            return Err("length_steps must be > 0".to_string());
        }
        if !self.freq_center.is_finite() || self.freq_center <= 0.0 {
            return Err(format!(
                "freq_center must be positive, got {}",
                self.freq_center
            ));
        }
        let axes = self.axes();
        if axes.gain.iter().any(|g| !(0.0..=1.0).contains(g)) {
            return Err("gains must lie in [0, 1]".to_string());
        }
        if axes.length.iter().any(|l| !(*l > 0.0)) {
            return Err("lengths must be positive".to_string());
        }
        self.readout.validate()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::full(readout::DEFAULT_FREQUENCY_MHZ)
    }
}

impl fmt::Display for SweepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [l, g, fr] = self.axes().shape();
        write!(
            f,
            "SweepConfig({}x{}x{} points, {} shots)",
            l, g, fr, self.shots
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_averaging_defaults() {
        let config = AveragingConfig::default();
        assert_eq!(config.rounds, acquisition::DEFAULT_ROUNDS);
        assert_eq!(config.yield_interval(), Duration::from_millis(1));
        assert!(config.validate().is_ok());
        assert!(config.with_yield_interval_ms(120_000).validate().is_err());
    }

    #[test]
    fn test_single_shot_presets() {
        assert!(!SingleShotConfig::ge().include_f);
        assert!(SingleShotConfig::gef().include_f);
        assert!(SingleShotConfig::default().validate().is_ok());
        assert!(SingleShotConfig::ge().with_shots(0).validate().is_err());

        let bad = SingleShotConfig::ge().with_params(ReadoutParams::new(7000.0, 2.0, 0.2));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_full_sweep_axes() {
        let axes = SweepConfig::full(7000.0).axes();

        assert_eq!(axes.shape(), [7, 7, 11]);
        assert_eq!(axes.total_points(), 539);
        assert_relative_eq!(axes.freq[0], 6995.0);
        assert_relative_eq!(axes.freq[10], 7005.0);
        assert_relative_eq!(axes.gain[0], 0.05);
        assert_relative_eq!(axes.length[6], 0.3);
    }

    #[test]
    fn test_disabled_axes_collapse() {
        let config = SweepConfig::frequency_only(6500.0).with_freq(4.0, 5);
        let axes = config.axes();

        assert_eq!(axes.shape(), [1, 1, 5]);
        assert_relative_eq!(axes.gain[0], readout::DEFAULT_GAIN);
        assert_relative_eq!(axes.length[0], readout::DEFAULT_LENGTH_US);

        let p = axes.params_at([0, 0, 2]).unwrap();
        assert_relative_eq!(p.frequency_mhz, 6500.0);
        assert!(axes.params_at([1, 0, 0]).is_none());
    }

    #[test]
    fn test_sweep_validation() {
        assert!(SweepConfig::default().validate().is_ok());
        assert!(SweepConfig::default().with_shots(0).validate().is_err());
        assert!(SweepConfig::default()
            .with_gain(0.1, 1.5, 3)
            .validate()
            .is_err());
        assert!(SweepConfig::default()
            .with_length(0.0, 0.3, 3)
            .validate()
            .is_err());
    }

    #[test]
    fn test_display() {
        let s = SweepConfig::frequency_only(7000.0).to_string();
        assert!(s.contains("1x1x11"));
    }
}
