//! Simulated readout hardware
//!
//! Gantree: L3_Backend → SimulatedReadout, SimulatedSweep
//!
//! Synthetic IQ clouds for single-shot work and synthetic resonator rounds
//! for the averaging loop, so the stack runs without an instrument.

use crate::execution::{Instrument, IqBuffer, RoundSource};
use num_complex::Complex64;
use qro_core::{
    acquisition, readout, PreparedState, QroError, QroResult, ReadoutParams, StateSample,
};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, StandardNormal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn make_rng(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

// ============================================================================
// SimulatedReadout
// ============================================================================

/// Gaussian IQ clouds whose separation depends on the readout parameters
///
/// Separation peaks at `optimum` and falls off as a Gaussian in each of
/// frequency, gain and length. The excited cloud sits `separation` away
/// from ground along `phase`; the second excited state sits twice as far.
///
/// Gantree: SimulatedReadout // 단일 샷 시뮬레이터
pub struct SimulatedReadout {
    name: String,
    ground: (f64, f64),
    phase: f64,
    max_separation: f64,
    sigma: f64,
    optimum: ReadoutParams,
    widths: ReadoutParams,
    seed: Option<u64>,
    rng: Mutex<StdRng>,
}

impl SimulatedReadout {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create simulator peaked at `optimum`
    pub fn new(optimum: ReadoutParams) -> Self {
        Self {
            name: "qro_simulator".to_string(),
            ground: (-2.0, 1.0),
            phase: readout::deg_to_rad(30.0),
            max_separation: 6.0,
            sigma: 1.0,
            optimum,
            widths: ReadoutParams::new(2.0, 0.15, 0.1),
            seed: None,
            rng: make_rng(None),
        }
    }

    /// Set seed for reproducibility
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.rng = make_rng(Some(seed));
        self
    }

    /// Set cloud width
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set ground centroid
    pub fn with_ground(mut self, i: f64, q: f64) -> Self {
        self.ground = (i, q);
        self
    }

    /// Set the IQ direction from ground to excited (degrees)
    pub fn with_phase_deg(mut self, phase_deg: f64) -> Self {
        self.phase = readout::deg_to_rad(phase_deg);
        self
    }

    /// Set the separation reached at the optimum
    pub fn with_max_separation(mut self, separation: f64) -> Self {
        self.max_separation = separation;
        self
    }

    /// Set the fall-off widths in frequency (MHz), gain and length (µs)
    pub fn with_widths(mut self, widths: ReadoutParams) -> Self {
        self.widths = widths;
        self
    }

    /// Set instrument name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    // ========================================================================
    // Model
    // ========================================================================

    /// Seed in use, if any
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Parameters with the largest separation
    pub fn optimum(&self) -> &ReadoutParams {
        &self.optimum
    }

    /// Ground-to-excited separation at `params`
    /// Gantree: separation(params) -> f64 // 분리 거리
    pub fn separation(&self, params: &ReadoutParams) -> f64 {
        let falloff = |x: f64, x0: f64, w: f64| {
            let z = (x - x0) / w;
            (-0.5 * z * z).exp()
        };
        self.max_separation
            * falloff(
                params.frequency_mhz,
                self.optimum.frequency_mhz,
                self.widths.frequency_mhz,
            )
            * falloff(params.gain, self.optimum.gain, self.widths.gain)
            * falloff(params.length_us, self.optimum.length_us, self.widths.length_us)
    }

    /// Cloud centre for `state` at `params`
    pub fn centroid(&self, state: PreparedState, params: &ReadoutParams) -> (f64, f64) {
        let steps = match state {
            PreparedState::G => 0.0,
            PreparedState::E => 1.0,
            PreparedState::F => 2.0,
        };
        let d = steps * self.separation(params);
        (
            self.ground.0 + d * self.phase.cos(),
            self.ground.1 + d * self.phase.sin(),
        )
    }
}

impl Instrument for SimulatedReadout {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire_shots(
        &self,
        state: PreparedState,
        shots: usize,
        params: &ReadoutParams,
    ) -> QroResult<StateSample> {
        params.validate()?;
        if shots > self.max_shots() {
            return Err(QroError::InstrumentError(format!(
                "{} shots exceeds the limit of {}",
                shots,
                self.max_shots()
            )));
        }

        let (ci, cq) = self.centroid(state, params);
        let bad_sigma = |e: rand_distr::NormalError| {
            QroError::InstrumentError(format!("invalid cloud width {}: {}", self.sigma, e))
        };
        let cloud_i = Normal::new(ci, self.sigma).map_err(bad_sigma)?;
        let cloud_q = Normal::new(cq, self.sigma).map_err(bad_sigma)?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| QroError::InstrumentError("simulator RNG poisoned".to_string()))?;

        let mut i = Vec::with_capacity(shots);
        let mut q = Vec::with_capacity(shots);
        for _ in 0..shots {
            i.push(cloud_i.sample(&mut *rng));
            q.push(cloud_q.sample(&mut *rng));
        }

        log::debug!(
            "Simulated {} shots of {:?} at {}",
            shots,
            state,
            params
        );
        StateSample::new(state.label(), i, q)
    }
}

// ============================================================================
// SimulatedSweep
// ============================================================================

/// Resonator transmission sweep with additive noise
///
/// Each round returns `S21(f) = 1 − depth / (1 + 2j·(f − f0)/width)` over
/// `points` frequencies, plus independent Gaussian noise on I and Q.
///
/// Gantree: SimulatedSweep // 라운드 시뮬레이터
pub struct SimulatedSweep {
    frequencies: Vec<f64>,
    center_mhz: f64,
    linewidth_mhz: f64,
    depth: f64,
    noise: f64,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    rounds: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl SimulatedSweep {
    /// Sweep `span_mhz` around `center_mhz`
    pub fn new(center_mhz: f64, span_mhz: f64) -> Self {
        Self {
            frequencies: readout::linspace(
                center_mhz - span_mhz / 2.0,
                center_mhz + span_mhz / 2.0,
                acquisition::DEFAULT_SWEEP_POINTS,
            ),
            center_mhz,
            linewidth_mhz: span_mhz / 10.0,
            depth: 0.8,
            noise: 0.05,
            fail_after: None,
            delay: None,
            rounds: AtomicUsize::new(0),
            rng: make_rng(None),
        }
    }

    /// Number of frequency points
    pub fn with_points(mut self, points: usize) -> Self {
        let lo = self.frequencies.first().copied().unwrap_or(self.center_mhz);
        let hi = self.frequencies.last().copied().unwrap_or(self.center_mhz);
        self.frequencies = readout::linspace(lo, hi, points);
        self
    }

    /// Per-quadrature noise
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Set seed for reproducibility
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = make_rng(Some(seed));
        self
    }

    /// Fail every round after the first `rounds`
    pub fn with_failure_after(mut self, rounds: usize) -> Self {
        self.fail_after = Some(rounds);
        self
    }

    /// Block for `delay` inside each acquisition
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Swept frequencies (MHz)
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Rounds served so far
    pub fn rounds_served(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }

    /// Noise-free transmission at `f`
    pub fn transmission(&self, f: f64) -> Complex64 {
        let x = 2.0 * (f - self.center_mhz) / self.linewidth_mhz;
        Complex64::new(1.0, 0.0) - self.depth / Complex64::new(1.0, x)
    }
}

impl RoundSource for SimulatedSweep {
    fn name(&self) -> &str {
        "simulated_sweep"
    }

    fn acquire_round(&self) -> QroResult<IqBuffer> {
        let round = self.rounds.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if round >= limit {
                return Err(QroError::AcquisitionFailed(format!(
                    "simulated instrument fault at round {}",
                    round + 1
                )));
            }
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| QroError::AcquisitionFailed("simulator RNG poisoned".to_string()))?;

        let (i, q): (Vec<f64>, Vec<f64>) = self
            .frequencies
            .iter()
            .map(|&f| {
                let s = self.transmission(f);
                (
                    s.re + self.noise * rng.sample::<f64, _>(StandardNormal),
                    s.im + self.noise * rng.sample::<f64, _>(StandardNormal),
                )
            })
            .unzip();
        IqBuffer::new(i, q)
    }
}

// ============================================================================
// Tests
// ============================================================================
