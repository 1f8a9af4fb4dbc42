//! Constants for QRO
//!
//! Gantree: L0_Foundation → Constants
//!
//! Readout defaults, fit tolerances, acquisition timing and optimizer sweep
//! ranges.

// ============================================================================
// Readout Constants
// Gantree: readout // 리드아웃 상수
// ============================================================================

pub mod readout {
    //! Histogram and readout-pulse defaults

    /// Histogram bin count used when none is given
    /// Gantree: DEFAULT_NUM_BINS: usize = 200
    pub const DEFAULT_NUM_BINS: usize = 200;

    /// Ground centroid used when no ground shots exist
    /// Gantree: DEFAULT_GROUND_CENTROID: (f64,f64) = (0,0)
    pub const DEFAULT_GROUND_CENTROID: (f64, f64) = (0.0, 0.0);

    /// Excited centroid used when no excited shots exist
    /// Gantree: DEFAULT_EXCITED_CENTROID: (f64,f64) = (1,1)
    pub const DEFAULT_EXCITED_CENTROID: (f64, f64) = (1.0, 1.0);

    /// Default readout frequency (MHz)
    pub const DEFAULT_FREQUENCY_MHZ: f64 = 7000.0;

    /// Default readout gain (DAC units)
    pub const DEFAULT_GAIN: f64 = 0.2;

    /// Default readout length (µs)
    pub const DEFAULT_LENGTH_US: f64 = 0.2;

    /// Default shots per prepared state
    /// Gantree: DEFAULT_SHOTS: usize = 5000
    pub const DEFAULT_SHOTS: usize = 5000;

    /// Convert degrees to radians
    #[inline]
    pub fn deg_to_rad(deg: f64) -> f64 {
        deg * std::f64::consts::PI / 180.0
    }

    /// Convert radians to degrees
    #[inline]
    pub fn rad_to_deg(rad: f64) -> f64 {
        rad * 180.0 / std::f64::consts::PI
    }

    /// Evenly spaced points including both ends
    /// Gantree: linspace(start,stop,n) -> Vec<f64>
    pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (n - 1) as f64;
                (0..n)
                    .map(|k| if k == n - 1 { stop } else { start + step * k as f64 })
                    .collect()
            }
        }
    }
}

// ============================================================================
// Fit Constants
// Gantree: fit // 피팅 상수
// ============================================================================

pub mod fit {
    //! Mixture fit seeds and least-squares tolerances

    /// Seed width = peak separation / SEED_WIDTH_DIVISOR
    pub const SEED_WIDTH_DIVISOR: f64 = 5.0;

    /// Seed width below which the range-based floor is used
    /// Gantree: MIN_SEED_WIDTH: f64 = 1e-3
    pub const MIN_SEED_WIDTH: f64 = 1e-3;

    /// Floor width = range / SEED_RANGE_DIVISOR
    pub const SEED_RANGE_DIVISOR: f64 = 20.0;

    /// Secondary amplitude seed for the ground state
    pub const GROUND_LEAKAGE_SEED: f64 = 0.1;

    /// Secondary amplitude seed for the excited state
    pub const EXCITED_LEAKAGE_SEED: f64 = 0.2;

    /// Maximum Levenberg–Marquardt iterations
    /// Gantree: MAX_ITERATIONS: usize = 200
    pub const MAX_ITERATIONS: usize = 200;

    /// Relative reduction in cost treated as converged
    pub const FTOL: f64 = 1.49e-8;

    /// Relative parameter step treated as converged
    pub const XTOL: f64 = 1.49e-8;

    /// Initial damping factor
    pub const INITIAL_LAMBDA: f64 = 1e-3;

    /// Damping above which no further descent is possible
    pub const MAX_LAMBDA: f64 = 1e12;

    /// Damping floor
    pub const MIN_LAMBDA: f64 = 1e-12;

    /// Smallest diagonal scale, relative to the largest, used for damping
    pub const DAMPING_FLOOR: f64 = 1e-9;

    /// Relative step for the numeric Jacobian
    pub const JACOBIAN_STEP: f64 = 1.49e-8;

    /// Largest scaled gradient cosine treated as converged
    pub const GTOL: f64 = 1e-10;

    /// Smallest ratio of actual to predicted reduction for an accepted step
    pub const MIN_GAIN_RATIO: f64 = 1e-4;

    /// Integration half-window in widths for overlap fidelity
    /// Gantree: OVERLAP_WINDOW_SIGMAS: f64 = 5.0
    pub const OVERLAP_WINDOW_SIGMAS: f64 = 5.0;

    /// Adaptive Simpson tolerance
    pub const QUADRATURE_TOL: f64 = 1e-10;

    /// Adaptive Simpson recursion limit
    pub const QUADRATURE_MAX_DEPTH: usize = 50;
}

// ============================================================================
// Acquisition Constants
// Gantree: acquisition // 획득 상수
// ============================================================================

pub mod acquisition {
    //! Averaging loop defaults

    /// Default number of averaging rounds
    /// Gantree: DEFAULT_ROUNDS: usize = 10
    pub const DEFAULT_ROUNDS: usize = 10;

    /// Yield interval after each round (milliseconds)
    /// Gantree: YIELD_INTERVAL_MS: u64 = 1
    pub const YIELD_INTERVAL_MS: u64 = 1;

    /// Default points per sweep round
    pub const DEFAULT_SWEEP_POINTS: usize = 101;
}

// ============================================================================
// Sweep Constants
// Gantree: sweep // 최적화 스윕 상수
// ============================================================================

pub mod sweep {
    //! Readout optimizer grid defaults

    /// Frequency span around the centre (MHz)
    pub const FREQ_SPAN_MHZ: f64 = 10.0;

    /// Frequency steps
    pub const FREQ_STEPS: usize = 11;

    /// Gain start
    pub const GAIN_START: f64 = 0.05;

    /// Gain stop
    pub const GAIN_STOP: f64 = 0.4;

    /// Gain steps
    pub const GAIN_STEPS: usize = 7;

    /// Length start (µs)
    pub const LENGTH_START_US: f64 = 0.1;

    /// Length stop (µs)
    pub const LENGTH_STOP_US: f64 = 0.3;

    /// Length steps
    pub const LENGTH_STEPS: usize = 7;

    /// Shots per grid point
    /// Gantree: SHOTS_PER_POINT: usize = 1000
    pub const SHOTS_PER_POINT: usize = 1000;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deg_rad_conversion() {
        assert!((readout::deg_to_rad(180.0) - std::f64::consts::PI).abs() < 1e-12);
        assert!((readout::rad_to_deg(readout::deg_to_rad(37.5)) - 37.5).abs() < 1e-12);
    }

    #[test]
    fn test_linspace() {
        let v = readout::linspace(0.05, 0.4, sweep::GAIN_STEPS);
        assert_eq!(v.len(), 7);
        assert!((v[0] - 0.05).abs() < 1e-12);
        assert_eq!(v[6], 0.4);
        assert!(((v[1] - v[0]) - (v[6] - v[5])).abs() < 1e-12);

        assert_eq!(readout::linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(readout::linspace(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn test_seed_floor_below_divisor() {
        assert!(fit::MIN_SEED_WIDTH < 1.0 / fit::SEED_RANGE_DIVISOR);
    }
}
