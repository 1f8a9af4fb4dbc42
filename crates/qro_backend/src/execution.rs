//! Instrument contracts
//!
//! Gantree: L3_Backend → InstrumentTrait
//!
//! The instrument is an external collaborator: it prepares a state, fires
//! the readout pulse and hands back raw IQ buffers. Nothing here knows
//! about the wire protocol behind it.

use num_complex::Complex64;
use qro_core::{PreparedState, QroError, QroResult, ReadoutParams, StateSample};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IqBuffer
// ============================================================================

/// One round of IQ data, one entry per sweep point
/// Gantree: IqBuffer // IQ 버퍼
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqBuffer {
    i: Vec<f64>,
    q: Vec<f64>,
}

impl IqBuffer {
    /// Create buffer; I and Q must have equal length
    pub fn new(i: Vec<f64>, q: Vec<f64>) -> QroResult<Self> {
        if i.len() != q.len() {
            return Err(QroError::LengthMismatch {
                label: "round".to_string(),
                i_len: i.len(),
                q_len: q.len(),
            });
        }
        Ok(Self { i, q })
    }

    /// In-phase component
    pub fn i(&self) -> &[f64] {
        &self.i
    }

    /// Quadrature component
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.i.len()
    }

    /// Whether the buffer holds no points
    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }

    /// Combine as `I·1 + Q·1j`
    /// Gantree: to_complex() -> Vec<Complex64> // 복소 변환
    pub fn to_complex(&self) -> Vec<Complex64> {
        self.i
            .iter()
            .zip(&self.q)
            .map(|(&i, &q)| Complex64::new(i, 0.0) + Complex64::new(0.0, q))
            .collect()
    }
}

impl fmt::Display for IqBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IqBuffer(points={})", self.len())
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Source of averaging rounds
///
/// `acquire_round` blocks until the instrument returns one full round.
///
/// Gantree: RoundSource // 라운드 획득
pub trait RoundSource: Send + Sync {
    /// Source name
    fn name(&self) -> &str {
        "round_source"
    }

    /// Acquire one round
    /// Gantree: acquire_round() -> Result<IqBuffer> // 블로킹 획득
    fn acquire_round(&self) -> QroResult<IqBuffer>;
}

/// Single-shot readout instrument
/// Gantree: InstrumentTrait // 단일 샷 획득
pub trait Instrument: Send + Sync {
    /// Instrument name
    fn name(&self) -> &str;

    /// Prepare `state` and record `shots` single-shot IQ points
    /// Gantree: acquire_shots(state, shots, params) -> Result<StateSample>
    fn acquire_shots(
        &self,
        state: PreparedState,
        shots: usize,
        params: &ReadoutParams,
    ) -> QroResult<StateSample>;

    /// Acquire several prepared states with the same parameters
    fn acquire_states(
        &self,
        states: &[PreparedState],
        shots: usize,
        params: &ReadoutParams,
    ) -> QroResult<Vec<StateSample>> {
        states
            .iter()
            .map(|&s| self.acquire_shots(s, shots, params))
            .collect()
    }

    /// Whether the instrument is simulated
    fn is_simulator(&self) -> bool {
        true
    }

    /// Maximum shots per acquisition
    fn max_shots(&self) -> usize {
        100_000
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
    fn test_buffer_length_mismatch() {
        let err = IqBuffer::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_to_complex() {
        let buf = IqBuffer::new(vec![1.0, -2.0], vec![3.0, 0.5]).unwrap();
        let z = buf.to_complex();

        assert_eq!(z.len(), 2);
        assert_relative_eq!(z[0].re, 1.0);
        assert_relative_eq!(z[0].im, 3.0);
        assert_relative_eq!(z[1].re, -2.0);
        assert_relative_eq!(z[1].im, 0.5);
        assert_relative_eq!(z[0].norm(), 10.0_f64.sqrt());
    }

    #[test]
    fn test_empty_buffer() {
        let buf = IqBuffer::new(vec![], vec![]).unwrap();
        assert!(buf.is_empty());
        assert!(buf.to_complex().is_empty());
        assert_eq!(buf.to_string(), "IqBuffer(points=0)");
    }

    struct Fixed;

    impl Instrument for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn acquire_shots(
            &self,
            state: PreparedState,
            shots: usize,
            _params: &ReadoutParams,
        ) -> QroResult<StateSample> {
            StateSample::new(state.label(), vec![1.0; shots], vec![0.0; shots])
        }
    }

    #[test]
    fn test_acquire_states_default() {
        let samples = Fixed
            .acquire_states(
                &[PreparedState::G, PreparedState::E],
                4,
                &ReadoutParams::default(),
            )
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].label().name, "e");
        assert_eq!(samples[0].len(), 4);
    }
}
