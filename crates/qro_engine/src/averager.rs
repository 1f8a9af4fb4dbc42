//! Incremental averaging acquisition loop
//!
//! Gantree: L5_Engine → Averager
//!
//! Acquires one round at a time on the blocking pool, keeps a running
//! complex average and reports it to an observer after every round. A stop
//! request is honoured at round boundaries and keeps the partial average;
//! an acquisition error aborts the loop and drops it.

use crate::config::AveragingConfig;
use crate::progress::{AveragingObserver, ProgressTracker};
use num_complex::Complex64;
use qro_backend::RoundSource;
use qro_core::{QroError, QroResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// RunningAverage
// ============================================================================

/// Complex accumulator; average = sum / rounds
/// Gantree: RunningAverage // 누적 평균
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningAverage {
    sum: Vec<Complex64>,
    rounds: usize,
}

impl RunningAverage {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one round; every round must have the first round's length
    /// Gantree: accumulate(round) -> Result<()> // 누적
    pub fn accumulate(&mut self, round: &[Complex64]) -> QroResult<()> {
        if self.rounds == 0 {
            self.sum = round.to_vec();
        } else if round.len() != self.sum.len() {
            return Err(QroError::RoundSizeMismatch {
                round: self.rounds + 1,
                expected: self.sum.len(),
                got: round.len(),
            });
        } else {
            for (s, z) in self.sum.iter_mut().zip(round) {
                *s += *z;
            }
        }
        self.rounds += 1;
        Ok(())
    }

    /// Rounds accumulated
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Whether nothing was accumulated
    pub fn is_empty(&self) -> bool {
        self.rounds == 0
    }

    /// Current average, `None` before the first round
    pub fn average(&self) -> Option<Vec<Complex64>> {
        if self.rounds == 0 {
            return None;
        }
        let n = self.rounds as f64;
        Some(self.sum.iter().map(|s| *s / n).collect())
    }

    /// `|average|`
    pub fn magnitude(&self) -> Option<Vec<f64>> {
        self.average()
            .map(|avg| avg.iter().map(|z| z.norm()).collect())
    }

    /// Consume into the average
    pub fn into_average(self) -> Option<Vec<Complex64>> {
        self.average()
    }
}

// ============================================================================
// LoopState / AveragingOutcome
// ============================================================================

/// Loop state machine: `Idle → Acquiring → {Completed | Interrupted}`
/// Gantree: LoopState // 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Not started
    Idle,
    /// Rounds in progress
    Acquiring,
    /// All rounds done
    Completed,
    /// Stopped early or never acquired
    Interrupted,
}

impl LoopState {
    /// Whether the loop has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Completed | LoopState::Interrupted)
    }
}

/// Result of one averaging run
/// Gantree: AveragingOutcome // 평균 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragingOutcome {
    /// Final (or partial) average; `None` when no round completed
    pub average: Option<Vec<Complex64>>,
    /// Rounds completed
    pub rounds_completed: usize,
    /// Rounds requested
    pub total_rounds: usize,
    /// Stopped before `total_rounds`, or produced nothing
    pub interrupted: bool,
    /// Terminal state
    pub state: LoopState,
}

impl AveragingOutcome {
    /// `|average|`
    pub fn magnitude(&self) -> Option<Vec<f64>> {
        self.average
            .as_ref()
            .map(|avg| avg.iter().map(|z| z.norm()).collect())
    }

    /// Whether an average is available
    pub fn has_data(&self) -> bool {
        self.average.is_some()
    }
}

impl fmt::Display for AveragingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AveragingOutcome({:?}, {}/{} rounds)",
            self.state, self.rounds_completed, self.total_rounds
        )
    }
}

// ============================================================================
// Averager
// ============================================================================

/// Incremental averaging loop over a round source
/// Gantree: Averager // 평균 루프
pub struct Averager<S: RoundSource + 'static> {
    source: Arc<S>,
    config: AveragingConfig,
}

impl<S: RoundSource + 'static> Averager<S> {
    /// Create loop over `source`
    pub fn new(source: Arc<S>, config: AveragingConfig) -> Self {
        Self { source, config }
    }

    /// Configuration
    pub fn config(&self) -> &AveragingConfig {
        &self.config
    }

    /// Round source
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Run all rounds, reporting to `observer`
    ///
    /// Per round: poll `should_stop`, acquire on the blocking pool,
    /// accumulate, then `on_plot`, `on_progress` and a short sleep.
    ///
    /// Gantree: run(observer) -> Result<AveragingOutcome> // 실행
    pub async fn run<O>(&self, observer: &mut O) -> QroResult<AveragingOutcome>
    where
        O: AveragingObserver + ?Sized,
    {
        self.config.validate().map_err(QroError::InvalidConfig)?;

        let total = self.config.rounds;
        let mut state = LoopState::Idle;
        let mut running = RunningAverage::new();
        let mut tracker = ProgressTracker::new(total);
        let mut stopped = false;

        log::info!(
            "Averaging {} rounds from '{}'",
            total,
            self.source.name()
        );

        for _ in 0..total {
            if observer.should_stop() {
                stopped = true;
                break;
            }
            if state == LoopState::Idle {
                state = LoopState::Acquiring;
                log::debug!("Averaging state: {:?}", state);
            }

            let source = Arc::clone(&self.source);
            let buffer = tokio::task::spawn_blocking(move || source.acquire_round())
                .await
                .map_err(|e| QroError::InternalError(format!("acquisition task failed: {}", e)))?
                .map_err(|e| {
                    log::warn!(
                        "Averaging aborted after {} rounds: {}",
                        running.rounds(),
                        e
                    );
                    e
                })?;

            running.accumulate(&buffer.to_complex())?;
            tracker.tick();

            if let Some(magnitude) = running.magnitude() {
                observer.on_plot(&magnitude, running.rounds());
            }
            observer.on_progress(tracker.done(), total, tracker.eta());

            tokio::time::sleep(self.config.yield_interval()).await;
        }
        tracker.finish();

        let rounds_completed = running.rounds();
        let interrupted = stopped || rounds_completed == 0;
        state = if interrupted {
            LoopState::Interrupted
        } else {
            LoopState::Completed
        };

        let outcome = AveragingOutcome {
            average: running.into_average(),
            rounds_completed,
            total_rounds: total,
            interrupted,
            state,
        };

        log::info!("{}", outcome);
        observer.on_complete(&outcome);
        Ok(outcome)
    }
}

// ============================================================================
// Tests
// ============================================================================
