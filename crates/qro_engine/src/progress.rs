//! Progress reporting and cancellation
//!
//! Gantree: L5_Engine → Progress
//!
//! Observer hooks for the averaging loop, an `indicatif`-backed rate/ETA
//! tracker and a shared cancellation flag.

use crate::averager::AveragingOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use indicatif::{ProgressBar, ProgressDrawTarget};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// CancelToken
// ============================================================================

/// Cooperative stop flag, shared by cloning
/// Gantree: CancelToken // 취소 토큰
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh token, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag for reuse
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// ProgressTracker
// ============================================================================

/// Completed-unit counter with rate and ETA, backed by a hidden `indicatif` bar
/// Gantree: ProgressTracker // 진행률
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Start tracking `total` units now
    pub fn new(total: usize) -> Self {
        Self::with_bar(ProgressBar::with_draw_target(
            Some(total as u64),
            ProgressDrawTarget::hidden(),
        ))
    }

    /// Track through an existing bar; its length is the total
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }

    /// Record one completed unit
    pub fn tick(&mut self) {
        self.bar.inc(1);
    }

    /// Completed units
    pub fn done(&self) -> usize {
        self.bar.position() as usize
    }

    /// Total units
    pub fn total(&self) -> usize {
        self.bar.length().unwrap_or(0) as usize
    }

    /// Completed fraction (0..1)
    pub fn fraction(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.done() as f64 / total as f64,
        }
    }

    /// Units per second; `None` until something completed
    pub fn rate(&self) -> Option<f64> {
        if self.done() == 0 {
            return None;
        }
        Some(self.bar.per_sec()).filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Time left at the current rate; `None` until something completed
    /// Gantree: eta() -> Option<Duration> // 남은 시간
    pub fn eta(&self) -> Option<Duration> {
        if self.done() == 0 {
            return None;
        }
        Some(self.bar.eta())
    }

    /// Mark the run finished
    pub fn finish(&self) {
        self.bar.finish();
    }
}

// ============================================================================
// AveragingObserver
// ============================================================================

/// Hooks the averaging loop calls; all are fire-and-forget
/// Gantree: AveragingObserver // 관찰자
pub trait AveragingObserver {
    /// Magnitude of the running average after `rounds` rounds
    fn on_plot(&mut self, _magnitude: &[f64], _rounds: usize) {}

    /// Progress after each round
    fn on_progress(&mut self, _done: usize, _total: usize, _eta: Option<Duration>) {}

    /// Polled before every round
    fn should_stop(&self) -> bool {
        false
    }

    /// Called once when the loop finishes without error
    fn on_complete(&mut self, _outcome: &AveragingOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AveragingObserver for NoopObserver {}

type PlotFn = Box<dyn FnMut(&[f64], usize) + Send>;
type ProgressFn = Box<dyn FnMut(usize, usize, Option<Duration>) + Send>;
type CompleteFn = Box<dyn FnMut(&AveragingOutcome) + Send>;

/// Observer assembled from closures and a cancel token
/// Gantree: CallbackObserver // 콜백 관찰자
#[derive(Default)]
pub struct CallbackObserver {
    plot: Option<PlotFn>,
    progress: Option<ProgressFn>,
    complete: Option<CompleteFn>,
    cancel: Option<CancelToken>,
}

impl CallbackObserver {
    /// Observer with no hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the plot hook
    pub fn on_plot<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[f64], usize) + Send + 'static,
    {
        self.plot = Some(Box::new(f));
        self
    }

    /// Set the progress hook
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, usize, Option<Duration>) + Send + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Set the completion hook
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(&AveragingOutcome) + Send + 'static,
    {
        self.complete = Some(Box::new(f));
        self
    }

    /// Stop when `token` is cancelled
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl AveragingObserver for CallbackObserver {
    fn on_plot(&mut self, magnitude: &[f64], rounds: usize) {
        if let Some(f) = self.plot.as_mut() {
            f(magnitude, rounds);
        }
    }

    fn on_progress(&mut self, done: usize, total: usize, eta: Option<Duration>) {
        if let Some(f) = self.progress.as_mut() {
            f(done, total, eta);
        }
    }

    fn should_stop(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    fn on_complete(&mut self, outcome: &AveragingOutcome) {
        if let Some(f) = self.complete.as_mut() {
            f(outcome);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    #[test]
    fn test_cancel_token_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());

        a.cancel();
        assert!(b.is_cancelled());

        b.reset();
        assert!(!a.is_cancelled());
    }

    #[test]
    fn test_tracker() {
        let mut tracker = ProgressTracker::new(4);
        assert!(tracker.eta().is_none());
        assert!(tracker.rate().is_none());
        assert_eq!(tracker.fraction(), 0.0);

        tracker.tick();
        tracker.tick();
        assert_eq!(tracker.done(), 2);
        assert_eq!(tracker.total(), 4);
        assert_relative_eq!(tracker.fraction(), 0.5);
        assert!(tracker.eta().is_some());
        assert_eq!(ProgressTracker::new(0).fraction(), 1.0);
    }

    #[test]
    fn test_tracker_done_has_no_time_left() {
        let mut tracker = ProgressTracker::new(3);
        for _ in 0..3 {
            tracker.tick();
        }
        tracker.finish();
        assert_eq!(tracker.eta(), Some(Duration::ZERO));
    }

    #[test]
    fn test_tracker_shares_external_bar() {
        let bar = ProgressBar::hidden();
        bar.set_length(10);
        let mut tracker = ProgressTracker::with_bar(bar.clone());
        tracker.tick();
        assert_eq!(bar.position(), 1);
        assert_eq!(tracker.total(), 10);
    }

    #[test]
    fn test_callback_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = CancelToken::new();

        let mut observer = CallbackObserver::new()
            .on_progress(move |done, total, _| sink.lock().unwrap().push((done, total)))
            .with_cancel(token.clone());

        AveragingObserver::on_progress(&mut observer, 1, 5, None);
        AveragingObserver::on_plot(&mut observer, &[1.0], 1);
        assert!(!observer.should_stop());

        token.cancel();
        assert!(observer.should_stop());
        assert_eq!(*seen.lock().unwrap(), vec![(1, 5)]);
    }

    #[test]
    fn test_noop_observer() {
        let observer = NoopObserver;
        assert!(!observer.should_stop());
    }
}
