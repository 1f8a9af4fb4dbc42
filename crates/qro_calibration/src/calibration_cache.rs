//! Calibration caching
//!
//! Gantree: L4_Calibration → CalibrationCache
//!
//! TTL cache of readout calibrations keyed by qubit, shared by cloning.

use crate::readout_calibration::ReadoutCalibration;
use qro_core::QroResult;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry {
    calibration: ReadoutCalibration,
    cached_at: Instant,
}

/// Calibration cache with TTL
/// Gantree: CalibrationCache // 캐싱
#[derive(Debug)]
pub struct CalibrationCache {
    /// Gantree: cache: HashMap<String,CachedEntry> // 캐시 저장소
    cache: Arc<RwLock<HashMap<String, CachedEntry>>>,

    /// Gantree: ttl: Duration // 유효 시간
    ttl: Duration,
}

impl CalibrationCache {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create cache with a TTL in seconds
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_seconds))
    }

    /// Create cache with an arbitrary TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// One hour
    pub fn default_ttl() -> Self {
        Self::new(3600)
    }

    // ========================================================================
    // Cache Operations
    // ========================================================================

    /// Cached calibration, if still valid
    /// Gantree: get(qubit) -> Option<ReadoutCalibration> // 캐시 조회
    pub fn get(&self, qubit: &str) -> Option<ReadoutCalibration> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(qubit)?;

        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.calibration.clone())
        } else {
            None
        }
    }

    /// Store under the calibration's qubit name
    /// Gantree: set(calibration) // 캐시 저장
    pub fn set(&self, calibration: ReadoutCalibration) {
        if let Ok(mut cache) = self.cache.write() {
            log::debug!("Caching calibration: {}", calibration);
            cache.insert(
                calibration.qubit.clone(),
                CachedEntry {
                    calibration,
                    cached_at: Instant::now(),
                },
            );
        }
    }

    /// Drop one qubit
    /// Gantree: invalidate(qubit) // 캐시 무효화
    pub fn invalidate(&self, qubit: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(qubit);
        }
    }

    /// Drop everything
    pub fn invalidate_all(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Whether a valid entry exists
    pub fn is_valid(&self, qubit: &str) -> bool {
        self.get(qubit).is_some()
    }

    /// Cached value, or run `fetch` and cache what it returns
    ///
    /// Errors from `fetch` propagate and leave the cache untouched.
    pub fn get_or_fetch<F>(&self, qubit: &str, fetch: F) -> QroResult<ReadoutCalibration>
    where
        F: FnOnce() -> QroResult<ReadoutCalibration>,
    {
        if let Some(calibration) = self.get(qubit) {
            return Ok(calibration);
        }

        let mut calibration = fetch()?;
        calibration.qubit = qubit.to_string();
        self.set(calibration.clone());
        Ok(calibration)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached qubit names
    pub fn cached_qubits(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remove expired entries
    pub fn cleanup_expired(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        }
    }
}

impl Default for CalibrationCache {
    fn default() -> Self {
        Self::default_ttl()
    }
}

impl Clone for CalibrationCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            ttl: self.ttl,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use qro_core::QroError;
    use std::cell::Cell;

    fn calibration(qubit: &str, fidelity: f64) -> ReadoutCalibration {
        let mut cal = ReadoutCalibration::new(qubit);
        cal.fidelity = fidelity;
        cal
    }

    #[test]
    fn test_cache_new() {
        let cache = CalibrationCache::new(60);
        assert_eq!(cache.ttl(), Duration::from_secs(60));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_set_get() {
        let cache = CalibrationCache::new(60);
        cache.set(calibration("Q1", 0.93));

        let cached = cache.get("Q1").unwrap();
        assert_eq!(cached.fidelity, 0.93);
        assert!(cache.get("Q2").is_none());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = CalibrationCache::new(60);
        cache.set(calibration("Q1", 0.9));
        cache.set(calibration("Q2", 0.8));
        assert!(cache.is_valid("Q1"));

        cache.invalidate("Q1");
        assert!(!cache.is_valid("Q1"));
        assert_eq!(cache.cached_qubits(), vec!["Q2".to_string()]);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let cache = CalibrationCache::with_ttl(Duration::from_millis(20));
        cache.set(calibration("Q1", 0.9));
        assert!(cache.is_valid("Q1"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("Q1").is_none());
        assert_eq!(cache.len(), 1);

        cache.cleanup_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_fetch() {
        let cache = CalibrationCache::new(60);
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(calibration("ignored", 0.95))
        };

        let first = cache.get_or_fetch("Q3", fetch).unwrap();
        assert_eq!(first.qubit, "Q3");

        let second = cache
            .get_or_fetch("Q3", || {
                calls.set(calls.get() + 1);
                Ok(calibration("Q3", 0.1))
            })
            .unwrap();
        assert_eq!(second.fidelity, 0.95);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_get_or_fetch_error_not_cached() {
        let cache = CalibrationCache::new(60);
        let err = cache
            .get_or_fetch("Q1", || Err(QroError::AcquisitionFailed("timeout".into())))
            .unwrap_err();
        assert!(err.is_acquisition_error());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clone_shares_data() {
        let cache1 = CalibrationCache::new(60);
        let cache2 = cache1.clone();

        cache1.set(calibration("Q1", 0.9));
        assert!(cache2.is_valid("Q1"));
    }
}
