//! Histogram builder
//!
//! Gantree: L2_Readout → Histogram
//!
//! Float-count histograms over a fixed range. Every category of a run is
//! binned against the same edges.

use crate::rotation::Rotation;
use qro_core::{readout, Counts, StateLabel, StateRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Histogram
// ============================================================================

/// Counts plus edges (`edges.len() == counts.len() + 1`)
/// Gantree: Histogram // 히스토그램
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    counts: Counts,
    edges: Vec<f64>,
}

impl Histogram {
    /// Empty histogram over the given edges
    pub fn zeros(edges: Vec<f64>) -> Self {
        let n = edges.len().saturating_sub(1);
        Self {
            counts: vec![0.0; n],
            edges,
        }
    }

    /// Per-bin counts
    #[inline]
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Bin edges
    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    /// Sum of counts
    /// Gantree: total() -> f64 // 합계
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Bin centres
    /// Gantree: bin_centers() -> Vec<f64> // 빈 중심
    pub fn bin_centers(&self) -> Vec<f64> {
        bin_centers(&self.edges)
    }

    /// Copy scaled to unit sum (unchanged when the sum is zero)
    /// Gantree: normalized() -> Self // 정규화
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        normalize_in_place(&mut out.counts);
        out
    }

    /// Count-weighted mean of bin centres
    pub fn mean(&self) -> Option<f64> {
        weighted_mean(&self.edges, &self.counts)
    }

    /// Centre of the first maximal bin
    pub fn peak(&self) -> Option<f64> {
        peak_center(&self.edges, &self.counts)
    }

    /// Add counts from a histogram with identical edges
    pub fn accumulate(&mut self, counts: &[f64]) {
        for (acc, c) in self.counts.iter_mut().zip(counts) {
            *acc += c;
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Bin edges for `num_bins` (0 = default) over `range`
/// Gantree: bin_edges(n,range) -> Vec<f64> // 빈 경계
pub fn bin_edges(num_bins: usize, range: (f64, f64)) -> Vec<f64> {
    let (low, high) = range;
    if high <= low {
        return vec![low, high];
    }
    let n = if num_bins == 0 {
        readout::DEFAULT_NUM_BINS
    } else {
        num_bins
    };
    readout::linspace(low, high, n + 1)
}

/// Bin `values` into `num_bins` bins over `range`
///
/// The last bin is closed; values outside the range are ignored. A
/// zero-width range yields a single bin.
///
/// Gantree: build_histogram(values,n,range,normalize) -> Histogram // 빈 계산
pub fn build_histogram(
    values: &[f64],
    num_bins: usize,
    range: (f64, f64),
    normalize: bool,
) -> Histogram {
    let edges = bin_edges(num_bins, range);
    let mut counts = bin_counts(values, &edges);
    if normalize {
        normalize_in_place(&mut counts);
    }
    Histogram { counts, edges }
}

/// Raw counts of `values` against precomputed edges
pub fn bin_counts(values: &[f64], edges: &[f64]) -> Counts {
    let n = edges.len().saturating_sub(1);
    let mut counts = vec![0.0; n];
    if n == 0 {
        return counts;
    }
    let low = edges[0];
    let high = edges[n];

    for &v in values {
        if !(low..=high).contains(&v) {
            continue;
        }
        counts[bin_index(v, edges)] += 1.0;
    }
    counts
}

/// Bin holding `v`, assuming `edges[0] <= v <= edges[n]`
fn bin_index(v: f64, edges: &[f64]) -> usize {
    let n = edges.len() - 1;
    let (low, high) = (edges[0], edges[n]);
    if high <= low {
        return 0;
    }
    let mut idx = (((v - low) / (high - low)) * n as f64) as usize;
    idx = idx.min(n - 1);
    // Correct float error against the actual edges
    if v < edges[idx] && idx > 0 {
        idx -= 1;
    } else if idx + 1 < n && v >= edges[idx + 1] {
        idx += 1;
    }
    idx
}

/// Divide by the sum when the sum is positive
pub fn normalize_in_place(counts: &mut [f64]) {
    let sum: f64 = counts.iter().sum();
    if sum > 0.0 {
        for c in counts.iter_mut() {
            *c /= sum;
        }
    }
}

/// Midpoints between consecutive edges
pub fn bin_centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

fn weighted_mean(edges: &[f64], counts: &[f64]) -> Option<f64> {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = bin_centers(edges)
        .iter()
        .zip(counts)
        .map(|(x, c)| x * c)
        .sum();
    Some(weighted / total)
}

fn peak_center(edges: &[f64], counts: &[f64]) -> Option<f64> {
    let idx = crate::threshold::argmax_first(counts)?;
    Some(0.5 * (edges[idx] + edges[idx + 1]))
}

// ============================================================================
// StateHistograms
// ============================================================================

/// Per-state and per-category counts sharing one set of edges
/// Gantree: StateHistograms // 공유 경계 히스토그램
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateHistograms {
    edges: Vec<f64>,
    per_state: Vec<(StateLabel, Counts)>,
    categories: BTreeMap<StateRole, Counts>,
}

impl StateHistograms {
    /// Bin every rotated state and aggregate by role
    /// Gantree: build(rotation,n) -> Self // 상태별 집계
    pub fn build(rotation: &Rotation, num_bins: usize) -> Self {
        let edges = bin_edges(num_bins, rotation.range);
        let mut per_state = Vec::with_capacity(rotation.states.len());
        let mut categories: BTreeMap<StateRole, Counts> = BTreeMap::new();

        for state in &rotation.states {
            let counts = bin_counts(&state.projection, &edges);
            categories
                .entry(state.label.role)
                .and_modify(|acc| {
                    for (a, c) in acc.iter_mut().zip(&counts) {
                        *a += c;
                    }
                })
                .or_insert_with(|| counts.clone());
            per_state.push((state.label.clone(), counts));
        }

        Self {
            edges,
            per_state,
            categories,
        }
    }

    /// Shared edges
    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins
    pub fn num_bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Shared bin centres
    pub fn bin_centers(&self) -> Vec<f64> {
        bin_centers(&self.edges)
    }

    /// Roles present, in ground/excited/other order
    pub fn roles(&self) -> Vec<StateRole> {
        self.categories.keys().copied().collect()
    }

    /// Aggregated counts for a role
    pub fn category_counts(&self, role: StateRole) -> Option<&[f64]> {
        self.categories.get(&role).map(|c| c.as_slice())
    }

    /// Aggregated histogram for a role
    /// Gantree: category(role) -> Option<Histogram> // 범주 히스토그램
    pub fn category(&self, role: StateRole) -> Option<Histogram> {
        self.categories.get(&role).map(|c| Histogram {
            counts: c.clone(),
            edges: self.edges.clone(),
        })
    }

    /// Histogram for each input state, in input order
    pub fn per_state(&self) -> impl Iterator<Item = (&StateLabel, Histogram)> + '_ {
        self.per_state.iter().map(move |(label, counts)| {
            (
                label,
                Histogram {
                    counts: counts.clone(),
                    edges: self.edges.clone(),
                },
            )
        })
    }

    /// Copy with every count array scaled to unit sum
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        for (_, counts) in out.per_state.iter_mut() {
            normalize_in_place(counts);
        }
        for counts in out.categories.values_mut() {
            normalize_in_place(counts);
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
