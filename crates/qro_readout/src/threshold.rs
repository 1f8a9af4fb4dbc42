//! Threshold and confusion-matrix solver
//!
//! Gantree: L2_Readout → ThresholdSolver
//!
//! Cumulative-count contrast between adjacent categories gives an ordered
//! threshold list; bins between thresholds classify each category into an
//! N×N confusion matrix (N ∈ {2, 3}).
//!
//! Contrast is taken over the mean population `(Σa + Σb) / 2`, which makes it
//! exactly twice `|cumsum(a) − cumsum(b)| / (Σa + Σb)`: two perfectly
//! separated equal populations score 1 instead of 0.5. With unequal
//! populations it is not bounded by 1 (700 vs 300 shots, fully separated,
//! score 1.4); `FidelityMode::Averaged` is the balanced estimator there.
//!
//! A threshold at contrast bin `k` splits after that bin: bins `[0, k]` fall
//! below and the threshold sits on `edges[k + 1]`, the edge the cumulative
//! sum at `k` ends on. Reporting `edges[k]` would place it one bin width
//! low while the confusion matrix still counted bin `k` as below.

use crate::config::FidelityMode;
use crate::histogram::StateHistograms;
use qro_core::{QroError, QroResult, StateRole};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Contrast
// ============================================================================

/// `|cumsum(a) − cumsum(b)| / ((Σa + Σb) / 2)`, all zero when the sum is zero
/// Gantree: contrast(a,b) -> Vec<f64> // 누적 대비
pub fn contrast(a: &[f64], b: &[f64]) -> Vec<f64> {
    let total: f64 = 0.5 * (a.iter().sum::<f64>() + b.iter().sum::<f64>());
    if total == 0.0 {
        return vec![0.0; a.len().min(b.len())];
    }
    let (mut ca, mut cb) = (0.0, 0.0);
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            ca += x;
            cb += y;
            (ca - cb).abs() / total
        })
        .collect()
}

/// Index of the first maximum, `None` for an empty slice
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, &v) in values.iter().enumerate() {
        match best {
            Some((_, bv)) if v <= bv => {}
            _ => best = Some((k, v)),
        }
    }
    best.map(|(k, _)| k)
}

// ============================================================================
// Threshold
// ============================================================================

/// One discrimination threshold between two categories
/// Gantree: Threshold // 임계값
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Category on the low side
    pub lower: StateRole,
    /// Category on the high side
    pub upper: StateRole,
    /// Contrast-maximizing bin
    pub bin: usize,
    /// Split position; bins `[0, index)` fall below
    pub index: usize,
    /// Threshold position (ADC units)
    pub value: f64,
    /// Contrast at `bin`
    pub contrast: f64,
}

/// Contrast-maximizing threshold between two count arrays
/// Gantree: find_threshold(a,b,edges) -> Threshold // 임계값 탐색
pub fn find_threshold(
    lower: (StateRole, &[f64]),
    upper: (StateRole, &[f64]),
    edges: &[f64],
) -> Threshold {
    let c = contrast(lower.1, upper.1);
    let bin = argmax_first(&c).unwrap_or(0);
    let index = (bin + 1).min(c.len());
    Threshold {
        lower: lower.0,
        upper: upper.0,
        bin,
        index,
        value: edges.get(index).copied().unwrap_or(0.0),
        contrast: c.get(bin).copied().unwrap_or(0.0),
    }
}

// ============================================================================
// Confusion Matrix
// ============================================================================

/// Rows = prepared category, columns = declared category
/// Gantree: ConfusionMatrix // 혼동 행렬
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    roles: Vec<StateRole>,
    raw: Vec<Vec<f64>>,
    percent: Vec<Vec<f64>>,
}

impl ConfusionMatrix {
    /// Build from raw counts; rows are normalized to percent
    /// Gantree: from_raw(roles,raw) -> Self // 행 정규화
    pub fn from_raw(roles: Vec<StateRole>, raw: Vec<Vec<f64>>) -> Self {
        let percent = raw
            .iter()
            .map(|row| {
                let sum: f64 = row.iter().sum();
                if sum == 0.0 {
                    vec![0.0; row.len()]
                } else {
                    row.iter().map(|v| 100.0 * v / sum).collect()
                }
            })
            .collect();
        Self { roles, raw, percent }
    }

    /// Matrix dimension
    pub fn size(&self) -> usize {
        self.roles.len()
    }

    /// Row/column roles
    pub fn roles(&self) -> &[StateRole] {
        &self.roles
    }

    /// Raw counts
    pub fn raw(&self) -> &[Vec<f64>] {
        &self.raw
    }

    /// Row percentages
    pub fn percent(&self) -> &[Vec<f64>] {
        &self.percent
    }

    /// Percentage for (prepared, declared)
    pub fn get(&self, prepared: StateRole, declared: StateRole) -> Option<f64> {
        let r = self.roles.iter().position(|&x| x == prepared)?;
        let c = self.roles.iter().position(|&x| x == declared)?;
        Some(self.percent[r][c])
    }

    /// Diagonal percentages
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.size()).map(|k| self.percent[k][k]).collect()
    }

    /// Mean of the diagonal as a fraction
    pub fn assignment_fidelity(&self) -> f64 {
        let d = self.diagonal();
        if d.is_empty() {
            return 0.0;
        }
        d.iter().sum::<f64>() / (100.0 * d.len() as f64)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "     ")?;
        for role in &self.roles {
            write!(f, "{:>8}", format!("|{}>", role.symbol()))?;
        }
        for (role, row) in self.roles.iter().zip(&self.percent) {
            write!(f, "\n{:>5}", format!("|{}>", role.symbol()))?;
            for v in row {
                write!(f, "{:>8.1}", v)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Thresholds, confusion matrix and threshold fidelity for one run
/// Gantree: ThresholdSolution // 풀이 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSolution {
    /// Thresholds between adjacent categories, along the axis
    pub thresholds: Vec<Threshold>,
    /// Ground-vs-excited threshold
    pub ground_excited: Threshold,
    /// Confusion matrix over the present categories
    pub confusion: ConfusionMatrix,
    /// Threshold fidelity under the chosen policy
    pub fidelity: f64,
    /// Policy used
    pub mode: FidelityMode,
}

impl ThresholdSolution {
    /// Threshold values sorted ascending
    pub fn sorted_values(&self) -> Vec<f64> {
        let mut v: Vec<f64> = self.thresholds.iter().map(|t| t.value).collect();
        v.sort_by(|a, b| a.total_cmp(b));
        v
    }
}

/// Solve thresholds and the confusion matrix for every present category
///
/// Categories are ordered by histogram mean along the projection axis.
/// Requires ground and excited categories.
///
/// Gantree: solve(hists,mode) -> Result<ThresholdSolution> // 임계값+행렬
pub fn solve(hists: &StateHistograms, mode: FidelityMode) -> QroResult<ThresholdSolution> {
    let ground = hists
        .category_counts(StateRole::Ground)
        .ok_or_else(|| QroError::MissingRole(StateRole::Ground.to_string()))?;
    let excited = hists
        .category_counts(StateRole::Excited)
        .ok_or_else(|| QroError::MissingRole(StateRole::Excited.to_string()))?;
    let edges = hists.edges();
    let nbins = hists.num_bins();

    // Output order: ground, excited, other
    let roles = hists.roles();

    // Axis order by histogram mean; ties keep role order
    let mut ordered: Vec<(StateRole, f64)> = roles
        .iter()
        .map(|&r| {
            let mean = hists
                .category(r)
                .and_then(|h| h.mean())
                .unwrap_or(f64::INFINITY);
            (r, mean)
        })
        .collect();
    ordered.sort_by(|a, b| a.1.total_cmp(&b.1));

    let counts_of = |r: StateRole| hists.category_counts(r).unwrap_or(&[]);
    let thresholds: Vec<Threshold> = ordered
        .windows(2)
        .map(|w| find_threshold((w[0].0, counts_of(w[0].0)), (w[1].0, counts_of(w[1].0)), edges))
        .collect();

    let ground_mean = ordered
        .iter()
        .find(|(r, _)| *r == StateRole::Ground)
        .map(|(_, m)| *m)
        .unwrap_or(0.0);
    let excited_mean = ordered
        .iter()
        .find(|(r, _)| *r == StateRole::Excited)
        .map(|(_, m)| *m)
        .unwrap_or(0.0);
    let ground_below = ground_mean <= excited_mean;

    let ground_excited = if ground_below {
        find_threshold(
            (StateRole::Ground, ground),
            (StateRole::Excited, excited),
            edges,
        )
    } else {
        find_threshold(
            (StateRole::Excited, excited),
            (StateRole::Ground, ground),
            edges,
        )
    };

    let fidelity = match mode {
        FidelityMode::Contrast => ground_excited.contrast,
        FidelityMode::Averaged => {
            averaged_fidelity(ground, excited, ground_excited.index, ground_below)
        }
    };

    // Bucket boundaries along the axis
    let mut cuts: Vec<usize> = thresholds.iter().map(|t| t.index).collect();
    cuts.sort_unstable();
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0);
    bounds.extend(cuts);
    bounds.push(nbins);

    let column_of = |r: StateRole| roles.iter().position(|&x| x == r).unwrap_or(0);
    let raw: Vec<Vec<f64>> = roles
        .iter()
        .map(|&r| {
            let counts = counts_of(r);
            let mut row = vec![0.0; roles.len()];
            for (bucket, (declared, _)) in ordered.iter().enumerate() {
                let (lo, hi) = (bounds[bucket], bounds[bucket + 1]);
                row[column_of(*declared)] = counts[lo..hi].iter().sum();
            }
            row
        })
        .collect();

    let confusion = ConfusionMatrix::from_raw(roles, raw);

    log::debug!(
        "Thresholds {:?}, fidelity {:.4} ({:?})",
        thresholds.iter().map(|t| t.value).collect::<Vec<_>>(),
        fidelity,
        mode
    );

    Ok(ThresholdSolution {
        thresholds,
        ground_excited,
        confusion,
        fidelity,
        mode,
    })
}

/// `0.5·[(1 − ground beyond threshold) + (1 − excited before threshold)]`
fn averaged_fidelity(ground: &[f64], excited: &[f64], index: usize, ground_below: bool) -> f64 {
    let fraction = |counts: &[f64], range: std::ops::Range<usize>| {
        let total: f64 = counts.iter().sum();
        if total == 0.0 {
            0.0
        } else {
            counts[range].iter().sum::<f64>() / total
        }
    };
    let n = ground.len();
    let (ground_wrong, excited_wrong) = if ground_below {
        (fraction(ground, index..n), fraction(excited, 0..index))
    } else {
        (fraction(ground, 0..index), fraction(excited, index..n))
    };
    0.5 * ((1.0 - ground_wrong) + (1.0 - excited_wrong))
}

// ============================================================================
// Tests
// ============================================================================
