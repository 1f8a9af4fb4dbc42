//! IQ rotation and aggregation
//!
//! Gantree: L2_Readout → Rotation
//!
//! Chooses one rotation angle per run, projects every state onto the
//! discrimination axis, and derives the shared histogram range.

use qro_core::{readout, RotationAngle, StateLabel, StateRole, StateSample};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ProjectionMode
// ============================================================================

/// Scalar projection fed to the histogram
/// Gantree: ProjectionMode // Amplitude | RotatedPhase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectionMode {
    /// `|I + iQ|`, no rotation
    Amplitude,

    /// Rotated I; angle from centroids when `None`, else degrees
    RotatedPhase {
        /// External angle in degrees
        angle_deg: Option<f64>,
    },
}

impl Default for ProjectionMode {
    fn default() -> Self {
        ProjectionMode::RotatedPhase { angle_deg: None }
    }
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionMode::Amplitude => write!(f, "amplitude"),
            ProjectionMode::RotatedPhase { angle_deg: None } => write!(f, "rotated(auto)"),
            ProjectionMode::RotatedPhase {
                angle_deg: Some(deg),
            } => write!(f, "rotated({:.2} deg)", deg),
        }
    }
}

// ============================================================================
// Geometry helpers
// ============================================================================

/// Rotate one IQ point by `theta` radians
/// Gantree: rotate_point(i,q,θ) -> (i',q') // 회전
#[inline]
pub fn rotate_point(i: f64, q: f64, theta: RotationAngle) -> (f64, f64) {
    let (sin, cos) = theta.sin_cos();
    (i * cos - q * sin, i * sin + q * cos)
}

/// Centroid of all shots carrying `role`, `None` when there are none
/// Gantree: role_centroid(states,role) -> Option<(x,y)> // 역할 중심
pub fn role_centroid(states: &[StateSample], role: StateRole) -> Option<(f64, f64)> {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
    for s in states.iter().filter(|s| s.role() == role) {
        sx += s.i().iter().sum::<f64>();
        sy += s.q().iter().sum::<f64>();
        n += s.len();
    }
    if n == 0 {
        None
    } else {
        Some((sx / n as f64, sy / n as f64))
    }
}

/// Angle aligning the ground→excited axis with +I
/// Gantree: discrimination_angle(states) -> θ // 판별 각도
pub fn discrimination_angle(states: &[StateSample]) -> RotationAngle {
    let (xg, yg) =
        role_centroid(states, StateRole::Ground).unwrap_or(readout::DEFAULT_GROUND_CENTROID);
    let (xe, ye) =
        role_centroid(states, StateRole::Excited).unwrap_or(readout::DEFAULT_EXCITED_CENTROID);
    -(ye - yg).atan2(xe - xg)
}

/// Symmetric range `[mid - span, mid + span]` over all values
/// Gantree: shared_range(values) -> (lo,hi) // 공유 범위
pub fn shared_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return (0.0, 0.0);
    }
    let span = (max - min) / 2.0;
    let mid = (max + min) / 2.0;
    (mid - span, mid + span)
}

// ============================================================================
// Rotation output
// ============================================================================

/// One state after projection
/// Gantree: RotatedState // 회전된 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatedState {
    /// Label of the source sample
    pub label: StateLabel,
    /// Scalar projection (rotated I or amplitude)
    pub projection: Vec<f64>,
    /// Rotated I (unrotated in amplitude mode)
    pub i: Vec<f64>,
    /// Rotated Q (unrotated in amplitude mode)
    pub q: Vec<f64>,
}

impl RotatedState {
    /// Mean of the projection
    pub fn mean_projection(&self) -> f64 {
        if self.projection.is_empty() {
            return 0.0;
        }
        self.projection.iter().sum::<f64>() / self.projection.len() as f64
    }
}

/// Result of rotating one run
/// Gantree: Rotation // 회전 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Projection mode used
    pub mode: ProjectionMode,
    /// Rotation angle (radians, 0 in amplitude mode)
    pub angle: RotationAngle,
    /// Per-state projections in input order
    pub states: Vec<RotatedState>,
    /// Shared histogram range
    pub range: (f64, f64),
}

impl Rotation {
    /// Rotation angle in degrees
    pub fn angle_deg(&self) -> f64 {
        readout::rad_to_deg(self.angle)
    }

    /// Width of the shared range
    pub fn range_width(&self) -> f64 {
        self.range.1 - self.range.0
    }

    /// All projections concatenated
    pub fn all_projections(&self) -> impl Iterator<Item = &f64> {
        self.states.iter().flat_map(|s| s.projection.iter())
    }
}

/// Project every state according to `mode`
/// Gantree: project(states,mode) -> Rotation // 회전+집계
pub fn project(states: &[StateSample], mode: ProjectionMode) -> Rotation {
    let angle = match mode {
        ProjectionMode::Amplitude => 0.0,
        ProjectionMode::RotatedPhase {
            angle_deg: Some(deg),
        } => readout::deg_to_rad(deg),
        ProjectionMode::RotatedPhase { angle_deg: None } => discrimination_angle(states),
    };

    let rotated: Vec<RotatedState> = states
        .iter()
        .map(|s| match mode {
            ProjectionMode::Amplitude => RotatedState {
                label: s.label().clone(),
                projection: s.points().map(|(i, q)| i.hypot(q)).collect(),
                i: s.i().to_vec(),
                q: s.q().to_vec(),
            },
            ProjectionMode::RotatedPhase { .. } => {
                let (i, q): (Vec<f64>, Vec<f64>) =
                    s.points().map(|(i, q)| rotate_point(i, q, angle)).unzip();
                RotatedState {
                    label: s.label().clone(),
                    projection: i.clone(),
                    i,
                    q,
                }
            }
        })
        .collect();

    let range = shared_range(rotated.iter().flat_map(|s| s.projection.iter()));

    log::debug!(
        "Projection {}: angle {:.3} deg, range [{:.4}, {:.4}]",
        mode,
        readout::rad_to_deg(angle),
        range.0,
        range.1
    );

    Rotation {
        mode,
        angle,
        states: rotated,
        range,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sample(label: StateLabel, i: Vec<f64>, q: Vec<f64>) -> StateSample {
        StateSample::new(label, i, q).unwrap()
    }

    #[test]
    fn test_rotate_point() {
        let (i, q) = rotate_point(1.0, 0.0, PI / 2.0);
        assert_relative_eq!(i, 0.0, epsilon = 1e-12);
        assert_relative_eq!(q, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_discrimination_angle_aligns_axis() {
        let states = vec![
            sample(StateLabel::ground(), vec![0.0, 0.0], vec![0.0, 0.0]),
            sample(StateLabel::excited(), vec![1.0, 1.0], vec![1.0, 1.0]),
        ];
        let theta = discrimination_angle(&states);
        assert_relative_eq!(theta, -PI / 4.0, epsilon = 1e-12);

        let rot = project(&states, ProjectionMode::default());
        // Excited lies on +I after rotation
        assert_relative_eq!(rot.states[1].i[0], 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(rot.states[1].q[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_roles_use_default_centroids() {
        // No excited shots: (1,1) stands in for the excited centroid
        let states = vec![sample(StateLabel::ground(), vec![0.0], vec![0.0])];
        assert_relative_eq!(discrimination_angle(&states), -PI / 4.0, epsilon = 1e-12);

        assert_relative_eq!(discrimination_angle(&[]), -PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_scale_invariance() {
        let g = (vec![0.1, -0.2, 0.3], vec![0.5, 0.4, 0.6]);
        let e = (vec![2.0, 2.2, 1.9], vec![-1.0, -0.8, -1.1]);
        let build = |k: f64| {
            vec![
                sample(
                    StateLabel::ground(),
                    g.0.iter().map(|v| v * k).collect(),
                    g.1.iter().map(|v| v * k).collect(),
                ),
                sample(
                    StateLabel::excited(),
                    e.0.iter().map(|v| v * k).collect(),
                    e.1.iter().map(|v| v * k).collect(),
                ),
            ]
        };
        let base = discrimination_angle(&build(1.0));
        for k in [0.01, 3.0, 1e4] {
            assert_relative_eq!(discrimination_angle(&build(k)), base, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_external_angle_in_degrees() {
        let states = vec![sample(StateLabel::ground(), vec![1.0], vec![0.0])];
        let rot = project(
            &states,
            ProjectionMode::RotatedPhase {
                angle_deg: Some(90.0),
            },
        );
        assert_relative_eq!(rot.angle, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(rot.angle_deg(), 90.0, epsilon = 1e-9);
        assert_relative_eq!(rot.states[0].q[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_amplitude_mode() {
        let states = vec![sample(StateLabel::ground(), vec![3.0, 0.0], vec![4.0, -2.0])];
        let rot = project(&states, ProjectionMode::Amplitude);

        assert_eq!(rot.angle, 0.0);
        assert_eq!(rot.states[0].projection, vec![5.0, 2.0]);
        // Scatter stays unrotated
        assert_eq!(rot.states[0].i, vec![3.0, 0.0]);
        assert_eq!(rot.states[0].q, vec![4.0, -2.0]);
        assert_eq!(rot.range, (2.0, 5.0));
    }

    #[test]
    fn test_shared_range() {
        let values = [1.0, -3.0, 5.0];
        assert_eq!(shared_range(&values), (-3.0, 5.0));

        let flat = [2.0, 2.0];
        assert_eq!(shared_range(&flat), (2.0, 2.0));

        let empty: [f64; 0] = [];
        assert_eq!(shared_range(&empty), (0.0, 0.0));
    }

    #[test]
    fn test_range_spans_all_states() {
        let states = vec![
            sample(StateLabel::ground(), vec![0.0, 1.0], vec![0.0, 0.0]),
            sample(StateLabel::excited(), vec![4.0, 5.0], vec![0.0, 0.0]),
            sample(StateLabel::other(), vec![9.0], vec![0.0]),
        ];
        let rot = project(&states, ProjectionMode::default());
        assert_relative_eq!(rot.range.0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rot.range.1, 9.0, epsilon = 1e-12);
        assert_relative_eq!(rot.range_width(), 9.0, epsilon = 1e-12);
    }
}
