//! Core types for QRO
//!
//! Gantree: L0_Foundation → CoreTypes
//!
//! Validated sample containers, role tags and the raw-shots data contract
//! shared by the analysis, backend and engine crates.

use crate::constants::readout;
use crate::error::{QroError, QroResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// Rotation angle in radians
/// Gantree: RotationAngle // pub type RotationAngle = f64
pub type RotationAngle = f64;

/// Per-bin counts (float so they can be normalized in place)
/// Gantree: Counts // pub type Counts = Vec<f64>
pub type Counts = Vec<f64>;

// ============================================================================
// StateRole
// ============================================================================

/// Role a prepared state plays in classification
/// Gantree: StateRole // 역할 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateRole {
    /// Reference ground state
    Ground,
    /// First excited state
    Excited,
    /// Any further state (second excited, leakage)
    Other,
}

impl StateRole {
    /// All roles in confusion-matrix column order
    pub const ALL: [StateRole; 3] = [StateRole::Ground, StateRole::Excited, StateRole::Other];

    /// Short symbol used in raw-shots keys
    /// Gantree: symbol() -> &str // g/e/f
    pub fn symbol(&self) -> &'static str {
        match self {
            StateRole::Ground => "g",
            StateRole::Excited => "e",
            StateRole::Other => "f",
        }
    }

    /// Role for a raw-shots suffix
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "g" => Some(StateRole::Ground),
            "e" => Some(StateRole::Excited),
            "f" => Some(StateRole::Other),
            _ => None,
        }
    }

    /// Column index in a confusion matrix
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            StateRole::Ground => 0,
            StateRole::Excited => 1,
            StateRole::Other => 2,
        }
    }
}

impl fmt::Display for StateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateRole::Ground => write!(f, "ground"),
            StateRole::Excited => write!(f, "excited"),
            StateRole::Other => write!(f, "other"),
        }
    }
}

// ============================================================================
// StateLabel
// ============================================================================

/// Identifier plus role tag
/// Gantree: StateLabel // 라벨+역할
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateLabel {
    /// Identifier, e.g. "g", "e", "f"
    pub name: String,
    /// Role in classification
    pub role: StateRole,
}

impl StateLabel {
    /// Create a label
    pub fn new(name: impl Into<String>, role: StateRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// Ground label "g"
    pub fn ground() -> Self {
        Self::new("g", StateRole::Ground)
    }

    /// Excited label "e"
    pub fn excited() -> Self {
        Self::new("e", StateRole::Excited)
    }

    /// Second-excited label "f"
    pub fn other() -> Self {
        Self::new("f", StateRole::Other)
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

// ============================================================================
// StateSample (Validated Wrapper)
// ============================================================================

/// One prepared state's raw acquisition: equal-length I and Q shots
/// Gantree: StateSample // 검증된 IQ 샘플
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSample {
    label: StateLabel,
    i: Vec<f64>,
    q: Vec<f64>,
}

impl StateSample {
    /// Create a sample with validation
    /// Gantree: new(label,i,q) -> Result<Self> // 생성+검증
    pub fn new(label: StateLabel, i: Vec<f64>, q: Vec<f64>) -> QroResult<Self> {
        if i.len() != q.len() {
            return Err(QroError::LengthMismatch {
                label: label.name,
                i_len: i.len(),
                q_len: q.len(),
            });
        }
        if i.is_empty() {
            return Err(QroError::EmptySample(label.name));
        }
        if let Some(&value) = i.iter().chain(q.iter()).find(|v| !v.is_finite()) {
            return Err(QroError::NonFiniteValue {
                label: label.name,
                value,
            });
        }
        Ok(Self { label, i, q })
    }

    /// Label of this sample
    #[inline]
    pub fn label(&self) -> &StateLabel {
        &self.label
    }

    /// Role of this sample
    #[inline]
    pub fn role(&self) -> StateRole {
        self.label.role
    }

    /// In-phase shots
    #[inline]
    pub fn i(&self) -> &[f64] {
        &self.i
    }

    /// Quadrature shots
    #[inline]
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// Number of shots
    #[inline]
    pub fn len(&self) -> usize {
        self.i.len()
    }

    /// Always false for a validated sample
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }

    /// Mean (I, Q)
    /// Gantree: centroid() -> (f64,f64) // 무게중심
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.len() as f64;
        (
            self.i.iter().sum::<f64>() / n,
            self.q.iter().sum::<f64>() / n,
        )
    }

    /// Iterate over (I, Q) pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.i.iter().copied().zip(self.q.iter().copied())
    }
}

// ============================================================================
// RawShots
// ============================================================================

/// Raw-shots data contract: `Ig, Qg, Ie, Qe[, If, Qf]` → real sequences
/// Gantree: RawShots // 원시 샷 맵
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawShots {
    data: BTreeMap<String, Vec<f64>>,
}

impl RawShots {
    /// Create empty shots
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sequence under a key
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<f64>) {
        self.data.insert(key.into(), values);
    }

    /// Builder form of `insert`
    pub fn with(mut self, key: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(key, values);
        self
    }

    /// Insert both I and Q of a sample under its role symbol
    pub fn insert_sample(&mut self, sample: &StateSample) {
        let symbol = sample.role().symbol();
        self.insert(format!("I{}", symbol), sample.i().to_vec());
        self.insert(format!("Q{}", symbol), sample.q().to_vec());
    }

    /// Get a sequence by key
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    /// Whether the second-excited pair is present
    pub fn has_other(&self) -> bool {
        self.data.contains_key("If") || self.data.contains_key("Qf")
    }

    /// Key names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|k| k.as_str())
    }

    /// Convert to role-tagged samples (g → Ground, e → Excited, f → Other)
    /// Gantree: to_states() -> Result<Vec<StateSample>> // 역할 변환
    pub fn to_states(&self) -> QroResult<Vec<StateSample>> {
        let mut roles = vec![StateRole::Ground, StateRole::Excited];
        if self.has_other() {
            roles.push(StateRole::Other);
        }

        roles
            .into_iter()
            .map(|role| {
                let symbol = role.symbol();
                let i_key = format!("I{}", symbol);
                let q_key = format!("Q{}", symbol);
                let i = self
                    .get(&i_key)
                    .ok_or(QroError::MissingKey(i_key))?
                    .to_vec();
                let q = self
                    .get(&q_key)
                    .ok_or(QroError::MissingKey(q_key))?
                    .to_vec();
                StateSample::new(StateLabel::new(symbol, role), i, q)
            })
            .collect()
    }

    /// Build from samples
    pub fn from_states(states: &[StateSample]) -> Self {
        let mut shots = Self::new();
        for s in states {
            shots.insert_sample(s);
        }
        shots
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> QroResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> QroResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// PreparedState
// ============================================================================

/// State the instrument prepares before a readout shot
/// Gantree: PreparedState // G | E | F
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreparedState {
    /// No pulse
    G,
    /// π pulse
    E,
    /// π pulse followed by ef π pulse
    F,
}

impl PreparedState {
    /// Role assigned to shots of this state
    pub fn role(&self) -> StateRole {
        match self {
            PreparedState::G => StateRole::Ground,
            PreparedState::E => StateRole::Excited,
            PreparedState::F => StateRole::Other,
        }
    }

    /// Label assigned to shots of this state
    pub fn label(&self) -> StateLabel {
        let role = self.role();
        StateLabel::new(role.symbol(), role)
    }
}

// ============================================================================
// ReadoutParams
// ============================================================================

/// Readout pulse parameters passed to the instrument
/// Gantree: ReadoutParams // 주파수/게인/길이
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadoutParams {
    /// Readout frequency (MHz)
    pub frequency_mhz: f64,
    /// Readout gain (DAC units, 0..1)
    pub gain: f64,
    /// Readout length (µs)
    pub length_us: f64,
}

impl ReadoutParams {
    /// Create readout parameters
    pub fn new(frequency_mhz: f64, gain: f64, length_us: f64) -> Self {
        Self {
            frequency_mhz,
            gain,
            length_us,
        }
    }

    /// Validate ranges
    pub fn validate(&self) -> QroResult<()> {
        if !self.frequency_mhz.is_finite() || self.frequency_mhz <= 0.0 {
            return Err(QroError::InvalidConfig(format!(
                "frequency_mhz must be positive, got {}",
                self.frequency_mhz
            )));
        }
        if !(0.0..=1.0).contains(&self.gain) {
            return Err(QroError::InvalidConfig(format!(
                "gain must be in [0, 1], got {}",
                self.gain
            )));
        }
        if !self.length_us.is_finite() || self.length_us <= 0.0 {
            return Err(QroError::InvalidConfig(format!(
                "length_us must be positive, got {}",
                self.length_us
            )));
        }
        Ok(())
    }
}

impl Default for ReadoutParams {
    fn default() -> Self {
        Self {
            frequency_mhz: readout::DEFAULT_FREQUENCY_MHZ,
            gain: readout::DEFAULT_GAIN,
            length_us: readout::DEFAULT_LENGTH_US,
        }
    }
}

impl fmt::Display for ReadoutParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} MHz, gain {:.3}, {:.3} us",
            self.frequency_mhz, self.gain, self.length_us
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
    fn test_state_sample_validation() {
        assert!(StateSample::new(StateLabel::ground(), vec![1.0], vec![2.0]).is_ok());

        let err = StateSample::new(StateLabel::ground(), vec![1.0, 2.0], vec![2.0]).unwrap_err();
        assert!(matches!(err, QroError::LengthMismatch { i_len: 2, q_len: 1, .. }));

        let err = StateSample::new(StateLabel::excited(), vec![], vec![]).unwrap_err();
        assert_eq!(err, QroError::EmptySample("e".into()));

        let err = StateSample::new(StateLabel::ground(), vec![f64::NAN], vec![0.0]).unwrap_err();
        assert!(matches!(err, QroError::NonFiniteValue { .. }));
    }

    #[test]
    fn test_centroid() {
        let s = StateSample::new(StateLabel::ground(), vec![1.0, 3.0], vec![-2.0, 2.0]).unwrap();
        let (x, y) = s.centroid();
        assert_relative_eq!(x, 2.0);
        assert_relative_eq!(y, 0.0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_role_symbols() {
        for role in StateRole::ALL {
            assert_eq!(StateRole::from_symbol(role.symbol()), Some(role));
        }
        assert_eq!(StateRole::from_symbol("x"), None);
        assert_eq!(StateRole::Other.index(), 2);
    }

    #[test]
    fn test_raw_shots_two_state() {
        let shots = RawShots::new()
            .with("Ig", vec![0.0, 0.1])
            .with("Qg", vec![0.0, 0.0])
            .with("Ie", vec![1.0, 1.1])
            .with("Qe", vec![1.0, 1.0]);

        let states = shots.to_states().unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].role(), StateRole::Ground);
        assert_eq!(states[1].role(), StateRole::Excited);
    }

    #[test]
    fn test_raw_shots_three_state_roles() {
        let shots = RawShots::new()
            .with("Ig", vec![0.0])
            .with("Qg", vec![0.0])
            .with("Ie", vec![1.0])
            .with("Qe", vec![1.0])
            .with("If", vec![2.0])
            .with("Qf", vec![2.0]);

        let states = shots.to_states().unwrap();
        assert_eq!(states.len(), 3);
        // e keeps the excited role when f is present
        assert_eq!(states[1].role(), StateRole::Excited);
        assert_eq!(states[2].role(), StateRole::Other);
    }

    #[test]
    fn test_raw_shots_missing_key() {
        let shots = RawShots::new()
            .with("Ig", vec![0.0])
            .with("Qg", vec![0.0])
            .with("Ie", vec![1.0]);
        assert_eq!(
            shots.to_states().unwrap_err(),
            QroError::MissingKey("Qe".into())
        );
    }

    #[test]
    fn test_raw_shots_json() {
        let shots = RawShots::new().with("Ig", vec![1.5]);
        let json = shots.to_json().unwrap();
        assert_eq!(json, r#"{"Ig":[1.5]}"#);
        assert_eq!(RawShots::from_json(&json).unwrap(), shots);
    }

    #[test]
    fn test_readout_params_validate() {
        assert!(ReadoutParams::default().validate().is_ok());
        assert!(ReadoutParams::new(7000.0, 1.5, 0.2).validate().is_err());
        assert!(ReadoutParams::new(7000.0, 0.2, 0.0).validate().is_err());
    }

    #[test]
    fn test_prepared_state_label() {
        assert_eq!(PreparedState::F.label(), StateLabel::other());
        assert_eq!(PreparedState::E.role(), StateRole::Excited);
    }
}
