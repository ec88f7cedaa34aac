//! Column contracts for raw input and engineered features.
//!
//! [`RAW_COLUMNS`] is the fixed contract the Cleaner enforces against the
//! source file. [`FeatureSchema`] is declared once per run by the feature
//! engineer and every later stage checks rows against it.

use serde::{Deserialize, Serialize};

/// Student identifier column.
pub const STUDENT_ID: &str = "StudentID";
/// Raw target column.
pub const RISK_LABEL: &str = "RiskLabel";
/// Encoded binary target column.
pub const TARGET: &str = "RiskBinary";
/// Audit column marking synthesized rows.
pub const SYNTHETIC_MARKER: &str = "IsSynthetic";

/// How a raw column is coerced by the Cleaner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
    Identifier,
    Continuous,
    Categorical,
    Target,
}

/// A required raw column and its valid numeric domain (continuous only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawColumn {
    pub name: &'static str,
    pub kind: RawKind,
    pub min: f64,
    pub max: f64,
}

impl RawColumn {
    const fn continuous(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: RawKind::Continuous,
            min,
            max,
        }
    }

    const fn of(name: &'static str, kind: RawKind) -> Self {
        Self {
            name,
            kind,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Whether a parsed value lies inside this column's domain.
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Every column the source must provide, in canonical order.
pub const RAW_COLUMNS: &[RawColumn] = &[
    RawColumn::of(STUDENT_ID, RawKind::Identifier),
    RawColumn::of("Gender", RawKind::Categorical),
    RawColumn::of("Programme", RawKind::Categorical),
    RawColumn::continuous("YearOfStudy", 1.0, 7.0),
    RawColumn::of("EnrolmentStatus", RawKind::Categorical),
    RawColumn::of("AcademicStanding", RawKind::Categorical),
    RawColumn::continuous("AvgLoginFrequency", 0.0, f64::INFINITY),
    RawColumn::continuous("TotalMissed", 0.0, f64::INFINITY),
    RawColumn::continuous("TotalSubmitted", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgForumActivity", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgSessionDuration", 0.0, f64::INFINITY),
    RawColumn::continuous("TotalDownloads", 0.0, f64::INFINITY),
    RawColumn::continuous("TotalQuizAttempts", 0.0, f64::INFINITY),
    RawColumn::continuous("GPA", 0.0, 4.0),
    RawColumn::continuous("GPAChange", -4.0, 4.0),
    RawColumn::continuous("CreditCompletion", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgAttendanceRate", 0.0, 100.0),
    RawColumn::continuous("AvgLibraryVisits", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgDiningSwipes", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgLateNightSessions", 0.0, f64::INFINITY),
    RawColumn::continuous("AvgRecreationUse", 0.0, f64::INFINITY),
    RawColumn::of(RISK_LABEL, RawKind::Target),
];

/// Look up a raw column contract by name.
pub fn raw_column(name: &str) -> Option<&'static RawColumn> {
    RAW_COLUMNS.iter().find(|c| c.name == name)
}

/// Kind of an engineered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Scaled to [0, 1] and interpolated by the balancer.
    Continuous,
    /// 0 or 1.
    BinaryFlag,
    /// Integer code within `[min, max]`.
    Categorical,
    /// The binary risk label.
    Target,
}

/// One `(name, kind, valid-range)` entry of the feature schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
    pub min: f64,
    pub max: f64,
}

impl FeatureSpec {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Continuous,
            min: 0.0,
            max: 1.0,
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::BinaryFlag,
            min: 0.0,
            max: 1.0,
        }
    }

    pub fn categorical(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Categorical,
            min,
            max,
        }
    }

    pub fn target(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Target,
            min: 0.0,
            max: 1.0,
        }
    }

    /// Check a single value against this spec.
    ///
    /// Continuous values only need to be finite here: their declared [0, 1]
    /// range holds after scaling and is checked by the validator.
    pub fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.kind {
            FeatureKind::Continuous => true,
            FeatureKind::BinaryFlag | FeatureKind::Target => value == 0.0 || value == 1.0,
            FeatureKind::Categorical => {
                value.fract() == 0.0 && value >= self.min && value <= self.max
            }
        }
    }
}

/// Ordered feature list plus the single target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<FeatureSpec>,
    pub target: FeatureSpec,
}

impl FeatureSchema {
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        Self {
            features,
            target: FeatureSpec::target(TARGET),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Indices of continuous features, in schema order.
    pub fn continuous_indices(&self) -> Vec<usize> {
        self.features
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FeatureKind::Continuous)
            .map(|(i, _)| i)
            .collect()
    }

    /// Validate a feature vector and its label.
    ///
    /// Returns a description of the first violation found.
    pub fn check_row(&self, values: &[f64], label: u8) -> Result<(), String> {
        if values.len() != self.features.len() {
            return Err(format!(
                "expected {} feature values, got {}",
                self.features.len(),
                values.len()
            ));
        }
        if let Some((spec, value)) = self
            .features
            .iter()
            .zip(values)
            .find(|(spec, value)| !spec.accepts(**value))
        {
            return Err(format!(
                "value {} out of range for {:?} feature '{}'",
                value, spec.kind, spec.name
            ));
        }
        if label > 1 {
            return Err(format!("target '{}' must be 0 or 1, got {}", self.target.name, label));
        }
        Ok(())
    }
}
