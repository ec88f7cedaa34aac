//! Core data types shared across the pipeline stages.
//!
//! Typed student records, feature rows and datasets, the split partitions,
//! and the validation and results snapshots returned to callers.

use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One cleaned student row with every raw column typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub gender: String,
    pub programme: String,
    pub year_of_study: u8,
    pub enrolment_status: String,
    pub academic_standing: String,
    pub avg_login_frequency: f64,
    pub total_missed: f64,
    pub total_submitted: f64,
    pub avg_forum_activity: f64,
    pub avg_session_duration: f64,
    pub total_downloads: f64,
    pub total_quiz_attempts: f64,
    pub gpa: f64,
    pub gpa_change: f64,
    pub credit_completion: f64,
    pub avg_attendance_rate: f64,
    pub avg_library_visits: f64,
    pub avg_dining_swipes: f64,
    pub avg_late_night_sessions: f64,
    pub avg_recreation_use: f64,
    pub at_risk: bool,
}

/// A schema-conforming feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// `None` for synthesized rows.
    pub student_id: Option<String>,
    pub values: Vec<f64>,
    pub label: u8,
    pub synthetic: bool,
}

impl FeatureRow {
    pub fn organic(student_id: impl Into<String>, values: Vec<f64>, label: u8) -> Self {
        Self {
            student_id: Some(student_id.into()),
            values,
            label,
            synthetic: false,
        }
    }

    pub fn synthetic(values: Vec<f64>, label: u8) -> Self {
        Self {
            student_id: None,
            values,
            label,
            synthetic: true,
        }
    }
}

/// Ordered rows sharing one feature schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub schema: FeatureSchema,
    pub rows: Vec<FeatureRow>,
}

impl Dataset {
    pub fn new(schema: FeatureSchema, rows: Vec<FeatureRow>) -> Self {
        Self { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_distribution(&self) -> ClassDistribution {
        ClassDistribution::from_labels(self.rows.iter().map(|r| r.label))
    }

    pub fn organic_len(&self) -> usize {
        self.rows.iter().filter(|r| !r.synthetic).count()
    }

    pub fn synthetic_len(&self) -> usize {
        self.rows.iter().filter(|r| r.synthetic).count()
    }

    /// Values of one feature column in row order.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r.values[index]).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitName {
    Train,
    Val,
    Test,
}

impl SplitName {
    pub const ALL: [SplitName; 3] = [SplitName::Train, SplitName::Val, SplitName::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for SplitName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named partition and the engineered-dataset row indices it was assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub name: SplitName,
    pub dataset: Dataset,
    pub indices: Vec<usize>,
}

/// The three partitions produced by the splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Splits {
    pub train: Split,
    pub val: Split,
    pub test: Split,
}

impl Splits {
    pub fn iter(&self) -> impl Iterator<Item = &Split> {
        [&self.train, &self.val, &self.test].into_iter()
    }

    pub fn sizes(&self) -> SplitSizes {
        SplitSizes {
            train: self.train.dataset.len(),
            train_organic: self.train.dataset.organic_len(),
            train_synthetic: self.train.dataset.synthetic_len(),
            val: self.val.dataset.len(),
            test: self.test.dataset.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub negative: usize,
    pub positive: usize,
}

impl ClassDistribution {
    pub fn from_labels(labels: impl IntoIterator<Item = u8>) -> Self {
        let mut dist = Self::default();
        for label in labels {
            if label == 1 {
                dist.positive += 1;
            } else {
                dist.negative += 1;
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.negative + self.positive
    }

    pub fn positive_fraction(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.positive as f64 / self.total() as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train: usize,
    pub train_organic: usize,
    pub train_synthetic: usize,
    pub val: usize,
    pub test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueEntry {
    pub column: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: usize,
    pub total: usize,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    pub fn push(&mut self, name: impl Into<String>, passed: bool, detail: impl Into<String>) {
        self.checks.push(ValidationCheck {
            name: name.into(),
            passed,
            detail: detail.into(),
        });
        self.total = self.checks.len();
        self.passed = self.checks.iter().filter(|c| c.passed).count();
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn check(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Immutable snapshot of one successful run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub completed_at: String,
    pub duration_ms: u64,
    pub seed: u64,
    pub raw_rows: usize,
    pub raw_columns: usize,
    pub clean_rows: usize,
    pub dropped_rows: usize,
    pub duplicates_removed: usize,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub engineered_features: Vec<String>,
    pub split_sizes: SplitSizes,
    pub class_distribution_full: ClassDistribution,
    pub class_distribution_before_balancing: ClassDistribution,
    pub class_distribution_after_balancing: ClassDistribution,
    pub missing_values: Vec<MissingValueEntry>,
    pub imputed_values: BTreeMap<String, String>,
    pub outliers_capped: BTreeMap<String, usize>,
    pub zero_variance_features: Vec<String>,
    pub validation: ValidationReport,
    pub plots: Vec<String>,
    pub output_dir: PathBuf,
}
