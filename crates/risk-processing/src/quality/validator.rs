//! Post-run validation of the final splits and written artifacts.
//!
//! Every check is computed on its own and recorded as pass/fail; a failing
//! check never aborts the run.

use crate::pipeline::scaler::ScalingParams;
use crate::schema::FeatureKind;
use crate::types::{ClassDistribution, Dataset, SplitName, Splits, ValidationReport};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

const EPSILON: f64 = 1e-9;

/// Files the artifact writer must produce, relative to the output root.
pub const SPLIT_FILES: [&str; 3] = ["data/train.csv", "data/val.csv", "data/test.csv"];
pub const MODEL_FILES: [&str; 3] = [
    "models/scaling_params.json",
    "models/feature_schema.json",
    "models/imputation_values.json",
];

/// Runs the fixed battery of checks over the final splits.
///
/// Every check is computed and reported on its own; a failing check never
/// aborts the run.
pub struct Validator {
    tolerance: f64,
    balance_ratio: f64,
}

impl Validator {
    pub fn new(tolerance: f64, balance_ratio: f64) -> Self {
        Self {
            tolerance,
            balance_ratio,
        }
    }

    /// Data checks over the scaled, balanced splits.
    ///
    /// `full` is the class distribution of the whole cleaned dataset before
    /// splitting.
    pub fn validate(
        &self,
        splits: &Splits,
        params: &ScalingParams,
        full: ClassDistribution,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();

        for split in splits.iter() {
            let missing = Self::count_missing(&split.dataset);
            report.push(
                missing_check_name(split.name),
                missing == 0,
                format!("{} missing values in {} rows", missing, split.dataset.len()),
            );
        }

        let out_of_range: usize = splits
            .iter()
            .map(|s| Self::count_continuous_out_of_unit(&s.dataset))
            .sum();
        report.push(
            "continuous_features_in_unit_range",
            out_of_range == 0,
            format!("{} continuous values outside [0, 1]", out_of_range),
        );

        let bad_discrete: usize = splits
            .iter()
            .map(|s| Self::count_discrete_violations(&s.dataset))
            .sum();
        report.push(
            "discrete_features_within_schema_range",
            bad_discrete == 0,
            format!("{} flag or code values outside their declared range", bad_discrete),
        );

        let (consistent, detail) = Self::feature_set_consistency(splits);
        report.push("feature_set_consistent", consistent, detail);

        let bad_labels = splits
            .iter()
            .flat_map(|s| s.dataset.rows.iter())
            .filter(|r| r.label > 1)
            .count();
        report.push(
            "target_binary",
            bad_labels == 0,
            format!("{} labels outside {{0, 1}}", bad_labels),
        );

        let full_fraction = full.positive_fraction();
        for split in [&splits.val, &splits.test] {
            let fraction = split.dataset.class_distribution().positive_fraction();
            let drift = (fraction - full_fraction).abs();
            report.push(
                format!("{}_class_ratio_within_tolerance", split.name),
                drift <= self.tolerance + EPSILON,
                format!(
                    "positive fraction {:.4} vs {:.4} overall (drift {:.4}, tolerance {:.4})",
                    fraction, full_fraction, drift, self.tolerance
                ),
            );
        }

        let train = splits.train.dataset.class_distribution();
        let (minority, majority) = if train.positive <= train.negative {
            (train.positive, train.negative)
        } else {
            (train.negative, train.positive)
        };
        report.push(
            "train_classes_balanced",
            majority > 0 && minority as f64 >= majority as f64 * self.balance_ratio - EPSILON,
            format!(
                "{} positive / {} negative (target ratio {:.2})",
                train.positive, train.negative, self.balance_ratio
            ),
        );

        let misplaced = [&splits.val, &splits.test]
            .iter()
            .map(|s| s.dataset.synthetic_len())
            .sum::<usize>();
        let synthetic_with_id = splits
            .train
            .dataset
            .rows
            .iter()
            .filter(|r| r.synthetic && r.student_id.is_some())
            .count();
        report.push(
            "synthetic_rows_only_in_train",
            misplaced == 0 && synthetic_with_id == 0,
            format!(
                "{} synthetic rows in train, {} in val/test",
                splits.train.dataset.synthetic_len(),
                misplaced
            ),
        );

        let duplicates = Self::count_shared_ids(splits);
        report.push(
            "student_ids_unique_across_splits",
            duplicates == 0,
            format!("{} repeated student IDs", duplicates),
        );

        let zero_variance = params.zero_variance();
        report.push(
            "no_zero_variance_features",
            zero_variance.is_empty(),
            if zero_variance.is_empty() {
                "all continuous features vary in train".to_string()
            } else {
                format!("constant in train, scaled to 0.0: {}", zero_variance.join(", "))
            },
        );

        Self::log_outcome(&report);
        report
    }

    /// Append the artifact-existence checks for a written output tree.
    pub fn check_artifacts(report: &mut ValidationReport, root: &Path, plots: &[String]) {
        let missing_splits = Self::missing_files(root, SPLIT_FILES.iter().copied());
        report.push(
            "split_files_exist",
            missing_splits.is_empty(),
            Self::files_detail(&missing_splits, SPLIT_FILES.len()),
        );

        let missing_models = Self::missing_files(root, MODEL_FILES.iter().copied());
        report.push(
            "model_artifacts_exist",
            missing_models.is_empty(),
            Self::files_detail(&missing_models, MODEL_FILES.len()),
        );

        if plots.is_empty() {
            report.push("plots_exist", true, "plot generation disabled");
        } else {
            let missing_plots = Self::missing_files(root, plots.iter().map(String::as_str));
            report.push(
                "plots_exist",
                missing_plots.is_empty(),
                Self::files_detail(&missing_plots, plots.len()),
            );
        }

        Self::log_outcome(report);
    }

    fn count_missing(dataset: &Dataset) -> usize {
        let width = dataset.schema.len();
        dataset
            .rows
            .iter()
            .map(|r| {
                r.values.iter().filter(|v| !v.is_finite()).count()
                    + width.saturating_sub(r.values.len())
                    + usize::from(!r.synthetic && r.student_id.is_none())
            })
            .sum()
    }

    fn count_continuous_out_of_unit(dataset: &Dataset) -> usize {
        let continuous = dataset.schema.continuous_indices();
        dataset
            .rows
            .iter()
            .flat_map(|r| continuous.iter().filter_map(move |&i| r.values.get(i)))
            .filter(|v| !(0.0..=1.0).contains(*v))
            .count()
    }

    fn count_discrete_violations(dataset: &Dataset) -> usize {
        dataset
            .rows
            .iter()
            .map(|r| {
                dataset
                    .schema
                    .features
                    .iter()
                    .zip(&r.values)
                    .filter(|(spec, value)| {
                        spec.kind != FeatureKind::Continuous && !spec.accepts(**value)
                    })
                    .count()
            })
            .sum()
    }

    fn feature_set_consistency(splits: &Splits) -> (bool, String) {
        let reference = splits.train.dataset.schema.names();
        for split in [&splits.val, &splits.test] {
            if split.dataset.schema.names() != reference {
                return (
                    false,
                    format!("{} feature list differs from train", split.name),
                );
            }
        }
        let ragged = splits
            .iter()
            .flat_map(|s| s.dataset.rows.iter())
            .filter(|r| r.values.len() != reference.len())
            .count();
        if ragged > 0 {
            return (false, format!("{} rows with the wrong number of values", ragged));
        }
        (
            true,
            format!("{} features in the same order across splits", reference.len()),
        )
    }

    fn count_shared_ids(splits: &Splits) -> usize {
        let mut seen = HashSet::new();
        splits
            .iter()
            .flat_map(|s| s.dataset.rows.iter())
            .filter_map(|r| r.student_id.as_deref())
            .filter(|id| !seen.insert(*id))
            .count()
    }

    fn missing_files<'a>(root: &Path, files: impl Iterator<Item = &'a str>) -> Vec<String> {
        files
            .filter(|f| !root.join(f).is_file())
            .map(str::to_string)
            .collect()
    }

    fn files_detail(missing: &[String], expected: usize) -> String {
        if missing.is_empty() {
            format!("{} of {} files present", expected, expected)
        } else {
            format!("missing: {}", missing.join(", "))
        }
    }

    fn log_outcome(report: &ValidationReport) {
        for check in report.failed() {
            warn!("Validation check '{}' failed: {}", check.name, check.detail);
        }
        debug!("Validation checks: {:?}", report.checks);
        info!("Validation: {}/{} checks passed", report.passed, report.total);
    }
}

/// Name of the per-split missing-value check.
pub fn missing_check_name(split: SplitName) -> String {
    format!("no_missing_values_{}", split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::balancer::SmoteBalancer;
    use crate::pipeline::scaler::MinMaxScaler;
    use crate::pipeline::splitter::StratifiedSplitter;
    use crate::pipeline::splitter::tests::labelled_dataset;
    use crate::types::FeatureRow;

    fn prepared() -> (Splits, ScalingParams, ClassDistribution) {
        let data = labelled_dataset(400, 5);
        let full = data.class_distribution();
        let mut splits = StratifiedSplitter::new(0.15, 0.15, 0.02, 42)
            .split(&data)
            .unwrap();
        let params = MinMaxScaler::fit_transform(&mut splits).unwrap();
        SmoteBalancer::new(5, 1.0, 42)
            .balance(&mut splits.train.dataset)
            .unwrap();
        (splits, params, full)
    }

    #[test]
    fn test_clean_run_passes_all_data_checks() {
        let (splits, params, full) = prepared();
        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);

        assert_eq!(report.total, 13);
        let failed: Vec<&str> = report.failed().map(|c| c.name.as_str()).collect();
        assert!(failed.is_empty(), "unexpected failures: {failed:?}");
        assert!(report.check(&missing_check_name(SplitName::Val)).is_some());
    }

    #[test]
    fn test_each_check_is_independent() {
        let (mut splits, params, full) = prepared();
        splits.val.dataset.rows[0].values[0] = f64::NAN;
        splits
            .test
            .dataset
            .rows
            .push(FeatureRow::synthetic(splits.test.dataset.rows[0].values.clone(), 0));

        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);

        assert!(!report.check("no_missing_values_val").unwrap().passed);
        assert!(report.check("no_missing_values_train").unwrap().passed);
        assert!(!report.check("synthetic_rows_only_in_train").unwrap().passed);
        assert!(report.check("target_binary").unwrap().passed);
        assert_eq!(report.total, 13);
        assert!(report.passed < report.total);
    }

    #[test]
    fn test_unbalanced_train_is_reported() {
        let data = labelled_dataset(400, 5);
        let full = data.class_distribution();
        let mut splits = StratifiedSplitter::new(0.15, 0.15, 0.02, 42)
            .split(&data)
            .unwrap();
        let params = MinMaxScaler::fit_transform(&mut splits).unwrap();

        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);
        assert!(!report.check("train_classes_balanced").unwrap().passed);
    }

    #[test]
    fn test_class_ratio_drift_is_reported_per_split() {
        let (mut splits, params, full) = prepared();
        for row in splits.val.dataset.rows.iter_mut().filter(|r| r.label == 0).take(10) {
            row.label = 1;
        }
        splits.test.dataset.rows.retain(|r| r.label == 0);

        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);

        let val = report.check("val_class_ratio_within_tolerance").unwrap();
        assert!(!val.passed);
        assert!(val.detail.contains("tolerance 0.0200"));
        assert!(!report.check("test_class_ratio_within_tolerance").unwrap().passed);
        assert!(report.check("target_binary").unwrap().passed);
    }

    #[test]
    fn test_constant_train_feature_scales_to_zero_and_is_flagged() {
        let data = labelled_dataset(400, 5);
        let full = data.class_distribution();
        let mut splits = StratifiedSplitter::new(0.15, 0.15, 0.02, 42)
            .split(&data)
            .unwrap();
        for row in &mut splits.train.dataset.rows {
            row.values[1] = 12.0;
        }

        let params = MinMaxScaler::fit_transform(&mut splits).unwrap();
        assert_eq!(params.zero_variance(), vec!["AvgAttendanceRate".to_string()]);
        for split in splits.iter() {
            assert!(split.dataset.column(1).iter().all(|v| *v == 0.0), "{}", split.name);
        }

        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);
        let check = report.check("no_zero_variance_features").unwrap();
        assert!(!check.passed);
        assert!(check.detail.contains("AvgAttendanceRate"));
        assert!(report.check("continuous_features_in_unit_range").unwrap().passed);
    }

    #[test]
    fn test_shared_student_id_is_reported() {
        let (mut splits, params, full) = prepared();
        let id = splits.train.dataset.rows[0].student_id.clone();
        splits.test.dataset.rows[0].student_id = id;

        let report = Validator::new(0.02, 1.0).validate(&splits, &params, full);
        assert!(!report.check("student_ids_unique_across_splits").unwrap().passed);
    }

    #[test]
    fn test_artifact_checks_detect_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        for file in SPLIT_FILES {
            std::fs::write(dir.path().join(file), "x").unwrap();
        }

        let mut report = ValidationReport::default();
        Validator::check_artifacts(&mut report, dir.path(), &["plots/class_distribution.svg".to_string()]);

        assert_eq!(report.total, 3);
        assert!(report.check("split_files_exist").unwrap().passed);
        assert!(!report.check("model_artifacts_exist").unwrap().passed);
        assert!(!report.check("plots_exist").unwrap().passed);
    }
}
