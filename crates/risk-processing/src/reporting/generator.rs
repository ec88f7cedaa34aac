//! Staged artifact writer for one run's splits, models and reports.

use crate::cleaner::CleaningReport;
use crate::error::{Result, ResultExt};
use crate::pipeline::scaler::ScalingParams;
use crate::reporting::plots::{self, PlotInput};
use crate::schema::{FeatureKind, STUDENT_ID, SYNTHETIC_MARKER};
use crate::types::{Dataset, MissingValueEntry, ResultsSummary, Split};
use crate::utils::{mean, percentile_sorted, std_dev};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Top-level directories of one run's output, swapped in together.
pub const ARTIFACT_DIRS: [&str; 4] = ["data", "models", "reports", "plots"];
pub const STAGING_DIR: &str = ".staging";
/// Holds the previous run's directories while a commit is in progress.
pub const BACKUP_DIR: &str = ".previous";
pub const RESULTS_FILE: &str = "reports/preprocessing_results.json";

/// One row of `reports/summary_statistics.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Describe every continuous feature of a dataset.
pub fn summary_statistics(dataset: &Dataset) -> Vec<FeatureSummary> {
    dataset
        .schema
        .features
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.kind == FeatureKind::Continuous)
        .filter_map(|(index, spec)| {
            let mut values = dataset.column(index);
            if values.is_empty() {
                return None;
            }
            values.sort_by(f64::total_cmp);
            Some(FeatureSummary {
                feature: spec.name.clone(),
                count: values.len(),
                mean: mean(&values).unwrap_or(0.0),
                std: std_dev(&values).unwrap_or(0.0),
                min: values[0],
                q25: percentile_sorted(&values, 0.25),
                median: percentile_sorted(&values, 0.5),
                q75: percentile_sorted(&values, 0.75),
                max: values[values.len() - 1],
            })
        })
        .collect()
}

/// Everything the writer persists for a run, except the results summary.
pub struct ArtifactBundle<'a> {
    pub splits: [&'a Split; 3],
    pub scaling: &'a ScalingParams,
    pub cleaning: &'a CleaningReport,
    pub summary_statistics: &'a [FeatureSummary],
    /// `None` when plot generation is disabled.
    pub plots: Option<PlotInput<'a>>,
}

/// Writes a run's artifacts into a staging directory, then swaps them in.
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact under `<output_dir>/.staging`.
    ///
    /// Nothing under the live output directories is touched until
    /// [`StagedArtifacts::commit`].
    pub fn stage(&self, bundle: &ArtifactBundle<'_>) -> Result<StagedArtifacts> {
        let root = self.output_dir.join(STAGING_DIR);
        if root.exists() {
            fs::remove_dir_all(&root).context("Clearing stale staging directory")?;
        }
        for dir in ARTIFACT_DIRS {
            fs::create_dir_all(root.join(dir))
                .context(format!("Creating {}", root.join(dir).display()))?;
        }

        // Dropping `staged` on an early return removes the partial tree.
        let mut staged = StagedArtifacts {
            root,
            output_dir: self.output_dir.clone(),
            plots: Vec::new(),
            committed: false,
        };

        for split in bundle.splits {
            let path = staged.root.join(format!("data/{}.csv", split.name));
            write_csv(&mut split_frame(&split.dataset)?, &path)?;
            debug!("Staged {} ({} rows)", path.display(), split.dataset.len());
        }

        bundle
            .scaling
            .save(&staged.root.join("models/scaling_params.json"))?;
        write_json(
            &staged.root.join("models/feature_schema.json"),
            &bundle.splits[0].dataset.schema,
        )?;
        write_json(
            &staged.root.join("models/imputation_values.json"),
            &bundle.cleaning.imputed_values,
        )?;

        write_csv(
            &mut missing_values_frame(&bundle.cleaning.missing_values)?,
            &staged.root.join("reports/missing_values_report.csv"),
        )?;
        write_csv(
            &mut summary_statistics_frame(bundle.summary_statistics)?,
            &staged.root.join("reports/summary_statistics.csv"),
        )?;

        if let Some(input) = &bundle.plots {
            for (name, svg) in plots::render_all(input) {
                let relative = format!("plots/{}.svg", name);
                fs::write(staged.root.join(&relative), svg)
                    .context(format!("Writing plot {}", name))?;
                staged.plots.push(relative);
            }
        }

        info!("Staged artifacts in {}", staged.root.display());
        Ok(staged)
    }
}

/// A fully written artifact tree waiting to replace the live one.
pub struct StagedArtifacts {
    root: PathBuf,
    output_dir: PathBuf,
    plots: Vec<String>,
    committed: bool,
}

impl StagedArtifacts {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Plot files written, relative to the artifact root.
    pub fn plot_files(&self) -> &[String] {
        &self.plots
    }

    /// Write the results summary and replace the previous run's artifacts.
    ///
    /// The live directories are first moved aside into [`BACKUP_DIR`]; if any
    /// step fails, the new directories are removed and the backup restored.
    pub fn commit(mut self, summary: &ResultsSummary) -> Result<()> {
        write_json(&self.root.join(RESULTS_FILE), summary)?;

        let backup = self.output_dir.join(BACKUP_DIR);
        if backup.exists() {
            fs::remove_dir_all(&backup).context("Clearing stale backup directory")?;
        }
        fs::create_dir_all(&backup).context(format!("Creating {}", backup.display()))?;

        let mut swap = Swap::default();
        if let Err(e) = self.swap_in(&backup, &mut swap) {
            self.roll_back(&backup, &swap);
            return Err(e);
        }

        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!("Could not remove backup directory {}: {}", backup.display(), e);
        }
        fs::remove_dir_all(&self.root).context("Removing staging directory")?;
        self.committed = true;

        info!("Artifacts written to {}", self.output_dir.display());
        Ok(())
    }

    fn swap_in(&self, backup: &Path, swap: &mut Swap) -> Result<()> {
        for dir in ARTIFACT_DIRS {
            let live = self.output_dir.join(dir);
            if live.exists() {
                fs::rename(&live, backup.join(dir))
                    .context(format!("Moving aside previous {}", live.display()))?;
                swap.backed_up.push(dir);
            }
        }
        for dir in ARTIFACT_DIRS {
            let live = self.output_dir.join(dir);
            fs::rename(self.root.join(dir), &live)
                .context(format!("Publishing {}", live.display()))?;
            swap.published.push(dir);
        }
        Ok(())
    }

    fn roll_back(&self, backup: &Path, swap: &Swap) {
        warn!("Artifact swap failed; restoring previous run");
        for dir in &swap.published {
            let live = self.output_dir.join(dir);
            if let Err(e) = fs::remove_dir_all(&live) {
                warn!("Could not remove partial {}: {}", live.display(), e);
            }
        }
        for dir in &swap.backed_up {
            let live = self.output_dir.join(dir);
            if let Err(e) = fs::rename(backup.join(dir), &live) {
                warn!("Could not restore {}: {}", live.display(), e);
            }
        }
        if let Err(e) = fs::remove_dir_all(backup) {
            warn!("Could not remove backup directory {}: {}", backup.display(), e);
        }
    }
}

/// Directories moved so far during a commit.
#[derive(Default)]
struct Swap {
    backed_up: Vec<&'static str>,
    published: Vec<&'static str>,
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        if !self.committed && self.root.exists() {
            if let Err(e) = fs::remove_dir_all(&self.root) {
                warn!("Could not remove staging directory {}: {}", self.root.display(), e);
            }
        }
    }
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .context(format!("Writing {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())
        .context(format!("Writing {}", path.display()))
}

/// `StudentID`, features in schema order, target, synthetic marker.
fn split_frame(dataset: &Dataset) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(dataset.schema.len() + 3);

    let ids: Vec<Option<&str>> = dataset
        .rows
        .iter()
        .map(|r| r.student_id.as_deref())
        .collect();
    columns.push(Series::new(STUDENT_ID.into(), ids).into());

    for (index, spec) in dataset.schema.features.iter().enumerate() {
        columns.push(Series::new(spec.name.as_str().into(), dataset.column(index)).into());
    }

    let labels: Vec<i32> = dataset.rows.iter().map(|r| i32::from(r.label)).collect();
    columns.push(Series::new(dataset.schema.target.name.as_str().into(), labels).into());

    let synthetic: Vec<bool> = dataset.rows.iter().map(|r| r.synthetic).collect();
    columns.push(Series::new(SYNTHETIC_MARKER.into(), synthetic).into());

    Ok(DataFrame::new(columns)?)
}

fn missing_values_frame(entries: &[MissingValueEntry]) -> Result<DataFrame> {
    let names: Vec<&str> = entries.iter().map(|e| e.column.as_str()).collect();
    let counts: Vec<u64> = entries.iter().map(|e| e.missing_count as u64).collect();
    let percentages: Vec<f64> = entries.iter().map(|e| e.missing_percentage).collect();
    Ok(DataFrame::new(vec![
        Series::new("column".into(), names).into(),
        Series::new("missing_count".into(), counts).into(),
        Series::new("missing_percentage".into(), percentages).into(),
    ])?)
}

fn summary_statistics_frame(rows: &[FeatureSummary]) -> Result<DataFrame> {
    let stat = |f: fn(&FeatureSummary) -> f64| -> Vec<f64> { rows.iter().map(f).collect() };
    let names: Vec<&str> = rows.iter().map(|r| r.feature.as_str()).collect();
    let counts: Vec<u64> = rows.iter().map(|r| r.count as u64).collect();
    Ok(DataFrame::new(vec![
        Series::new("feature".into(), names).into(),
        Series::new("count".into(), counts).into(),
        Series::new("mean".into(), stat(|r| r.mean)).into(),
        Series::new("std".into(), stat(|r| r.std)).into(),
        Series::new("min".into(), stat(|r| r.min)).into(),
        Series::new("25%".into(), stat(|r| r.q25)).into(),
        Series::new("50%".into(), stat(|r| r.median)).into(),
        Series::new("75%".into(), stat(|r| r.q75)).into(),
        Series::new("max".into(), stat(|r| r.max)).into(),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scaler::MinMaxScaler;
    use crate::pipeline::splitter::StratifiedSplitter;
    use crate::pipeline::splitter::tests::labelled_dataset;
    use crate::types::Splits;
    use pretty_assertions::assert_eq;

    fn staged_splits() -> (Splits, ScalingParams) {
        let data = labelled_dataset(100, 4);
        let mut splits = StratifiedSplitter::new(0.15, 0.15, 0.02, 42)
            .split(&data)
            .unwrap();
        let params = MinMaxScaler::fit_transform(&mut splits).unwrap();
        (splits, params)
    }

    fn cleaning() -> CleaningReport {
        let mut report = CleaningReport::default();
        report.missing_values.push(MissingValueEntry {
            column: "GPA".to_string(),
            missing_count: 2,
            missing_percentage: 2.0,
        });
        report.imputed_values.insert("GPA".to_string(), "2.9".to_string());
        report
    }

    #[test]
    fn test_summary_statistics_quartiles() {
        let data = labelled_dataset(5, 2);
        let stats = summary_statistics(&data);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].feature, "GPA");
        assert_eq!(stats[0].count, 5);
        assert_eq!(stats[0].min, 0.0);
        assert_eq!(stats[0].q25, 1.0);
        assert_eq!(stats[0].median, 2.0);
        assert_eq!(stats[0].max, 4.0);
        assert_eq!(stats[0].mean, 2.0);
    }

    #[test]
    fn test_stage_then_commit_publishes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (splits, params) = staged_splits();
        let cleaning = cleaning();
        let stats = summary_statistics(&splits.train.dataset);
        let writer = ArtifactWriter::new(dir.path());

        let staged = writer
            .stage(&ArtifactBundle {
                splits: [&splits.train, &splits.val, &splits.test],
                scaling: &params,
                cleaning: &cleaning,
                summary_statistics: &stats,
                plots: None,
            })
            .unwrap();
        assert!(staged.root().join("data/train.csv").is_file());
        assert!(!dir.path().join("data").exists());
        assert!(staged.plot_files().is_empty());

        let summary: ResultsSummary = serde_json::from_value(serde_json::json!({
            "completed_at": "2026-01-01T00:00:00+00:00",
            "duration_ms": 1, "seed": 42, "raw_rows": 100, "raw_columns": 22,
            "clean_rows": 100, "dropped_rows": 0, "duplicates_removed": 0,
            "feature_count": 2, "feature_names": ["GPA", "AvgAttendanceRate"],
            "engineered_features": [],
            "split_sizes": {"train": 70, "train_organic": 70, "train_synthetic": 0, "val": 15, "test": 15},
            "class_distribution_full": {"negative": 75, "positive": 25},
            "class_distribution_before_balancing": {"negative": 52, "positive": 18},
            "class_distribution_after_balancing": {"negative": 52, "positive": 18},
            "missing_values": [], "imputed_values": {}, "outliers_capped": {},
            "zero_variance_features": [],
            "validation": {"passed": 0, "total": 0, "checks": []},
            "plots": [], "output_dir": dir.path()
        }))
        .unwrap();
        staged.commit(&summary).unwrap();

        assert!(!dir.path().join(STAGING_DIR).exists());
        let train = fs::read_to_string(dir.path().join("data/train.csv")).unwrap();
        let header = train.lines().next().unwrap();
        assert_eq!(header, "StudentID,GPA,AvgAttendanceRate,RiskBinary,IsSynthetic");
        assert_eq!(train.lines().count(), splits.train.dataset.len() + 1);

        let reloaded = ScalingParams::load(&dir.path().join("models/scaling_params.json")).unwrap();
        assert_eq!(reloaded, params);
        let missing = fs::read_to_string(dir.path().join("reports/missing_values_report.csv")).unwrap();
        assert!(missing.starts_with("column,missing_count,missing_percentage"));
        assert!(dir.path().join(RESULTS_FILE).is_file());
    }

    #[test]
    fn test_failed_commit_restores_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["data", "models"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("data/train.csv"), "previous").unwrap();
        fs::write(dir.path().join("models/scaling_params.json"), "{}").unwrap();

        let (splits, params) = staged_splits();
        let cleaning = cleaning();
        let staged = ArtifactWriter::new(dir.path())
            .stage(&ArtifactBundle {
                splits: [&splits.train, &splits.val, &splits.test],
                scaling: &params,
                cleaning: &cleaning,
                summary_statistics: &[],
                plots: None,
            })
            .unwrap();

        // `data` publishes, then `models` cannot be moved into place.
        fs::remove_dir_all(staged.root().join("models")).unwrap();
        let summary = ResultsSummary {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(staged.commit(&summary).is_err());

        assert_eq!(
            fs::read_to_string(dir.path().join("data/train.csv")).unwrap(),
            "previous"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("models/scaling_params.json")).unwrap(),
            "{}"
        );
        assert!(!dir.path().join("reports").exists());
        assert!(!dir.path().join(BACKUP_DIR).exists());
        assert!(!dir.path().join(STAGING_DIR).exists());
    }

    #[test]
    fn test_dropped_stage_leaves_previous_run_intact() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/train.csv"), "previous").unwrap();

        let (splits, params) = staged_splits();
        let cleaning = cleaning();
        let staged = ArtifactWriter::new(dir.path())
            .stage(&ArtifactBundle {
                splits: [&splits.train, &splits.val, &splits.test],
                scaling: &params,
                cleaning: &cleaning,
                summary_statistics: &[],
                plots: None,
            })
            .unwrap();
        drop(staged);

        assert!(!dir.path().join(STAGING_DIR).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("data/train.csv")).unwrap(),
            "previous"
        );
    }
}
