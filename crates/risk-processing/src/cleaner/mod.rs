//! Data cleaning for raw student records.
//!
//! This module provides functionality for:
//! - Enforcing the required raw column contract
//! - Treating missing markers as nulls and reporting them per column
//! - Coercing columns to their raw kinds, dropping unconvertible rows
//! - Median/mode imputation
//! - Removing duplicate rows and repeated student IDs

mod converters;
mod records;
mod sanitizers;

use crate::error::{PipelineError, Result, ResultExt};
use crate::imputers::{Imputed, StatisticalImputer};
use crate::schema::{RAW_COLUMNS, RawKind};
use crate::types::{MissingValueEntry, StudentRecord};
use converters::coerce_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What the Cleaner did to the raw frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Rows with unconvertible cells, a missing ID or a missing label.
    pub invalid_rows_dropped: usize,
    pub duplicates_removed: usize,
    pub repeated_ids_removed: usize,
    pub missing_values: Vec<MissingValueEntry>,
    /// Column name to the value used for its nulls.
    pub imputed_values: BTreeMap<String, String>,
    pub ignored_columns: Vec<String>,
}

impl CleaningReport {
    pub fn dropped_rows(&self) -> usize {
        self.rows_before - self.rows_after
    }

    pub fn summary(&self) -> String {
        format!(
            "{} -> {} rows ({} dropped: {} invalid, {} duplicate, {} repeated ID); {} columns imputed",
            self.rows_before,
            self.rows_after,
            self.dropped_rows(),
            self.invalid_rows_dropped,
            self.duplicates_removed,
            self.repeated_ids_removed,
            self.imputed_values.len()
        )
    }
}

/// Cleaned records plus the report describing how they were produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedData {
    pub records: Vec<StudentRecord>,
    pub report: CleaningReport,
}

/// Data cleaner for raw student frames.
pub struct DataCleaner;

impl DataCleaner {
    /// Clean a raw all-string frame into typed records.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` when a required column is absent or has no usable
    /// values; `Ingest` when no row survives cleaning.
    pub fn clean(df: &DataFrame) -> Result<CleanedData> {
        let mut report = CleaningReport {
            rows_before: df.height(),
            ..Default::default()
        };

        info!("Cleaning {} raw rows...", df.height());

        // 1. Required columns
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let missing: Vec<String> = RAW_COLUMNS
            .iter()
            .filter(|c| !present.iter().any(|p| p == c.name))
            .map(|c| c.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }
        report.ignored_columns = present
            .into_iter()
            .filter(|p| !RAW_COLUMNS.iter().any(|c| c.name == p))
            .collect();
        if !report.ignored_columns.is_empty() {
            debug!("Ignoring extra columns: {:?}", report.ignored_columns);
        }

        // 2. Sanitize and coerce, tracking rows to drop
        let mut drop_row = vec![false; df.height()];
        let mut columns: Vec<Column> = Vec::with_capacity(RAW_COLUMNS.len());

        for raw in RAW_COLUMNS {
            let series = df
                .column(raw.name)?
                .as_materialized_series()
                .cast(&DataType::String)
                .context(format!("Reading column '{}'", raw.name))?;
            let (sanitized, missing_count) = sanitizers::nullify_missing(&series)?;

            report.missing_values.push(MissingValueEntry {
                column: raw.name.to_string(),
                missing_count,
                missing_percentage: missing_count as f64 / df.height() as f64 * 100.0,
            });

            let coerced = coerce_column(&sanitized, raw)?;
            if coerced.rejected_count() > 0 {
                debug!(
                    "Column '{}': {} unconvertible values",
                    raw.name,
                    coerced.rejected_count()
                );
            }

            // Identifier and label cannot be imputed.
            let required_per_row = matches!(raw.kind, RawKind::Identifier | RawKind::Target);
            let nulls = coerced.series.is_null();
            for (i, rejected) in coerced.rejected.iter().enumerate() {
                let null_here = nulls.get(i).unwrap_or(false);
                if *rejected || (required_per_row && null_here) {
                    drop_row[i] = true;
                }
            }

            columns.push(coerced.series.into());
        }

        let mut typed = DataFrame::new(columns)?;
        let keep: Vec<bool> = drop_row.iter().map(|d| !d).collect();
        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        typed = typed.filter(&mask)?;
        report.invalid_rows_dropped = df.height() - typed.height();

        if report.invalid_rows_dropped > 0 {
            warn!(
                "Dropped {} rows with unconvertible values or missing ID/label",
                report.invalid_rows_dropped
            );
        }
        if typed.height() == 0 {
            return Err(PipelineError::Ingest(
                "no valid rows remain after cleaning".to_string(),
            ));
        }

        // 3. Impute
        let mut empty_columns = Vec::new();
        for raw in RAW_COLUMNS {
            match raw.kind {
                RawKind::Continuous => match StatisticalImputer::fill_median(&mut typed, raw.name)? {
                    Imputed::Filled { value, .. } => {
                        report
                            .imputed_values
                            .insert(raw.name.to_string(), format!("{}", value));
                    }
                    Imputed::NoValidValues => empty_columns.push(raw.name.to_string()),
                    Imputed::NotNeeded => {}
                },
                RawKind::Categorical => match StatisticalImputer::fill_mode(&mut typed, raw.name)? {
                    Imputed::Filled { value, .. } => {
                        report.imputed_values.insert(raw.name.to_string(), value);
                    }
                    Imputed::NoValidValues => empty_columns.push(raw.name.to_string()),
                    Imputed::NotNeeded => {}
                },
                RawKind::Identifier | RawKind::Target => {}
            }
        }
        if !empty_columns.is_empty() {
            return Err(PipelineError::SchemaMismatch {
                missing: empty_columns,
            });
        }

        // 4. Typed records, then duplicates
        let records = records::to_records(&typed)?;
        let (records, dedup) = records::deduplicate(records)?;
        report.duplicates_removed = dedup.exact;
        report.repeated_ids_removed = dedup.repeated_ids;
        report.rows_after = records.len();

        if dedup.repeated_ids > 0 {
            warn!(
                "Dropped {} rows reusing an existing StudentID",
                dedup.repeated_ids
            );
        }
        info!("Cleaning complete: {}", report.summary());

        Ok(CleanedData { records, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "StudentID,Gender,Programme,YearOfStudy,EnrolmentStatus,AcademicStanding,\
AvgLoginFrequency,TotalMissed,TotalSubmitted,AvgForumActivity,AvgSessionDuration,TotalDownloads,\
TotalQuizAttempts,GPA,GPAChange,CreditCompletion,AvgAttendanceRate,AvgLibraryVisits,AvgDiningSwipes,\
AvgLateNightSessions,AvgRecreationUse,RiskLabel";

    fn row(id: &str, gpa: &str, gender: &str, label: &str) -> String {
        format!(
            "{id},{gender},BSc Data Science,2,Active,Good Standing,4.5,1,12,3.0,35.0,20,8,{gpa},0.1,90,85.0,2.0,12.0,1.0,2.0,{label}"
        )
    }

    fn frame(rows: &[String]) -> DataFrame {
        let text = format!("{}\n{}\n", HEADER, rows.join("\n"));
        Loader::from_csv_text(&text).unwrap().0
    }

    #[test]
    fn test_clean_imputes_median_and_mode() {
        let df = frame(&[
            row("S1", "2.0", "Male", "Low"),
            row("S2", "", "Female", "High"),
            row("S3", "3.0", "", "Medium"),
            row("S4", "4.0", "Female", "Low"),
        ]);

        let cleaned = DataCleaner::clean(&df).unwrap();
        assert_eq!(cleaned.records.len(), 4);
        assert_eq!(cleaned.records[1].gpa, 3.0);
        assert_eq!(cleaned.records[2].gender, "Female");
        assert!(cleaned.records[1].at_risk);
        assert!(!cleaned.records[2].at_risk);
        assert_eq!(cleaned.report.imputed_values.get("GPA"), Some(&"3".to_string()));

        let gpa_missing = cleaned
            .report
            .missing_values
            .iter()
            .find(|m| m.column == "GPA")
            .unwrap();
        assert_eq!(gpa_missing.missing_count, 1);
        assert_eq!(gpa_missing.missing_percentage, 25.0);
    }

    #[test]
    fn test_clean_drops_unconvertible_and_unlabelled_rows() {
        let df = frame(&[
            row("S1", "2.0", "Male", "Low"),
            row("S2", "abc", "Male", "Low"),
            row("S3", "9.5", "Male", "Low"),
            row("S4", "3.0", "Male", ""),
            row("", "3.0", "Male", "High"),
            row("S6", "3.5", "Female", "High"),
        ]);

        let cleaned = DataCleaner::clean(&df).unwrap();
        let ids: Vec<&str> = cleaned.records.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S6"]);
        assert_eq!(cleaned.report.invalid_rows_dropped, 4);
        assert_eq!(cleaned.report.dropped_rows(), 4);
        assert!(cleaned.report.rows_after <= cleaned.report.rows_before);
    }

    #[test]
    fn test_clean_removes_duplicates_and_repeated_ids() {
        let df = frame(&[
            row("S1", "2.0", "Male", "Low"),
            row("S1", "2.0", "Male", "Low"),
            row("S2", "3.0", "Female", "High"),
            row("S2", "3.5", "Female", "High"),
        ]);

        let cleaned = DataCleaner::clean(&df).unwrap();
        assert_eq!(cleaned.records.len(), 2);
        assert_eq!(cleaned.report.duplicates_removed, 1);
        assert_eq!(cleaned.report.repeated_ids_removed, 1);
        assert_eq!(cleaned.records[1].gpa, 3.0);
    }

    #[test]
    fn test_clean_missing_column_is_schema_mismatch() {
        let (df, _) = Loader::from_csv_text("StudentID,GPA,RiskLabel\nS1,3.0,Low\n").unwrap();
        let err = DataCleaner::clean(&df).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing } => {
                assert!(missing.contains(&"Gender".to_string()));
                assert!(!missing.contains(&"GPA".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_clean_ignores_extra_columns() {
        let text = format!(
            "{},FullName\n{},Jane Doe\n",
            HEADER,
            row("S1", "2.5", "Female", "High")
        );
        let (df, _) = Loader::from_csv_text(&text).unwrap();
        let cleaned = DataCleaner::clean(&df).unwrap();
        assert_eq!(cleaned.report.ignored_columns, vec!["FullName".to_string()]);
    }

    #[test]
    fn test_clean_no_surviving_rows_is_ingest_error() {
        let df = frame(&[row("S1", "bad", "Male", "Low")]);
        let err = DataCleaner::clean(&df).unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
    }
}
