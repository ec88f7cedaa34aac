//! Raw CSV ingestion.
//!
//! Every column is read as text. Type coercion belongs to the Cleaner, which
//! needs to tell a missing cell apart from a malformed one.

use crate::error::{PipelineError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Shape of the raw source as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    pub columns: usize,
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rows x {} columns", self.rows, self.columns)
    }
}

/// Reads raw student records into an all-string DataFrame.
pub struct Loader;

impl Loader {
    /// Load a CSV file with a header row.
    pub fn load(path: &Path) -> Result<(DataFrame, LoadReport)> {
        if !path.is_file() {
            return Err(PipelineError::Ingest(format!(
                "source file not found: {}",
                path.display()
            )));
        }

        debug!("Reading raw records from {}", path.display());
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::Ingest(format!("{}: {}", path.display(), e)))?;

        Self::checked(df)
    }

    /// Load CSV text already in memory.
    pub fn from_csv_text(text: &str) -> Result<(DataFrame, LoadReport)> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
            .finish()
            .map_err(|e| PipelineError::Ingest(e.to_string()))?;

        Self::checked(df)
    }

    fn checked(df: DataFrame) -> Result<(DataFrame, LoadReport)> {
        if df.width() == 0 {
            return Err(PipelineError::Ingest("source has no columns".to_string()));
        }
        if df.height() == 0 {
            return Err(PipelineError::Ingest("source has no data rows".to_string()));
        }

        let report = LoadReport {
            rows: df.height(),
            columns: df.width(),
        };
        info!("Loaded raw dataset: {}", report);
        Ok((df, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_every_column_as_text() {
        let (df, report) = Loader::from_csv_text("StudentID,GPA\nS1,3.2\nS2,\n").unwrap();
        assert_eq!(report, LoadReport { rows: 2, columns: 2 });
        assert_eq!(df.column("GPA").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_load_missing_file_is_ingest_error() {
        let err = Loader::load(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
    }

    #[test]
    fn test_load_header_only_is_ingest_error() {
        let err = Loader::from_csv_text("StudentID,GPA\n").unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
    }

    #[test]
    fn test_load_report_display() {
        let report = LoadReport { rows: 10, columns: 4 };
        assert_eq!(report.to_string(), "10 rows x 4 columns");
    }
}
