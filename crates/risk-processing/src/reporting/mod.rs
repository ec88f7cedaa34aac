//! Artifact writing.
//!
//! This module persists one run's outputs under a single "latest run" slot:
//! - Train/validation/test splits as CSV
//! - Scaling parameters, feature schema and imputation values as JSON
//! - Missing-value and summary-statistics reports plus the results summary
//! - Diagnostic plots as SVG
//!
//! Everything is written to a staging directory first and swapped in only
//! once complete, so a failed run never replaces the previous artifacts.

mod generator;
pub mod plots;

pub use generator::{
    ARTIFACT_DIRS, ArtifactBundle, ArtifactWriter, BACKUP_DIR, FeatureSummary, RESULTS_FILE,
    STAGING_DIR, StagedArtifacts, summary_statistics,
};
pub use plots::{PLOT_NAMES, PlotInput};
