//! Student Risk Preprocessing Library
//!
//! Turns raw student engagement and academic records into model-ready
//! train/validation/test datasets for an at-risk classifier, built with Rust
//! and Polars.
//!
//! # Overview
//!
//! A run executes nine stages in order:
//!
//! - **Load**: read the raw CSV with every column as text
//! - **Clean**: enforce the column contract, drop unconvertible rows, impute, deduplicate
//! - **Engineer**: derive engagement, decline and withdrawal features and declare the schema
//! - **Cap outliers**: winsorize continuous features to the 1st/99th percentile
//! - **Split**: stratified, seeded train/validation/test partition
//! - **Scale**: min-max scaling fitted on the training split only
//! - **Balance**: SMOTE oversampling of the minority class in train
//! - **Validate**: a fixed battery of independent pass/fail checks
//! - **Write artifacts**: splits, models, reports and plots under one output slot
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use risk_processing::{Orchestrator, PipelineConfig, PipelineEvent};
//!
//! let config = PipelineConfig::builder()
//!     .input_path("data/students.csv")
//!     .output_dir("outputs")
//!     .build()?;
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(config)
//!     .on_event(|event| {
//!         if let PipelineEvent::Progress { label, detail, .. } = event {
//!             println!("{label}: {detail}");
//!         }
//!     })
//!     .build()?;
//!
//! let summary = orchestrator.start_run()?.wait()?;
//! println!("train rows: {}", summary.split_sizes.train);
//! ```
//!
//! # Single-row prediction
//!
//! Scaling parameters are persisted with the feature schema so one new row
//! can be scaled the same way as the training data:
//!
//! ```rust,ignore
//! use risk_processing::{FeatureSchema, ScalingParams};
//!
//! let params = ScalingParams::load("outputs/models/scaling_params.json".as_ref())?;
//! let schema: FeatureSchema = serde_json::from_str(&std::fs::read_to_string(
//!     "outputs/models/feature_schema.json",
//! )?)?;
//! params.transform_row(&schema, &mut values)?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{CleanedData, CleaningReport, DataCleaner};
pub use config::{ConfigValidationError, DEFAULT_SEED, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use features::{EngineeredData, FeatureEngineer};
pub use imputers::StatisticalImputer;
pub use loader::{LoadReport, Loader};
pub use pipeline::{
    BalanceReport, ChannelListener, ClosureListener, ListenerError, MinMaxScaler, Orchestrator,
    OrchestratorBuilder, OutlierCapper, OutlierReport, PipelineEvent, PipelineStage, ProgressEntry,
    ProgressListener, ProgressRecord, RunHandle, RunState, ScalingParams, SmoteBalancer, StepStatus,
    StratifiedSplitter,
};
pub use quality::Validator;
pub use reporting::{ArtifactWriter, PLOT_NAMES};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec};
pub use types::{
    ClassDistribution, Dataset, FeatureRow, MissingValueEntry, ResultsSummary, Split, SplitName,
    SplitSizes, Splits, StudentRecord, ValidationCheck, ValidationReport,
};
