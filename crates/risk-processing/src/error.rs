//! Error types for the risk preprocessing pipeline.
//!
//! Every stage failure maps onto one [`PipelineError`] variant. Errors are
//! serializable as `{code, message}` so a service layer can forward them to
//! clients without inspecting the variant.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the preprocessing pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The raw source could not be read or has no columns.
    #[error("Failed to ingest source: {0}")]
    Ingest(String),

    /// One or more required raw columns are entirely absent.
    #[error("Required columns missing from source: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// A feature formula lost its input or produced a row outside the schema.
    #[error("Feature engineering invariant violated: {0}")]
    FeatureEngineering(String),

    /// A partition would contain no positive-class rows.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Too few organic minority rows for neighbour search.
    #[error("Insufficient minority rows: found {found}, need at least {required}")]
    InsufficientMinority { found: usize, required: usize },

    /// A run is already in progress.
    #[error("Pipeline is already running")]
    AlreadyRunning,

    /// No run has completed yet.
    #[error("No results available: no pipeline run has completed")]
    NoResults,

    /// A named artifact does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (e.g., thread join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "INGEST_ERROR",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::FeatureEngineering(_) => "FEATURE_ENGINEERING_ERROR",
            Self::InsufficientData(_) => "INSUFFICIENT_DATA",
            Self::InsufficientMinority { .. } => "INSUFFICIENT_MINORITY",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::NoResults => "NO_RESULTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Strip context wrappers and return the underlying error.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Errors the caller can act on without the run having been attempted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.root(),
            Self::AlreadyRunning | Self::NoResults | Self::NotFound(_) | Self::InvalidConfig(_)
        )
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<crate::config::ConfigValidationError> for PipelineError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}
