//! Configuration types for the preprocessing pipeline.
//!
//! Tunable knobs (seed, ratios, neighbour count, percentiles) live here and are
//! built through [`PipelineConfigBuilder`]. Feature formula thresholds are
//! deliberately absent: they are named constants in [`crate::features`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default random seed shared by the splitter and the balancer.
pub const DEFAULT_SEED: u64 = 42;

/// Configuration for the preprocessing pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use risk_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_path("data/students.csv")
///     .output_dir("outputs")
///     .seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw student records (CSV with header).
    /// Default: "data/students.csv"
    pub input_path: PathBuf,

    /// Directory that holds the latest run's artifacts.
    /// Default: "outputs"
    pub output_dir: PathBuf,

    /// Seed for split shuffling and synthetic sample generation.
    /// Default: 42
    pub seed: u64,

    /// Fraction of each class assigned to the training partition.
    /// Default: 0.70
    pub train_ratio: f64,

    /// Fraction of each class assigned to the validation partition.
    /// Default: 0.15
    pub val_ratio: f64,

    /// Fraction of each class assigned to the test partition.
    /// Default: 0.15
    pub test_ratio: f64,

    /// Maximum allowed drift (absolute fraction) between a partition's
    /// positive-class share and the full dataset's.
    /// Default: 0.02
    pub stratify_tolerance: f64,

    /// Neighbour count for minority oversampling.
    /// Default: 5
    pub smote_k: usize,

    /// Target minority/majority ratio after balancing, in (0, 1].
    /// Default: 1.0
    pub balance_ratio: f64,

    /// Lower winsorization percentile (0.0 - 1.0).
    /// Default: 0.01
    pub lower_percentile: f64,

    /// Upper winsorization percentile (0.0 - 1.0).
    /// Default: 0.99
    pub upper_percentile: f64,

    /// Whether to render diagnostic plots.
    /// Default: true
    pub generate_plots: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/students.csv"),
            output_dir: PathBuf::from("outputs"),
            seed: DEFAULT_SEED,
            train_ratio: 0.70,
            val_ratio: 0.15,
            test_ratio: 0.15,
            stratify_tolerance: 0.02,
            smote_k: 5,
            balance_ratio: 1.0,
            lower_percentile: 0.01,
            upper_percentile: 0.99,
            generate_plots: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("train_ratio", self.train_ratio),
            ("val_ratio", self.val_ratio),
            ("test_ratio", self.test_ratio),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigValidationError::InvalidRatio {
                    field: field.to_string(),
                    value,
                });
            }
        }

        let total = self.train_ratio + self.val_ratio + self.test_ratio;
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigValidationError::RatiosDoNotSumToOne(total));
        }

        if !(0.0..=1.0).contains(&self.stratify_tolerance) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "stratify_tolerance".to_string(),
                value: self.stratify_tolerance,
            });
        }

        if !(self.balance_ratio > 0.0 && self.balance_ratio <= 1.0) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "balance_ratio".to_string(),
                value: self.balance_ratio,
            });
        }

        if self.smote_k == 0 {
            return Err(ConfigValidationError::InvalidNeighbors(self.smote_k));
        }

        if !(0.0..=1.0).contains(&self.lower_percentile)
            || !(0.0..=1.0).contains(&self.upper_percentile)
            || self.lower_percentile >= self.upper_percentile
        {
            return Err(ConfigValidationError::InvalidPercentiles {
                lower: self.lower_percentile,
                upper: self.upper_percentile,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid ratio for '{field}': {value} (must be strictly between 0.0 and 1.0)")]
    InvalidRatio { field: String, value: f64 },

    #[error("Split ratios must sum to 1.0, got {0}")]
    RatiosDoNotSumToOne(f64),

    #[error("Invalid threshold for '{field}': {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid neighbour count: {0} (must be at least 1)")]
    InvalidNeighbors(usize),

    #[error("Invalid winsorization percentiles: lower {lower}, upper {upper}")]
    InvalidPercentiles { lower: f64, upper: f64 },
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    input_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    seed: Option<u64>,
    split_ratios: Option<(f64, f64, f64)>,
    stratify_tolerance: Option<f64>,
    smote_k: Option<usize>,
    balance_ratio: Option<f64>,
    percentiles: Option<(f64, f64)>,
    generate_plots: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the raw CSV source.
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set the artifact output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set train/validation/test ratios. They must sum to 1.0.
    pub fn split_ratios(mut self, train: f64, val: f64, test: f64) -> Self {
        self.split_ratios = Some((train, val, test));
        self
    }

    /// Set the stratification tolerance (absolute fraction, e.g. 0.02).
    pub fn stratify_tolerance(mut self, tolerance: f64) -> Self {
        self.stratify_tolerance = Some(tolerance);
        self
    }

    /// Set the oversampling neighbour count.
    pub fn smote_k(mut self, k: usize) -> Self {
        self.smote_k = Some(k);
        self
    }

    /// Set the target minority/majority ratio after balancing.
    pub fn balance_ratio(mut self, ratio: f64) -> Self {
        self.balance_ratio = Some(ratio);
        self
    }

    /// Set the winsorization percentiles.
    ///
    /// # Arguments
    /// * `lower` - e.g. 0.01 for the 1st percentile
    /// * `upper` - e.g. 0.99 for the 99th percentile
    pub fn percentiles(mut self, lower: f64, upper: f64) -> Self {
        self.percentiles = Some((lower, upper));
        self
    }

    /// Enable or disable plot rendering.
    pub fn generate_plots(mut self, generate: bool) -> Self {
        self.generate_plots = Some(generate);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let (train_ratio, val_ratio, test_ratio) = self.split_ratios.unwrap_or((
            defaults.train_ratio,
            defaults.val_ratio,
            defaults.test_ratio,
        ));
        let (lower_percentile, upper_percentile) = self
            .percentiles
            .unwrap_or((defaults.lower_percentile, defaults.upper_percentile));

        let config = PipelineConfig {
            input_path: self.input_path.unwrap_or(defaults.input_path),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            seed: self.seed.unwrap_or(defaults.seed),
            train_ratio,
            val_ratio,
            test_ratio,
            stratify_tolerance: self
                .stratify_tolerance
                .unwrap_or(defaults.stratify_tolerance),
            smote_k: self.smote_k.unwrap_or(defaults.smote_k),
            balance_ratio: self.balance_ratio.unwrap_or(defaults.balance_ratio),
            lower_percentile,
            upper_percentile,
            generate_plots: self.generate_plots.unwrap_or(defaults.generate_plots),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.train_ratio, 0.70);
        assert_eq!(config.val_ratio, 0.15);
        assert_eq!(config.test_ratio, 0.15);
        assert_eq!(config.stratify_tolerance, 0.02);
        assert_eq!(config.smote_k, 5);
        assert!(config.generate_plots);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .input_path("raw.csv")
            .output_dir("out")
            .seed(7)
            .split_ratios(0.8, 0.1, 0.1)
            .smote_k(3)
            .generate_plots(false)
            .build()
            .unwrap();

        assert_eq!(config.input_path, PathBuf::from("raw.csv"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.seed, 7);
        assert_eq!(config.train_ratio, 0.8);
        assert_eq!(config.smote_k, 3);
        assert!(!config.generate_plots);
    }

    #[test]
    fn test_validation_ratios_must_sum_to_one() {
        let result = PipelineConfig::builder().split_ratios(0.7, 0.2, 0.2).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::RatiosDoNotSumToOne(_)
        ));
    }

    #[test]
    fn test_validation_zero_neighbors() {
        let result = PipelineConfig::builder().smote_k(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidNeighbors(0)
        ));
    }

    #[test]
    fn test_validation_inverted_percentiles() {
        let result = PipelineConfig::builder().percentiles(0.99, 0.01).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidPercentiles { .. }
        ));
    }

    #[test]
    fn test_validation_balance_ratio_range() {
        assert!(PipelineConfig::builder().balance_ratio(0.0).build().is_err());
        assert!(PipelineConfig::builder().balance_ratio(1.5).build().is_err());
        assert!(PipelineConfig::builder().balance_ratio(0.5).build().is_ok());
    }

    #[test]
    fn test_pipeline_config_from_json() {
        let json = r#"{
            "input_path": "students.csv",
            "output_dir": "artifacts",
            "seed": 11,
            "train_ratio": 0.6,
            "val_ratio": 0.2,
            "test_ratio": 0.2,
            "stratify_tolerance": 0.03,
            "smote_k": 4,
            "balance_ratio": 0.8,
            "lower_percentile": 0.05,
            "upper_percentile": 0.95,
            "generate_plots": false
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(config.seed, 11);
        assert_eq!(config.smote_k, 4);
        assert_eq!(config.output_dir.to_str().unwrap(), "artifacts");
        assert!(config.validate().is_ok());
    }
}
