//! Min-max scaling fitted on the training partition.
//!
//! Parameters are persisted so a single new row can be transformed the same
//! way at prediction time.

use crate::error::{PipelineError, Result, ResultExt};
use crate::schema::{FeatureKind, FeatureSchema};
use crate::types::{Dataset, Splits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Observed range of one continuous feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScale {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl FeatureScale {
    pub fn is_zero_variance(&self) -> bool {
        self.max == self.min
    }

    /// `(x - min) / (max - min)` clipped to [0, 1]; 0.0 for a zero-variance feature.
    pub fn scale(&self, x: f64) -> f64 {
        if self.is_zero_variance() {
            0.0
        } else {
            ((x - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        }
    }

    pub fn unscale(&self, scaled: f64) -> f64 {
        self.min + scaled * (self.max - self.min)
    }
}

/// Per-feature min/max learned from training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    pub features: Vec<FeatureScale>,
}

impl ScalingParams {
    /// Fit on every continuous feature of `train`.
    pub fn fit(train: &Dataset) -> Result<Self> {
        if train.is_empty() {
            return Err(PipelineError::InsufficientData(
                "cannot fit scaling parameters on an empty training split".to_string(),
            ));
        }

        let features = train
            .schema
            .features
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.kind == FeatureKind::Continuous)
            .map(|(index, spec)| {
                let (min, max) = train.rows.iter().map(|r| r.values[index]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), v| (lo.min(v), hi.max(v)),
                );
                FeatureScale {
                    name: spec.name.clone(),
                    min,
                    max,
                }
            })
            .collect();

        Ok(Self { features })
    }

    pub fn get(&self, name: &str) -> Option<&FeatureScale> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn zero_variance(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.is_zero_variance())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Scale one feature vector laid out by `schema`.
    pub fn transform_row(&self, schema: &FeatureSchema, values: &mut [f64]) -> Result<()> {
        if values.len() != schema.len() {
            return Err(PipelineError::FeatureEngineering(format!(
                "row has {} values, schema declares {}",
                values.len(),
                schema.len()
            )));
        }
        for scale in &self.features {
            let index = schema.index_of(&scale.name).ok_or_else(|| {
                PipelineError::FeatureEngineering(format!(
                    "scaled feature '{}' missing from schema",
                    scale.name
                ))
            })?;
            values[index] = scale.scale(values[index]);
        }
        Ok(())
    }

    /// Scale every row of a dataset in place.
    pub fn transform(&self, dataset: &mut Dataset) -> Result<()> {
        let schema = dataset.schema.clone();
        for row in &mut dataset.rows {
            self.transform_row(&schema, &mut row.values)?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context(format!("Writing {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fits on the training split and applies the same parameters to all three.
pub struct MinMaxScaler;

impl MinMaxScaler {
    pub fn fit_transform(splits: &mut Splits) -> Result<ScalingParams> {
        let params = ScalingParams::fit(&splits.train.dataset)?;

        splits.train.dataset = Self::scaled(&params, &splits.train.dataset)?;
        splits.val.dataset = Self::scaled(&params, &splits.val.dataset)?;
        splits.test.dataset = Self::scaled(&params, &splits.test.dataset)?;

        let zero_variance = params.zero_variance();
        if !zero_variance.is_empty() {
            warn!(
                "Zero-variance features scaled to constant 0.0: {:?}",
                zero_variance
            );
        }
        debug!("Scaling parameters: {:?}", params.features);
        info!(
            "Scaled {} continuous features using training range",
            params.features.len()
        );

        Ok(params)
    }

    fn scaled(params: &ScalingParams, dataset: &Dataset) -> Result<Dataset> {
        let mut out = dataset.clone();
        params.transform(&mut out)?;
        Ok(out)
    }
}
