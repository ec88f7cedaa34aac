//! Outlier handling module.
//!
//! Winsorizes every continuous feature to percentile bounds computed over the
//! current dataset. Runs before scaling so extreme values do not compress the
//! normal range.

use crate::error::{PipelineError, Result};
use crate::schema::FeatureKind;
use crate::types::Dataset;
use crate::utils::percentile_sorted;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Percentile bounds used for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapBounds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub bounds: BTreeMap<String, CapBounds>,
    /// Values clamped per feature; features with nothing capped are listed with 0.
    pub capped: BTreeMap<String, usize>,
}

impl OutlierReport {
    pub fn total_capped(&self) -> usize {
        self.capped.values().sum()
    }
}

/// Clamps continuous features to `[lower_percentile, upper_percentile]`.
pub struct OutlierCapper {
    lower_percentile: f64,
    upper_percentile: f64,
}

impl OutlierCapper {
    pub fn new(lower_percentile: f64, upper_percentile: f64) -> Self {
        Self {
            lower_percentile,
            upper_percentile,
        }
    }

    /// Cap in place and report how many values moved per feature.
    pub fn cap(&self, dataset: &mut Dataset) -> Result<OutlierReport> {
        if dataset.is_empty() {
            return Err(PipelineError::InsufficientData(
                "cannot cap outliers on an empty dataset".to_string(),
            ));
        }

        let mut report = OutlierReport::default();
        let continuous: Vec<(usize, String)> = dataset
            .schema
            .features
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.kind == FeatureKind::Continuous)
            .map(|(i, spec)| (i, spec.name.clone()))
            .collect();

        for (index, name) in continuous {
            let mut sorted = dataset.column(index);
            sorted.sort_by(f64::total_cmp);
            let bounds = CapBounds {
                lower: percentile_sorted(&sorted, self.lower_percentile),
                upper: percentile_sorted(&sorted, self.upper_percentile),
            };

            let mut capped = 0;
            for row in &mut dataset.rows {
                let value = row.values[index];
                let clamped = value.clamp(bounds.lower, bounds.upper);
                if clamped != value {
                    row.values[index] = clamped;
                    capped += 1;
                }
            }

            if capped > 0 {
                debug!(
                    "Capped {} values in {} to [{:.4}, {:.4}]",
                    capped, name, bounds.lower, bounds.upper
                );
            }
            report.bounds.insert(name.clone(), bounds);
            report.capped.insert(name, capped);
        }

        Ok(report)
    }
}
