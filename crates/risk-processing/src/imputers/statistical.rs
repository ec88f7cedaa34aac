//! Statistical imputation methods.

use crate::error::Result;
use crate::utils::{fill_numeric_nulls, fill_string_nulls, string_mode};
use polars::prelude::*;
use tracing::debug;

/// Outcome of imputing one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Imputed<T> {
    /// The column had no missing values.
    NotNeeded,
    /// `count` nulls were replaced with `value`.
    Filled { value: T, count: usize },
    /// Every value was missing, so no statistic exists.
    NoValidValues,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill nulls in a Float64 column with the median of its non-null values.
    pub fn fill_median(df: &mut DataFrame, col_name: &str) -> Result<Imputed<f64>> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let count = series.null_count();
        if count == 0 {
            return Ok(Imputed::NotNeeded);
        }

        let Some(median) = series.median() else {
            return Ok(Imputed::NoValidValues);
        };

        let filled = fill_numeric_nulls(&series, median)?;
        df.replace(col_name, filled)?;
        debug!("Filled {} nulls in '{}' with median {:.4}", count, col_name, median);

        Ok(Imputed::Filled {
            value: median,
            count,
        })
    }

    /// Fill nulls in a string column with its most frequent value.
    pub fn fill_mode(df: &mut DataFrame, col_name: &str) -> Result<Imputed<String>> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let count = series.null_count();
        if count == 0 {
            return Ok(Imputed::NotNeeded);
        }

        let Some(mode) = string_mode(&series) else {
            return Ok(Imputed::NoValidValues);
        };

        let filled = fill_string_nulls(&series, &mode)?;
        df.replace(col_name, filled)?;
        debug!("Filled {} nulls in '{}' with mode '{}'", count, col_name, mode);

        Ok(Imputed::Filled { value: mode, count })
    }
}
