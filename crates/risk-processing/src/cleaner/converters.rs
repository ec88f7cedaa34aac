//! Coercion of sanitized text columns into their raw kinds.
//!
//! Each converter returns the typed series plus a per-row flag marking cells
//! that were present but could not be converted. Those rows are dropped by
//! the Cleaner rather than imputed.

use crate::error::Result;
use crate::schema::{RawColumn, RawKind};
use crate::utils::{parse_numeric_string, parse_risk_label};
use polars::prelude::*;

/// A coerced column and the rows it rejected.
pub(crate) struct Coerced {
    pub series: Series,
    pub rejected: Vec<bool>,
}

impl Coerced {
    pub fn rejected_count(&self) -> usize {
        self.rejected.iter().filter(|r| **r).count()
    }
}

/// Coerce a sanitized string column according to its contract.
pub(crate) fn coerce_column(series: &Series, column: &RawColumn) -> Result<Coerced> {
    match column.kind {
        RawKind::Continuous => coerce_numeric(series, column),
        RawKind::Target => coerce_target(series),
        RawKind::Identifier | RawKind::Categorical => Ok(Coerced {
            series: series.clone(),
            rejected: vec![false; series.len()],
        }),
    }
}

fn coerce_numeric(series: &Series, column: &RawColumn) -> Result<Coerced> {
    let str_series = series.str()?;
    let mut rejected = Vec::with_capacity(series.len());
    let mut values: Vec<Option<f64>> = Vec::with_capacity(series.len());

    for cell in str_series.into_iter() {
        match cell {
            None => {
                values.push(None);
                rejected.push(false);
            }
            Some(text) => match parse_numeric_string(text).filter(|v| column.accepts(*v)) {
                Some(v) => {
                    values.push(Some(v));
                    rejected.push(false);
                }
                None => {
                    values.push(None);
                    rejected.push(true);
                }
            },
        }
    }

    Ok(Coerced {
        series: Series::new(series.name().clone(), values),
        rejected,
    })
}

/// Labels become 1.0 / 0.0. Unknown label text is rejected; a missing label
/// stays null and is dropped later since a target cannot be imputed.
fn coerce_target(series: &Series) -> Result<Coerced> {
    let str_series = series.str()?;
    let mut rejected = Vec::with_capacity(series.len());
    let mut values: Vec<Option<f64>> = Vec::with_capacity(series.len());

    for cell in str_series.into_iter() {
        let parsed = cell.map(parse_risk_label);
        rejected.push(matches!(parsed, Some(None)));
        values.push(parsed.flatten().map(|positive| if positive { 1.0 } else { 0.0 }));
    }

    Ok(Coerced {
        series: Series::new(series.name().clone(), values),
        rejected,
    })
}
