//! Imputation of missing values in cleaned columns.
//!
//! Continuous columns take the median of their observed values and
//! categorical columns take the mode. Both are recomputed from the data on
//! every run.

mod statistical;

pub use statistical::{Imputed, StatisticalImputer};
