//! One-hot vocabularies for the categorical raw columns.

use crate::types::StudentRecord;
use std::collections::BTreeSet;

/// A categorical column and its observed values in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotGroup {
    pub column: &'static str,
    pub categories: Vec<String>,
}

impl OneHotGroup {
    fn collect(column: &'static str, records: &[StudentRecord], value: fn(&StudentRecord) -> &str) -> Self {
        let categories: BTreeSet<&str> = records.iter().map(value).collect();
        Self {
            column,
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    /// Output column names, e.g. `Gender_Female`.
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, c.replace(' ', "_")))
            .collect()
    }

    /// Append the indicator values for `category`.
    pub fn encode_into(&self, category: &str, out: &mut Vec<f64>) {
        out.extend(
            self.categories
                .iter()
                .map(|c| if c == category { 1.0 } else { 0.0 }),
        );
    }
}

/// Vocabularies for Gender, Programme and AcademicStanding.
pub fn one_hot_groups(records: &[StudentRecord]) -> Vec<OneHotGroup> {
    vec![
        OneHotGroup::collect("Gender", records, |r| r.gender.as_str()),
        OneHotGroup::collect("Programme", records, |r| r.programme.as_str()),
        OneHotGroup::collect("AcademicStanding", records, |r| r.academic_standing.as_str()),
    ]
}
