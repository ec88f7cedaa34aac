//! Cell-level sanitization applied before type coercion.

use crate::error::Result;
use crate::utils::is_missing_marker;
use polars::prelude::*;
use tracing::debug;

/// Strip wrapping quotes and surrounding whitespace from a raw cell.
///
/// Exports from spreadsheet tools sometimes double or triple quote text
/// fields; peeling stops once the value is no longer wrapped.
pub(crate) fn strip_quotes(value: &str) -> &str {
    let mut cleaned = value.trim();
    for _ in 0..3 {
        let peeled = cleaned
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| {
                cleaned
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
            });
        match peeled {
            Some(inner) => cleaned = inner.trim(),
            None => break,
        }
    }
    cleaned
}

/// Replace missing markers with nulls and trim the remaining values.
///
/// Returns the sanitized series and how many cells were missing, counting
/// both pre-existing nulls and marker text.
pub(crate) fn nullify_missing(series: &Series) -> Result<(Series, usize)> {
    let str_series = series.str()?;
    let mut missing = 0;

    let cleaned_values: Vec<Option<String>> = str_series
        .into_iter()
        .map(|opt_val| {
            let cleaned = opt_val.map(strip_quotes).filter(|v| !is_missing_marker(v));
            if cleaned.is_none() {
                missing += 1;
            }
            cleaned.map(str::to_string)
        })
        .collect();

    if missing > 0 {
        debug!("Column '{}': {} missing cells", series.name(), missing);
    }

    Ok((Series::new(series.name().clone(), cleaned_values), missing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("  Male "), "Male");
        assert_eq!(strip_quotes("\"Female\""), "Female");
        assert_eq!(strip_quotes("\"\"\"BSc Data Science\"\"\""), "BSc Data Science");
        assert_eq!(strip_quotes("'Active'"), "Active");
        assert_eq!(strip_quotes("\""), "\"");
    }

    #[test]
    fn test_nullify_missing_counts_markers_and_nulls() {
        let series = Series::new(
            "Gender".into(),
            &[Some("Male"), Some("N/A"), None, Some(" "), Some("\"Female\"")],
        );
        let (cleaned, missing) = nullify_missing(&series).unwrap();
        assert_eq!(missing, 3);
        let values: Vec<Option<&str>> = cleaned.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("Male"), None, None, None, Some("Female")]);
    }
}
