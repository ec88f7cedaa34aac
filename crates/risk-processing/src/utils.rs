//! Shared helpers for parsing raw cells and summarising numeric columns.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Cell Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Text that stands for "no value" in exported student data.
pub const MISSING_MARKERS: [&str; 10] = [
    "error", "unknown", "n/a", "na", "nan", "null", "missing", "none", "#n/a", "-",
];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust,ignore
/// use risk_processing::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("85%"), "85");
/// assert_eq!(clean_numeric_string(" 1,204 "), "1204");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Whether a raw cell should be treated as missing rather than malformed.
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.is_empty() || MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Whether every comma in `s` separates a group of exactly three digits.
///
/// Values are dot-decimal, so `1,204` is accepted while a decimal comma such
/// as `1,5` is not.
pub fn has_valid_thousands_grouping(s: &str) -> bool {
    if !s.contains(',') {
        return true;
    }
    let mut parts = s.trim().splitn(2, '.');
    let integer = parts.next().unwrap_or_default();
    if parts.next().is_some_and(|fraction| fraction.contains(',')) {
        return false;
    }

    let digits = |group: &str| group.chars().filter(char::is_ascii_digit).count();
    let mut groups = integer.split(',');
    let leading = groups.next().map_or(0, digits);
    (1..=3).contains(&leading) && groups.all(|group| digits(group) == 3)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles percentages and thousands separators. Ambiguous commas and
/// non-finite results are rejected.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    if !has_valid_thousands_grouping(s) {
        return None;
    }
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a raw risk label into the binary target.
///
/// `High` (or `1`) is the positive class; `Medium`, `Low` and `0` are negative.
pub fn parse_risk_label(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "high" | "1" | "1.0" | "true" => Some(true),
        "medium" | "low" | "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Series Utilities
// =============================================================================

/// Most frequent value of a string Series.
///
/// Ties go to the lexicographically smallest value so repeated runs agree.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_chunked = series.str().ok()?;

    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    for val in str_chunked.into_iter().flatten() {
        *value_counts.entry(val).or_insert(0) += 1;
    }

    value_counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(val, _)| val.to_string())
}

/// Fill null values in a Float64 Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let values: Vec<f64> = series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let values: Vec<String> = series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value).to_string())
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

// =============================================================================
// Slice Statistics
// =============================================================================

/// Percentile of a sample using linear interpolation between order statistics.
///
/// `q` is a fraction in [0, 1]. Returns `None` for an empty sample.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, q))
}

/// Same as [`percentile`] for data that is already sorted ascending.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Pearson correlation, 0.0 when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        0.0
    } else {
        cov / (vx.sqrt() * vy.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("85%"), "85");
        assert_eq!(clean_numeric_string(" 1,204 "), "1204");
    }

    #[test]
    fn test_is_missing_marker() {
        assert!(is_missing_marker(""));
        assert!(is_missing_marker("   "));
        assert!(is_missing_marker("N/A"));
        assert!(is_missing_marker("  NULL "));
        assert!(is_missing_marker("NaN"));
        assert!(!is_missing_marker("0"));
        assert!(!is_missing_marker("Male"));
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("-0.75"), Some(-0.75));
        assert_eq!(parse_numeric_string("92.5%"), Some(92.5));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("abc"), None);
        assert_eq!(parse_numeric_string("inf"), None);
    }

    #[test]
    fn test_decimal_comma_is_rejected() {
        assert_eq!(parse_numeric_string("1,204"), Some(1204.0));
        assert_eq!(parse_numeric_string("$12,500.50"), Some(12500.5));
        assert_eq!(parse_numeric_string("1,5"), None);
        assert_eq!(parse_numeric_string("3,75"), None);
        assert_eq!(parse_numeric_string("1234,567"), None);
        assert_eq!(parse_numeric_string("2.5,0"), None);
        assert!(has_valid_thousands_grouping("85%"));
    }

    #[test]
    fn test_parse_risk_label() {
        assert_eq!(parse_risk_label("High"), Some(true));
        assert_eq!(parse_risk_label(" medium "), Some(false));
        assert_eq!(parse_risk_label("LOW"), Some(false));
        assert_eq!(parse_risk_label("1"), Some(true));
        assert_eq!(parse_risk_label("severe"), None);
    }

    #[test]
    fn test_string_mode_breaks_ties_deterministically() {
        let series = Series::new("test".into(), &[Some("b"), Some("a"), None, Some("b"), Some("a")]);
        assert_eq!(string_mode(&series), Some("a".to_string()));

        let series = Series::new("test".into(), &["x", "y", "y"]);
        assert_eq!(string_mode(&series), Some("y".to_string()));
    }

    #[test]
    fn test_fill_numeric_nulls() {
        let series = Series::new("test".into(), &[Some(1.0), None, Some(3.0)]);
        let filled = fill_numeric_nulls(&series, 2.0).unwrap();
        let values: Vec<Option<f64>> = filled.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [10.0, 2.0, 8.0, 4.0, 6.0];
        assert_eq!(percentile(&values, 0.0), Some(2.0));
        assert_eq!(percentile(&values, 0.5), Some(6.0));
        assert_eq!(percentile(&values, 1.0), Some(10.0));
        assert_eq!(percentile(&values, 0.25), Some(4.0));
        assert!((percentile(&values, 0.1).unwrap() - 2.8).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_std_dev_and_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((std_dev(&xs).unwrap() - 1.290_994_448_735_805_6).abs() < 1e-12);
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[5.0, 5.0, 5.0, 5.0]), 0.0);
    }
}
