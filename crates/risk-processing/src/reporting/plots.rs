//! Diagnostic plots rendered as standalone SVG documents.

use crate::schema::FeatureKind;
use crate::types::{ClassDistribution, Dataset};
use crate::utils::{mean, pearson};

pub const CLASS_DISTRIBUTION: &str = "class_distribution";
pub const FEATURE_DISTRIBUTIONS: &str = "feature_distributions";
pub const CORRELATION_HEATMAP: &str = "correlation_heatmap";
pub const FEATURES_BY_RISK_LABEL: &str = "features_by_risk_label";

/// Every plot a run renders, addressable by name through `get_plot`.
pub const PLOT_NAMES: [&str; 4] = [
    CLASS_DISTRIBUTION,
    FEATURE_DISTRIBUTIONS,
    CORRELATION_HEATMAP,
    FEATURES_BY_RISK_LABEL,
];

/// Features shown in the histogram and per-label panels.
const HIGHLIGHTED: [&str; 6] = [
    "GPA",
    "AvgAttendanceRate",
    "AvgLoginFrequency",
    "EngagedBehaviourScore",
    "AssignmentCompletionRate",
    "LateNightRatio",
];

const HISTOGRAM_BINS: usize = 20;
const NEGATIVE_COLOUR: &str = "#4c72b0";
const POSITIVE_COLOUR: &str = "#dd5555";

/// Inputs for rendering; the dataset is the engineered, capped, unscaled data.
pub struct PlotInput<'a> {
    pub dataset: &'a Dataset,
    pub full: ClassDistribution,
    pub before_balancing: ClassDistribution,
    pub after_balancing: ClassDistribution,
}

/// Render every plot in [`PLOT_NAMES`] order.
pub fn render_all(input: &PlotInput<'_>) -> Vec<(&'static str, String)> {
    vec![
        (CLASS_DISTRIBUTION, class_distribution(input)),
        (FEATURE_DISTRIBUTIONS, feature_distributions(input.dataset)),
        (CORRELATION_HEATMAP, correlation_heatmap(input.dataset)),
        (FEATURES_BY_RISK_LABEL, features_by_risk_label(input.dataset)),
    ]
}

struct Svg {
    body: String,
    width: f64,
    height: f64,
}

impl Svg {
    fn new(width: f64, height: f64, title: &str) -> Self {
        let mut svg = Self {
            body: String::new(),
            width,
            height,
        };
        svg.rect(0.0, 0.0, width, height, "#ffffff");
        svg.text(width / 2.0, 24.0, 16.0, "middle", title);
        svg
    }

    fn push(&mut self, element: String) {
        self.body.push_str(&element);
        self.body.push('\n');
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        self.push(format!(
            r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{fill}"/>"#
        ));
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.push(format!(
            r##"<line x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}" stroke="#333333" stroke-width="1"/>"##
        ));
    }

    fn text(&mut self, x: f64, y: f64, size: f64, anchor: &str, content: &str) {
        self.push(format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-family="sans-serif" font-size="{size}" text-anchor="{anchor}">{}</text>"#,
            escape(content)
        ));
    }

    fn rotated_text(&mut self, x: f64, y: f64, size: f64, content: &str) {
        self.push(format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-family="sans-serif" font-size="{size}" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
            escape(content)
        ));
    }

    fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{}</svg>\n",
            self.body,
            w = self.width,
            h = self.height
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn legend(svg: &mut Svg, x: f64, y: f64) {
    svg.rect(x, y - 10.0, 12.0, 12.0, NEGATIVE_COLOUR);
    svg.text(x + 18.0, y, 12.0, "start", "Not at risk (0)");
    svg.rect(x + 130.0, y - 10.0, 12.0, 12.0, POSITIVE_COLOUR);
    svg.text(x + 148.0, y, 12.0, "start", "At risk (1)");
}

fn class_distribution(input: &PlotInput<'_>) -> String {
    let groups = [
        ("Cleaned dataset", input.full),
        ("Train before balancing", input.before_balancing),
        ("Train after balancing", input.after_balancing),
    ];
    let (width, height) = (720.0, 420.0);
    let (left, bottom, plot_h) = (60.0, 360.0, 280.0);
    let group_w = (width - left - 20.0) / groups.len() as f64;
    let max = groups
        .iter()
        .map(|(_, d)| d.negative.max(d.positive))
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let mut svg = Svg::new(width, height, "Class distribution before and after balancing");
    svg.line(left, bottom, width - 20.0, bottom);
    svg.line(left, bottom, left, bottom - plot_h);
    svg.text(left - 6.0, bottom - plot_h + 4.0, 11.0, "end", &max.to_string());
    svg.text(left - 6.0, bottom + 4.0, 11.0, "end", "0");

    for (g, (label, dist)) in groups.iter().enumerate() {
        let x0 = left + g as f64 * group_w + group_w * 0.15;
        let bar_w = group_w * 0.3;
        for (offset, (count, colour)) in [(dist.negative, NEGATIVE_COLOUR), (dist.positive, POSITIVE_COLOUR)]
            .into_iter()
            .enumerate()
        {
            let h = count as f64 / max * plot_h;
            let x = x0 + offset as f64 * bar_w;
            svg.rect(x, bottom - h, bar_w - 4.0, h, colour);
            svg.text(x + bar_w / 2.0 - 2.0, bottom - h - 4.0, 11.0, "middle", &count.to_string());
        }
        svg.text(x0 + bar_w, bottom + 18.0, 12.0, "middle", label);
    }
    legend(&mut svg, left, height - 16.0);
    svg.finish()
}

fn highlighted_columns(dataset: &Dataset) -> Vec<(&'static str, Vec<f64>)> {
    HIGHLIGHTED
        .iter()
        .filter_map(|name| dataset.schema.index_of(name).map(|i| (*name, dataset.column(i))))
        .collect()
}

fn feature_distributions(dataset: &Dataset) -> String {
    let columns = highlighted_columns(dataset);
    let (cols, cell_w, cell_h) = (3usize, 260.0, 200.0);
    let rows = columns.len().div_ceil(cols).max(1);
    let mut svg = Svg::new(cols as f64 * cell_w, 40.0 + rows as f64 * cell_h, "Feature distributions");

    for (n, (name, values)) in columns.iter().enumerate() {
        let ox = (n % cols) as f64 * cell_w + 30.0;
        let oy = 40.0 + (n / cols) as f64 * cell_h;
        let (plot_w, plot_h) = (cell_w - 50.0, cell_h - 60.0);
        let bottom = oy + 20.0 + plot_h;

        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let mut counts = [0usize; HISTOGRAM_BINS];
        if lo.is_finite() {
            let span = (hi - lo).max(f64::EPSILON);
            for v in values {
                let bin = (((v - lo) / span) * HISTOGRAM_BINS as f64) as usize;
                counts[bin.min(HISTOGRAM_BINS - 1)] += 1;
            }
        }
        let peak = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
        let bar_w = plot_w / HISTOGRAM_BINS as f64;

        svg.text(ox + plot_w / 2.0, oy + 12.0, 12.0, "middle", name);
        for (b, count) in counts.iter().enumerate() {
            let h = *count as f64 / peak * plot_h;
            svg.rect(ox + b as f64 * bar_w, bottom - h, bar_w - 1.0, h, NEGATIVE_COLOUR);
        }
        svg.line(ox, bottom, ox + plot_w, bottom);
        if lo.is_finite() {
            svg.text(ox, bottom + 14.0, 10.0, "start", &format!("{lo:.2}"));
            svg.text(ox + plot_w, bottom + 14.0, 10.0, "end", &format!("{hi:.2}"));
        }
    }
    svg.finish()
}

/// Blue for negative, red for positive correlation, white at zero.
fn heat_colour(r: f64) -> String {
    let t = r.clamp(-1.0, 1.0);
    let fade = |c: f64| (255.0 - (255.0 - c) * t.abs()).round() as u8;
    if t >= 0.0 {
        format!("#{:02x}{:02x}{:02x}", fade(221.0), fade(85.0), fade(85.0))
    } else {
        format!("#{:02x}{:02x}{:02x}", fade(76.0), fade(114.0), fade(176.0))
    }
}

fn correlation_heatmap(dataset: &Dataset) -> String {
    let mut columns: Vec<(String, Vec<f64>)> = dataset
        .schema
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FeatureKind::Continuous)
        .map(|(i, f)| (f.name.clone(), dataset.column(i)))
        .collect();
    columns.push((
        dataset.schema.target.name.clone(),
        dataset.rows.iter().map(|r| f64::from(r.label)).collect(),
    ));

    let n = columns.len();
    let cell = 26.0;
    let margin = 190.0;
    let size = margin + n as f64 * cell + 20.0;
    let mut svg = Svg::new(size, size, "Correlation heatmap (continuous features and target)");

    for (i, (row_name, xs)) in columns.iter().enumerate() {
        let y = margin + i as f64 * cell;
        svg.text(margin - 6.0, y + cell * 0.65, 10.0, "end", row_name);
        for (j, (_, ys)) in columns.iter().enumerate() {
            let r = if i == j { 1.0 } else { pearson(xs, ys) };
            let x = margin + j as f64 * cell;
            svg.rect(x, y, cell - 1.0, cell - 1.0, &heat_colour(r));
            svg.text(x + cell / 2.0, y + cell * 0.62, 7.0, "middle", &format!("{r:.1}"));
        }
    }
    for (j, (name, _)) in columns.iter().enumerate() {
        svg.rotated_text(margin + j as f64 * cell + cell / 2.0, margin - 6.0, 10.0, name);
    }
    svg.finish()
}

fn features_by_risk_label(dataset: &Dataset) -> String {
    let columns = highlighted_columns(dataset);
    let (width, height) = (760.0, 420.0);
    let (left, bottom, plot_h) = (50.0, 330.0, 260.0);
    let group_w = (width - left - 20.0) / columns.len().max(1) as f64;
    let mut svg = Svg::new(width, height, "Mean feature value by risk label (range-normalised)");
    svg.line(left, bottom, width - 20.0, bottom);
    svg.line(left, bottom, left, bottom - plot_h);
    svg.text(left - 6.0, bottom - plot_h + 4.0, 11.0, "end", "1.0");
    svg.text(left - 6.0, bottom + 4.0, 11.0, "end", "0.0");

    for (g, (name, values)) in columns.iter().enumerate() {
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let span = hi - lo;
        let normalise = |v: f64| if span > 0.0 { (v - lo) / span } else { 0.0 };

        let x0 = left + g as f64 * group_w + group_w * 0.15;
        let bar_w = group_w * 0.3;
        for (offset, (label, colour)) in [(0u8, NEGATIVE_COLOUR), (1u8, POSITIVE_COLOUR)]
            .into_iter()
            .enumerate()
        {
            let class_values: Vec<f64> = dataset
                .rows
                .iter()
                .zip(values)
                .filter(|(row, _)| row.label == label)
                .map(|(_, v)| normalise(*v))
                .collect();
            let avg = mean(&class_values).unwrap_or(0.0);
            let h = avg * plot_h;
            let x = x0 + offset as f64 * bar_w;
            svg.rect(x, bottom - h, bar_w - 4.0, h, colour);
        }
        svg.rotated_text(x0 + bar_w, bottom + 14.0, 11.0, name);
    }
    legend(&mut svg, left, height - 12.0);
    svg.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureEngineer;
    use crate::features::tests::record;

    fn input_for(dataset: &Dataset) -> PlotInput<'_> {
        let full = dataset.class_distribution();
        PlotInput {
            dataset,
            full,
            before_balancing: full,
            after_balancing: ClassDistribution {
                negative: full.negative,
                positive: full.negative,
            },
        }
    }

    #[test]
    fn test_render_all_produces_every_named_plot() {
        let records: Vec<_> = (0..12)
            .map(|i| record(&format!("S{i}"), 1.0 + i as f64 * 0.25, i % 3 == 0))
            .collect();
        let data = FeatureEngineer::engineer(&records).unwrap();
        let plots = render_all(&input_for(&data.dataset));

        let names: Vec<&str> = plots.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, PLOT_NAMES.to_vec());
        for (name, svg) in &plots {
            assert!(svg.starts_with("<svg"), "{name} is not an svg document");
            assert!(svg.trim_end().ends_with("</svg>"));
        }
        assert!(plots[3].1.contains("GPA"));
    }

    #[test]
    fn test_heat_colour_extremes() {
        assert_eq!(heat_colour(0.0), "#ffffff");
        assert_eq!(heat_colour(1.0), "#dd5555");
        assert_eq!(heat_colour(-1.0), "#4c72b0");
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
