//! Chart selection and rendering.
//!
//! [`render`] turns a normalized [`TabularPayload`] plus a [`ChartSpec`] hint
//! into chart artifacts without prior schema knowledge:
//!
//! 1. Time axis: the preferred column if present, else the first column named
//!    like a date, then like a day, else the first column.
//! 2. Metrics: preferred metrics that are numeric (preference order), else
//!    the first two numeric columns.
//! 3. A multi-series line chart when the time axis looks temporal, then
//!    always a categorical comparison bar chart.
//!
//! Rendering is synchronous, CPU-bound and side-effect-free.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::tabular::TabularPayload;

pub mod svg;

/// MIME type of every rendered artifact.
pub const SVG_MIME: &str = "image/svg+xml";

/// Filename of the time-series chart.
pub const TREND_FILENAME: &str = "trend_plot.svg";

/// Filename of the categorical comparison chart.
pub const COMPARISON_FILENAME: &str = "bar_comparison.svg";

/// Default number of distinct categories before the comparison chart is
/// truncated to the first rows.
pub const DEFAULT_MAX_CATEGORIES: usize = 15;

/// Number of numeric columns used when no preferred metric matches.
const FALLBACK_METRIC_COUNT: usize = 2;

/// Column-name tokens that mark a time axis, in priority order.
const TIME_TOKENS: [&str; 2] = ["date", "day"];

/// Advisory chart kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Multi-series line chart over time.
    Line,
    /// Categorical bar comparison.
    Bar,
}

/// Plotting preferences for one chart-capability call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Column to use as the x axis when present in the table.
    #[serde(default)]
    pub preferred_time_column: Option<String>,
    /// Metrics to plot, in priority order.
    #[serde(default)]
    pub preferred_metrics: Vec<String>,
    /// Optional chart kind hint.
    #[serde(default)]
    pub chart_kind_hint: Option<ChartKind>,
}

impl ChartSpec {
    /// Merge several specs into one.
    ///
    /// Takes the first non-empty time column, the union of metrics in
    /// first-seen order, and the first kind hint.
    pub fn consolidate(specs: &[ChartSpec]) -> ChartSpec {
        let mut merged = ChartSpec::default();
        for spec in specs {
            if merged.preferred_time_column.is_none() {
                merged.preferred_time_column = spec
                    .preferred_time_column
                    .clone()
                    .filter(|c| !c.trim().is_empty());
            }
            for metric in &spec.preferred_metrics {
                if !merged.preferred_metrics.contains(metric) {
                    merged.preferred_metrics.push(metric.clone());
                }
            }
            if merged.chart_kind_hint.is_none() {
                merged.chart_kind_hint = spec.chart_kind_hint;
            }
        }
        merged
    }
}

/// A rendered chart. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    /// Filename, unique within a request.
    pub filename: String,
    /// Human-readable English title.
    pub title: String,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Encoded chart.
    pub bytes: Vec<u8>,
}

/// Layout knobs for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    /// Distinct category count above which the comparison chart is cut to
    /// the first rows.
    pub max_categories: usize,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            max_categories: DEFAULT_MAX_CATEGORIES,
            width: svg::DEFAULT_WIDTH,
            height: svg::DEFAULT_HEIGHT,
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    /// Artifacts in generation order (time series first).
    pub artifacts: Vec<ChartArtifact>,
    /// Non-fatal issues encountered while rendering.
    pub warnings: Vec<String>,
}

/// Rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// The table has no rows or no columns.
    #[error("empty table, cannot plot")]
    EmptyTable,
    /// No numeric-valued column exists.
    #[error("no numeric columns found to plot")]
    NoNumericData,
    /// SVG serialization failed.
    #[error("chart rendering failed: {0}")]
    Render(#[from] std::fmt::Error),
}

/// Render charts for `table` following `spec`.
///
/// # Errors
///
/// Returns [`ChartError::EmptyTable`] for an empty table (checked first) and
/// [`ChartError::NoNumericData`] when no numeric column exists.
pub fn render(
    table: &TabularPayload,
    spec: &ChartSpec,
    options: &ChartOptions,
) -> Result<Rendered, ChartError> {
    if table.is_empty() {
        return Err(ChartError::EmptyTable);
    }
    if table.numeric_columns().is_empty() {
        return Err(ChartError::NoNumericData);
    }

    let time_axis = select_time_axis(table, spec).ok_or(ChartError::EmptyTable)?;
    let metrics = select_metrics(table, spec);
    if metrics.is_empty() {
        return Err(ChartError::NoNumericData);
    }

    let mut rendered = Rendered::default();

    if is_time_like(&time_axis) {
        let (order, unparsed) = time_order(table, &time_axis);
        if unparsed > 0 {
            rendered.warnings.push(format!(
                "{unparsed} value(s) in '{time_axis}' could not be read as dates; kept original row order"
            ));
        }
        let title = format!("Trends over time ({})", metrics.join(", "));
        let body = svg::line_chart(table, &order, &time_axis, &metrics, &title, options)?;
        rendered.artifacts.push(artifact(TREND_FILENAME, title, body));
    }

    let category = table
        .first_non_numeric_column()
        .map(str::to_owned)
        .unwrap_or_else(|| time_axis.clone());
    let subset = if table.distinct_count(&category) > options.max_categories {
        debug!(
            category = %category,
            limit = options.max_categories,
            "truncating comparison chart to leading rows"
        );
        table.head(options.max_categories)
    } else {
        table.clone()
    };
    let title = format!("Comparison by {category}");
    let body = svg::bar_chart(&subset, &category, &metrics, &title, options)?;
    rendered
        .artifacts
        .push(artifact(COMPARISON_FILENAME, title, body));

    Ok(rendered)
}

/// Pick the x-axis column.
///
/// Returns `None` only for a table without columns.
pub fn select_time_axis(table: &TabularPayload, spec: &ChartSpec) -> Option<String> {
    if let Some(preferred) = &spec.preferred_time_column {
        if table.has_column(preferred) {
            return Some(preferred.clone());
        }
    }
    for token in TIME_TOKENS {
        if let Some(column) = table
            .columns()
            .iter()
            .find(|c| c.to_lowercase().contains(token))
        {
            return Some(column.clone());
        }
    }
    table.columns().first().cloned()
}

/// Pick the metrics to plot.
///
/// Preferred metrics that are numeric columns, in preference order; else the
/// first two numeric columns in table order.
pub fn select_metrics(table: &TabularPayload, spec: &ChartSpec) -> Vec<String> {
    let numeric = table.numeric_columns();
    let mut chosen: Vec<String> = Vec::new();
    for metric in &spec.preferred_metrics {
        if numeric.contains(&metric.as_str()) && !chosen.contains(metric) {
            chosen.push(metric.clone());
        }
    }
    if chosen.is_empty() {
        chosen = numeric
            .into_iter()
            .take(FALLBACK_METRIC_COUNT)
            .map(str::to_owned)
            .collect();
    }
    chosen
}

/// Whether a column name marks a time axis.
pub fn is_time_like(column: &str) -> bool {
    let lower = column.to_lowercase();
    TIME_TOKENS.iter().any(|t| lower.contains(t))
}

/// Parse a cell as a timestamp.
pub fn parse_time(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Row order for the time axis and the number of unparseable values.
///
/// Sorted ascending when every non-null value parses; otherwise the original
/// order is kept.
fn time_order(table: &TabularPayload, column: &str) -> (Vec<usize>, usize) {
    let values = table.column_values(column);
    let parsed: Vec<Option<NaiveDateTime>> = values.iter().map(|v| parse_time(v)).collect();
    let unparsed = values
        .iter()
        .zip(&parsed)
        .filter(|(v, p)| !v.is_null() && p.is_none())
        .count();

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    if unparsed == 0 {
        // Stable: null timestamps sort first and keep relative order.
        order.sort_by_key(|&i| parsed.get(i).copied().flatten());
    }
    (order, unparsed)
}

fn artifact(filename: &str, title: String, body: String) -> ChartArtifact {
    ChartArtifact {
        filename: filename.to_owned(),
        title,
        mime_type: SVG_MIME.to_owned(),
        bytes: body.into_bytes(),
    }
}
