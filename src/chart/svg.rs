//! Minimal SVG drawing for line and bar charts.

use std::fmt::Write;

use serde_json::Value;

use super::ChartOptions;
use crate::tabular::TabularPayload;

/// Default canvas width in pixels.
pub const DEFAULT_WIDTH: u32 = 960;

/// Default canvas height in pixels.
pub const DEFAULT_HEIGHT: u32 = 576;

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 170.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 130.0;
const Y_TICKS: u32 = 5;
const MARKER_RADIUS: f64 = 3.5;
const GROUP_FILL: f64 = 0.8;

const PALETTE: [&str; 10] = [
    "#4C72B0", "#DD8452", "#55A868", "#C44E52", "#8172B3", "#937860", "#DA8BC3", "#8C8C8C",
    "#CCB974", "#64B5CD",
];

/// Plot-area geometry shared by both chart kinds.
struct Frame {
    width: f64,
    height: f64,
    plot_width: f64,
    plot_height: f64,
    lo: f64,
    hi: f64,
}

impl Frame {
    fn new(options: &ChartOptions, values: impl Iterator<Item = f64>) -> Self {
        let width = f64::from(options.width);
        let height = f64::from(options.height);
        let (mut lo, mut hi) = (0.0_f64, 0.0_f64);
        for v in values {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if (hi - lo).abs() < f64::EPSILON {
            hi = lo + 1.0;
        }
        Self {
            width,
            height,
            plot_width: (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            plot_height: (height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            lo,
            hi,
        }
    }

    fn y(&self, value: f64) -> f64 {
        MARGIN_TOP + self.plot_height * (1.0 - (value - self.lo) / (self.hi - self.lo))
    }

    fn slot(&self, count: usize) -> f64 {
        self.plot_width / to_f64(count.max(1))
    }

    fn bottom(&self) -> f64 {
        MARGIN_TOP + self.plot_height
    }
}

/// Draw a multi-series line chart. `order` gives the row sequence on the x axis.
///
/// # Errors
///
/// Propagates formatter errors.
pub fn line_chart(
    table: &TabularPayload,
    order: &[usize],
    x_column: &str,
    metrics: &[String],
    title: &str,
    options: &ChartOptions,
) -> Result<String, std::fmt::Error> {
    let frame = Frame::new(options, metric_values(table, order, metrics));
    let mut out = String::new();
    open(&mut out, &frame, title)?;
    axes(&mut out, &frame, x_column)?;

    let slot = frame.slot(order.len());
    for (pos, &row) in order.iter().enumerate() {
        let x = MARGIN_LEFT + slot * (to_f64(pos) + 0.5);
        x_label(&mut out, &frame, x, &cell_label(table.value(row, x_column)))?;
    }

    for (series, metric) in metrics.iter().enumerate() {
        let color = color(series);
        let mut segment: Vec<(f64, f64)> = Vec::new();
        let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
        for (pos, &row) in order.iter().enumerate() {
            match table.value(row, metric).and_then(Value::as_f64) {
                Some(v) => segment.push((MARGIN_LEFT + slot * (to_f64(pos) + 0.5), frame.y(v))),
                None => {
                    if !segment.is_empty() {
                        segments.push(std::mem::take(&mut segment));
                    }
                }
            }
        }
        if !segment.is_empty() {
            segments.push(segment);
        }

        for points in &segments {
            if points.len() > 1 {
                let path = points
                    .iter()
                    .map(|(x, y)| format!("{x:.1},{y:.1}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(
                    out,
                    r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{path}"/>"#
                )?;
            }
            for (x, y) in points {
                writeln!(
                    out,
                    r#"<circle cx="{x:.1}" cy="{y:.1}" r="{MARKER_RADIUS}" fill="{color}"/>"#
                )?;
            }
        }
    }

    legend(&mut out, &frame, metrics)?;
    out.push_str("</svg>\n");
    Ok(out)
}

/// Draw a grouped bar chart: one group per row, one bar per metric.
///
/// # Errors
///
/// Propagates formatter errors.
pub fn bar_chart(
    table: &TabularPayload,
    category: &str,
    metrics: &[String],
    title: &str,
    options: &ChartOptions,
) -> Result<String, std::fmt::Error> {
    let rows: Vec<usize> = (0..table.row_count()).collect();
    let frame = Frame::new(options, metric_values(table, &rows, metrics));
    let mut out = String::new();
    open(&mut out, &frame, title)?;
    axes(&mut out, &frame, category)?;

    let group = frame.slot(rows.len());
    let bar_width = group * GROUP_FILL / to_f64(metrics.len().max(1));
    let baseline = frame.y(0.0);

    for &row in &rows {
        let group_left = MARGIN_LEFT + group * to_f64(row);
        let first_bar = group_left + group * (1.0 - GROUP_FILL) / 2.0;
        for (series, metric) in metrics.iter().enumerate() {
            let Some(v) = table.value(row, metric).and_then(Value::as_f64) else {
                continue;
            };
            let top = frame.y(v).min(baseline);
            let height = (frame.y(v) - baseline).abs();
            let x = first_bar + bar_width * to_f64(series);
            writeln!(
                out,
                r#"<rect x="{x:.1}" y="{top:.1}" width="{bar_width:.1}" height="{height:.1}" fill="{}"/>"#,
                color(series)
            )?;
        }
        x_label(
            &mut out,
            &frame,
            group_left + group / 2.0,
            &cell_label(table.value(row, category)),
        )?;
    }

    legend(&mut out, &frame, metrics)?;
    out.push_str("</svg>\n");
    Ok(out)
}

fn open(out: &mut String, frame: &Frame, title: &str) -> std::fmt::Result {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = frame.width,
        h = frame.height
    )?;
    writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        out,
        r#"<text x="{x:.1}" y="32" font-size="18" text-anchor="middle">{t}</text>"#,
        x = frame.width / 2.0,
        t = escape(title)
    )
}

fn axes(out: &mut String, frame: &Frame, x_title: &str) -> std::fmt::Result {
    let bottom = frame.bottom();
    let right = MARGIN_LEFT + frame.plot_width;
    writeln!(
        out,
        r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom:.1}" stroke="#333"/>"##
    )?;
    writeln!(
        out,
        r##"<line x1="{MARGIN_LEFT}" y1="{bottom:.1}" x2="{right:.1}" y2="{bottom:.1}" stroke="#333"/>"##
    )?;

    let step = (frame.hi - frame.lo) / f64::from(Y_TICKS);
    for k in 0..=Y_TICKS {
        let value = frame.lo + step * f64::from(k);
        let y = frame.y(value);
        writeln!(
            out,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{right:.1}" y2="{y:.1}" stroke="#e5e5e5"/>"##
        )?;
        writeln!(
            out,
            r#"<text x="{x:.1}" y="{ty:.1}" font-size="11" text-anchor="end">{label}</text>"#,
            x = MARGIN_LEFT - 6.0,
            ty = y + 4.0,
            label = format_number(value)
        )?;
    }

    writeln!(
        out,
        r#"<text x="{x:.1}" y="{y:.1}" font-size="13" text-anchor="middle">{t}</text>"#,
        x = MARGIN_LEFT + frame.plot_width / 2.0,
        y = frame.height - 12.0,
        t = escape(x_title)
    )?;
    writeln!(
        out,
        r#"<text x="18" y="{y:.1}" font-size="13" text-anchor="middle" transform="rotate(-90 18 {y:.1})">Value</text>"#,
        y = MARGIN_TOP + frame.plot_height / 2.0
    )
}

fn x_label(out: &mut String, frame: &Frame, x: f64, label: &str) -> std::fmt::Result {
    let y = frame.bottom() + 14.0;
    writeln!(
        out,
        r#"<text x="{x:.1}" y="{y:.1}" font-size="10" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{t}</text>"#,
        t = escape(label)
    )
}

fn legend(out: &mut String, frame: &Frame, metrics: &[String]) -> std::fmt::Result {
    let x = MARGIN_LEFT + frame.plot_width + 20.0;
    for (series, metric) in metrics.iter().enumerate() {
        let y = MARGIN_TOP + 20.0 * to_f64(series);
        writeln!(
            out,
            r#"<rect x="{x:.1}" y="{y:.1}" width="12" height="12" fill="{}"/>"#,
            color(series)
        )?;
        writeln!(
            out,
            r#"<text x="{tx:.1}" y="{ty:.1}" font-size="12">{t}</text>"#,
            tx = x + 18.0,
            ty = y + 10.0,
            t = escape(metric)
        )?;
    }
    Ok(())
}

fn metric_values<'a>(
    table: &'a TabularPayload,
    rows: &'a [usize],
    metrics: &'a [String],
) -> impl Iterator<Item = f64> + 'a {
    rows.iter().flat_map(move |&row| {
        metrics
            .iter()
            .filter_map(move |m| table.value(row, m).and_then(Value::as_f64))
    })
}

fn color(series: usize) -> &'static str {
    series
        .checked_rem(PALETTE.len())
        .and_then(|i| PALETTE.get(i))
        .copied()
        .unwrap_or("#333333")
}

fn cell_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Compact tick label: integers without decimals, otherwise two places.
fn format_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 || value.abs() >= 1000.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn to_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}
