//! Rendering tests: chart choice, ordering, truncation and failures.

use serde_json::{json, Value};

use campaigner::chart::{
    render, ChartError, ChartKind, ChartOptions, ChartSpec, COMPARISON_FILENAME, SVG_MIME,
    TREND_FILENAME,
};
use campaigner::tabular::normalize;

fn svg_text(bytes: &[u8]) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(err) => panic!("artifact should be utf-8: {err}"),
    }
}

#[test]
fn empty_table_is_rejected() {
    let result = render(&normalize(&json!([])), &ChartSpec::default(), &ChartOptions::default());
    assert!(matches!(result, Err(ChartError::EmptyTable)));
}

#[test]
fn text_only_table_has_no_numeric_data() {
    let table = normalize(&json!([{"name": "A", "note": "x"}, {"name": "B", "note": "y"}]));
    let result = render(&table, &ChartSpec::default(), &ChartOptions::default());
    assert!(matches!(result, Err(ChartError::NoNumericData)));
}

#[test]
fn time_series_produces_trend_then_comparison() {
    let table = normalize(&json!({
        "columns": ["date", "campaign", "cost", "leads"],
        "rows": [
            ["2024-01-02", "A", 20, 2],
            ["2024-01-01", "B", 10, 1]
        ]
    }));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");

    let names: Vec<&str> = rendered.artifacts.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec![TREND_FILENAME, COMPARISON_FILENAME]);
    assert!(rendered.warnings.is_empty());
    assert_eq!(rendered.artifacts[0].title, "Trends over time (cost, leads)");
    // The first non-numeric column labels the comparison bars.
    assert_eq!(rendered.artifacts[1].title, "Comparison by date");
    for artifact in &rendered.artifacts {
        assert_eq!(artifact.mime_type, SVG_MIME);
        assert!(svg_text(&artifact.bytes).starts_with("<svg"));
    }

    // Dates are sorted ascending on the trend x axis.
    let trend = svg_text(&rendered.artifacts[0].bytes);
    let first = trend.find("2024-01-01").expect("first date label");
    let second = trend.find("2024-01-02").expect("second date label");
    assert!(first < second);
}

#[test]
fn non_temporal_axis_gets_comparison_only() {
    let table = normalize(&json!([
        {"campaign": "A", "cost": 10},
        {"campaign": "B", "cost": 12}
    ]));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");
    assert_eq!(rendered.artifacts.len(), 1);
    assert_eq!(rendered.artifacts[0].filename, COMPARISON_FILENAME);
}

#[test]
fn bar_hint_keeps_trend_on_date_axis() {
    let table = normalize(&json!([
        {"date": "2024-01-01", "cost": 10},
        {"date": "2024-01-02", "cost": 12}
    ]));
    let spec = ChartSpec {
        chart_kind_hint: Some(ChartKind::Bar),
        ..ChartSpec::default()
    };
    let rendered = render(&table, &spec, &ChartOptions::default()).expect("render should succeed");
    let names: Vec<&str> = rendered
        .artifacts
        .iter()
        .map(|a| a.filename.as_str())
        .collect();
    assert_eq!(names, vec![TREND_FILENAME, COMPARISON_FILENAME]);
    // No non-numeric column: the time axis labels the bars.
    assert_eq!(rendered.artifacts[1].title, "Comparison by date");
}

#[test]
fn unparseable_dates_keep_order_with_warning() {
    let table = normalize(&json!([
        {"date": "2024-01-02", "cost": 10},
        {"date": "someday", "cost": 12}
    ]));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");
    assert_eq!(rendered.artifacts.len(), 2);
    assert_eq!(rendered.warnings.len(), 1);
    assert!(rendered.warnings[0].contains("date"));
}

#[test]
fn comparison_truncates_to_leading_rows() {
    let rows: Vec<Value> = (0..40)
        .map(|i| json!({"campaign": format!("c{i:02}"), "cost": i}))
        .collect();
    let table = normalize(&Value::Array(rows));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");

    let bar = svg_text(&rendered.artifacts[0].bytes);
    for i in 0..15 {
        assert!(bar.contains(&format!(">c{i:02}<")), "c{i:02} should be plotted");
    }
    for i in 15..40 {
        assert!(!bar.contains(&format!(">c{i:02}<")), "c{i:02} should be cut");
    }
    assert!(bar.find(">c00<") < bar.find(">c14<"));
}

#[test]
fn null_categories_do_not_count_toward_truncation() {
    let mut rows: Vec<Value> = vec![
        json!({"campaign": null, "cost": 1}),
        json!({"campaign": null, "cost": 2}),
    ];
    rows.extend((0..15).map(|i| json!({"campaign": format!("c{i:02}"), "cost": i})));
    let table = normalize(&Value::Array(rows));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");

    let bar = svg_text(&rendered.artifacts[0].bytes);
    assert!(bar.contains(">c13<"));
    assert!(bar.contains(">c14<"));
}

#[test]
fn threshold_is_configurable() {
    let rows: Vec<Value> = (0..6)
        .map(|i| json!({"campaign": format!("k{i}"), "cost": i}))
        .collect();
    let table = normalize(&Value::Array(rows));
    let options = ChartOptions {
        max_categories: 3,
        ..ChartOptions::default()
    };
    let rendered = render(&table, &ChartSpec::default(), &options).expect("render should succeed");
    let bar = svg_text(&rendered.artifacts[0].bytes);
    assert!(bar.contains(">k2<"));
    assert!(!bar.contains(">k3<"));
}

#[test]
fn labels_are_escaped() {
    let table = normalize(&json!([{"campaign": "A&B <x>", "cost": 1}]));
    let rendered = render(&table, &ChartSpec::default(), &ChartOptions::default())
        .expect("render should succeed");
    let bar = svg_text(&rendered.artifacts[0].bytes);
    assert!(bar.contains("A&amp;B &lt;x&gt;"));
    assert!(!bar.contains("A&B <x>"));
}
