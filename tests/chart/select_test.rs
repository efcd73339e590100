//! Axis and metric selection tests.

use serde_json::json;

use campaigner::chart::{is_time_like, select_metrics, select_time_axis, ChartSpec};
use campaigner::tabular::normalize;

fn spec(time: Option<&str>, metrics: &[&str]) -> ChartSpec {
    ChartSpec {
        preferred_time_column: time.map(str::to_owned),
        preferred_metrics: metrics.iter().map(|m| (*m).to_owned()).collect(),
        chart_kind_hint: None,
    }
}

#[test]
fn preferred_metrics_filtered_to_numeric_columns() {
    let table = normalize(&json!([
        {"campaign": "A", "cost": 10.0, "leads": 3},
        {"campaign": "B", "cost": 12.5, "leads": 4}
    ]));
    let metrics = select_metrics(&table, &spec(None, &["CPL", "cost"]));
    assert_eq!(metrics, vec!["cost"]);
}

#[test]
fn metrics_fall_back_to_first_two_numeric_columns() {
    let table = normalize(&json!([
        {"campaign": "A", "impressions": 100, "clicks": 4, "cost": 1.0}
    ]));
    let metrics = select_metrics(&table, &spec(None, &["revenue"]));
    assert_eq!(metrics, vec!["impressions", "clicks"]);
}

#[test]
fn preferred_metric_order_is_kept() {
    let table = normalize(&json!([{"cost": 1, "leads": 2, "clicks": 3}]));
    let metrics = select_metrics(&table, &spec(None, &["clicks", "cost"]));
    assert_eq!(metrics, vec!["clicks", "cost"]);
}

#[test]
fn preferred_time_column_wins_when_present() {
    let table = normalize(&json!([{"week": "W1", "date": "2024-01-01", "cost": 1}]));
    assert_eq!(
        select_time_axis(&table, &spec(Some("week"), &[])).as_deref(),
        Some("week")
    );
}

#[test]
fn missing_preferred_time_column_falls_back_to_date_then_day() {
    let table = normalize(&json!([{"campaign": "A", "event_day": "2024-01-01", "cost": 1}]));
    assert_eq!(
        select_time_axis(&table, &spec(Some("ts"), &[])).as_deref(),
        Some("event_day")
    );

    let table = normalize(&json!([{"day": "Mon", "report_date": "2024-01-01", "cost": 1}]));
    assert_eq!(
        select_time_axis(&table, &ChartSpec::default()).as_deref(),
        Some("report_date")
    );
}

#[test]
fn first_column_is_the_last_resort_axis() {
    let table = normalize(&json!([{"campaign": "A", "cost": 1}]));
    assert_eq!(
        select_time_axis(&table, &ChartSpec::default()).as_deref(),
        Some("campaign")
    );
    assert!(!is_time_like("campaign"));
    assert!(is_time_like("Date"));
    assert!(is_time_like("event_day"));
}
