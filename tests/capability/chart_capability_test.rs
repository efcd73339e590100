//! Chart capability tests: storage, descriptors and failure outcomes.

use std::sync::Arc;

use serde_json::json;

use campaigner::artifacts::{ArtifactStore, DirArtifactStore, InMemoryArtifactStore};
use campaigner::capability::{ChartCapability, ChartStatus, ChartTool};
use campaigner::chart::{ChartOptions, ChartSpec, COMPARISON_FILENAME, TREND_FILENAME};

fn daily_payload() -> serde_json::Value {
    json!({
        "status": "SUCCESS",
        "data": {
            "columns": ["date", "cost", "leads"],
            "rows": [["2024-01-01", 10, 1], ["2024-01-02", 20, 3]]
        }
    })
}

#[test]
fn success_returns_descriptors_in_render_order() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store.clone(), ChartOptions::default());

    let outcome = tool.plot("req-1", &daily_payload(), &[ChartSpec::default()]);

    assert!(outcome.is_success());
    assert!(outcome.error.is_none());
    let names: Vec<&str> = outcome.artifacts.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec![TREND_FILENAME, COMPARISON_FILENAME]);
    assert!(outcome.artifacts.iter().all(|a| a.version == 1));
    assert_eq!(store.len(), 2);
    assert!(store.latest("req-1", TREND_FILENAME).is_some());
    assert!(store.latest("req-2", TREND_FILENAME).is_none());
}

#[test]
fn several_specs_are_consolidated_into_one_render() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store.clone(), ChartOptions::default());
    let specs = vec![
        ChartSpec {
            preferred_metrics: vec!["leads".to_owned()],
            ..ChartSpec::default()
        },
        ChartSpec::default(),
        ChartSpec {
            preferred_metrics: vec!["cost".to_owned()],
            ..ChartSpec::default()
        },
    ];

    let outcome = tool.plot("req-1", &daily_payload(), &specs);

    assert!(outcome.is_success());
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(outcome.artifacts[0].title, "Trends over time (leads, cost)");
}

#[test]
fn rerender_within_a_request_bumps_version() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store, ChartOptions::default());
    let first = tool.plot("req-1", &daily_payload(), &[ChartSpec::default()]);
    let second = tool.plot("req-1", &daily_payload(), &[ChartSpec::default()]);
    assert_eq!(first.artifacts[0].version, 1);
    assert_eq!(second.artifacts[0].version, 2);
}

#[test]
fn empty_table_is_an_error_outcome() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store.clone(), ChartOptions::default());

    let outcome = tool.plot("req-1", &json!({"status": "SUCCESS", "data": []}), &[]);

    assert_eq!(outcome.status, ChartStatus::Error);
    assert!(outcome.artifacts.is_empty());
    let failure = outcome.error.expect("failure detail");
    assert!(failure.message.contains("empty table"));
    assert!(store.is_empty());
}

#[test]
fn text_only_table_is_an_error_outcome() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store, ChartOptions::default());
    let outcome = tool.plot("req-1", &json!([{"name": "a"}]), &[ChartSpec::default()]);
    assert!(!outcome.is_success());
    assert!(outcome
        .error
        .map(|e| e.message.contains("no numeric columns"))
        .unwrap_or(false));
}

#[test]
fn outcome_serializes_with_uppercase_status() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let tool = ChartCapability::new(store, ChartOptions::default());
    let outcome = tool.plot("req-1", &daily_payload(), &[ChartSpec::default()]);
    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["artifacts"][0]["mime_type"], "image/svg+xml");
}

#[test]
fn dir_store_writes_per_request_files() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let store = Arc::new(DirArtifactStore::new(tmp.path()));
    let tool = ChartCapability::new(store.clone(), ChartOptions::default());

    let outcome = tool.plot("req-a", &daily_payload(), &[ChartSpec::default()]);
    assert!(outcome.is_success());

    let trend = store.path_for("req-a", TREND_FILENAME);
    let contents = std::fs::read_to_string(&trend).expect("trend file should exist");
    assert!(contents.starts_with("<svg"));
    assert!(store.path_for("req-a", COMPARISON_FILENAME).exists());
    assert!(!tmp.path().join("req-b").exists());
}

#[test]
fn dir_store_rejects_path_escapes() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let store = DirArtifactStore::new(tmp.path());
    let artifact = campaigner::chart::ChartArtifact {
        filename: "../escape.svg".to_owned(),
        title: "x".to_owned(),
        mime_type: "image/svg+xml".to_owned(),
        bytes: b"<svg/>".to_vec(),
    };
    assert!(store.save("req", &artifact).is_err());
    assert!(store.save("..", &artifact).is_err());
}
