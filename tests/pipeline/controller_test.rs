//! Controller tests with scripted capabilities.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use campaigner::artifacts::InMemoryArtifactStore;
use campaigner::capability::contract::RequestEnvelope;
use campaigner::capability::{
    Capabilities, CapabilityName, CapabilityRegistry, CapabilityResult, ChartCapability,
    ChartOutcome, ChartTool, Specialist,
};
use campaigner::chart::{ChartOptions, ChartSpec, COMPARISON_FILENAME, TREND_FILENAME};
use campaigner::pipeline::{
    BrandPolicy, Controller, PipelineState, RequestContext, TerminationReason,
};
use campaigner::report::{FinalReport, Section};

// ---------------------------------------------------------------------------
// Scripted capabilities
// ---------------------------------------------------------------------------

struct Scripted {
    result: CapabilityResult,
    requests: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(result: CapabilityResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn success(payload: Value) -> Arc<Self> {
        Self::new(CapabilityResult::Success { payload })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Specialist for Scripted {
    async fn call(&self, request: &str) -> CapabilityResult {
        self.requests.lock().expect("lock").push(request.to_owned());
        self.result.clone()
    }
}

struct RecordingChart {
    inner: ChartCapability,
    calls: Mutex<Vec<(Value, Vec<ChartSpec>)>>,
}

impl RecordingChart {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: ChartCapability::new(
                Arc::new(InMemoryArtifactStore::new()),
                ChartOptions::default(),
            ),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(Value, Vec<ChartSpec>)> {
        self.calls.lock().expect("lock").clone()
    }
}

impl ChartTool for RecordingChart {
    fn plot(&self, request_id: &str, data_payload: &Value, plots: &[ChartSpec]) -> ChartOutcome {
        self.calls
            .lock()
            .expect("lock")
            .push((data_payload.clone(), plots.to_vec()));
        self.inner.plot(request_id, data_payload, plots)
    }
}

struct Harness {
    data: Arc<Scripted>,
    performance: Arc<Scripted>,
    creative: Arc<Scripted>,
    research: Arc<Scripted>,
    chart: Arc<RecordingChart>,
}

impl Harness {
    fn new(data: Arc<Scripted>) -> Self {
        Self {
            data,
            performance: Scripted::success(performance_payload()),
            creative: Scripted::success(json!({"summary": "Video concepts lead."})),
            research: Scripted::success(json!({
                "summary": "Competitor launched a promo.",
                "sources": [{"title": "Launch", "publisher": "Globes", "date": "2024-05-01", "url": "https://example.com/a"}]
            })),
            chart: RecordingChart::new(),
        }
    }

    fn with_performance(mut self, performance: Arc<Scripted>) -> Self {
        self.performance = performance;
        self
    }

    fn controller(&self, language: &str) -> Controller {
        let registry = CapabilityRegistry::standard().expect("standard registry");
        let capabilities = Capabilities {
            data: self.data.clone(),
            performance: self.performance.clone(),
            creative: self.creative.clone(),
            research: self.research.clone(),
            chart: self.chart.clone(),
        };
        Controller::new(Arc::new(registry), capabilities, policy(language))
    }

    async fn run(&self, request: &str) -> (FinalReport, RequestContext) {
        let controller = self.controller("en");
        let plan = controller.plan(request);
        controller
            .execute(request, plan)
            .await
            .expect("pipeline should not fault")
    }
}

fn policy(language: &str) -> BrandPolicy {
    BrandPolicy {
        default_brand: "Tami4".to_owned(),
        aliases: vec!["תמי4".to_owned()],
        language: language.to_owned(),
    }
}

fn daily_data() -> Value {
    json!({
        "status": "SUCCESS",
        "sql": "SELECT date, cost, leads FROM t",
        "assumptions": ["Last 30 days"],
        "data": {
            "columns": ["date", "cost", "leads"],
            "rows": [
                ["2024-01-01", 100.0, 4],
                ["2024-01-02", 120.0, 6],
                ["2024-01-03", 90.0, 5]
            ]
        },
        "notes": [],
        "error": null
    })
}

fn performance_payload() -> Value {
    json!({
        "diagnosis_he": "CPL improved week over week.",
        "key_metrics": [{"name": "CPL", "value": 19.5, "wow_change": "-8%"}],
        "segments": ["Search carries most leads."],
        "recommendations": [{"priority": "IMMEDIATE", "action": "Shift budget to search", "why": "Lowest CPL"}],
        "plotting_handoff": {"preferred_time_column": "date", "preferred_metrics": ["cost", "leads"]}
    })
}

fn names(ctx: &RequestContext) -> Vec<CapabilityName> {
    ctx.trace().iter().map(|t| t.capability).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn performance_with_chart_end_to_end() {
    let harness = Harness::new(Scripted::success(daily_data()));

    let (report, ctx) = harness
        .run("show me last 30 days performance with a chart")
        .await;

    assert_eq!(
        names(&ctx),
        vec![
            CapabilityName::Data,
            CapabilityName::Performance,
            CapabilityName::Chart
        ]
    );
    assert_eq!(ctx.state(), PipelineState::Assembled);
    assert_eq!(ctx.termination_reason(), TerminationReason::Complete);

    // Performance received the data payload.
    let perf_requests = harness.performance.requests();
    assert_eq!(perf_requests.len(), 1);
    let envelope = RequestEnvelope::parse(&perf_requests[0]).expect("envelope");
    assert_eq!(envelope.data_payload, Some(daily_data()));
    assert_eq!(envelope.brand_context.brand, "Tami4");

    // One chart call carrying the data and one spec.
    let chart_calls = harness.chart.calls();
    assert_eq!(chart_calls.len(), 1);
    assert_eq!(chart_calls[0].0, daily_data());
    assert_eq!(chart_calls[0].1.len(), 1);
    assert_eq!(
        chart_calls[0].1[0].preferred_time_column.as_deref(),
        Some("date")
    );

    let sections = report.sections().expect("complete report");
    assert_eq!(
        sections.graphs,
        vec![TREND_FILENAME.to_owned(), COMPARISON_FILENAME.to_owned()]
    );
    assert!(sections.warnings.is_empty());
    assert_eq!(
        sections.rendered_sections(),
        vec![
            Section::Summary,
            Section::KeyMetrics,
            Section::Graphs,
            Section::Insights,
            Section::NextSteps
        ]
    );
    assert_eq!(sections.key_metrics, vec!["CPL: 19.5 (-8%)"]);

    // Filenames appear only under Graphs.
    let text = report.to_string();
    assert_eq!(text.matches(TREND_FILENAME).count(), 1);
    assert!(!text.contains("Warnings"));
}

#[tokio::test]
async fn every_capability_is_invoked_at_most_once() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let (_, ctx) = harness
        .run("performance and creative review for last week with 2 charts, plus competitor news")
        .await;

    let trace = names(&ctx);
    for name in CapabilityName::ALL {
        assert!(
            trace.iter().filter(|n| **n == name).count() <= 1,
            "{name} invoked more than once"
        );
    }
    assert_eq!(
        trace,
        vec![
            CapabilityName::Data,
            CapabilityName::Performance,
            CapabilityName::Creative,
            CapabilityName::Chart,
            CapabilityName::Research
        ]
    );
    assert_eq!(ctx.state(), PipelineState::Assembled);
}

#[tokio::test]
async fn three_requested_charts_make_one_call() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let (report, _) = harness
        .run("show me 3 charts of cost for last week")
        .await;

    let calls = harness.chart.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.len(), 3);
    assert!(report.sections().is_some());
}

#[tokio::test]
async fn data_clarification_is_returned_verbatim() {
    let question = "לאיזה טווח תאריכים התכוונת?";
    let harness = Harness::new(Scripted::new(CapabilityResult::Clarification {
        question: question.to_owned(),
    }));

    let (report, ctx) = harness.run("performance with a chart").await;

    assert_eq!(
        report,
        FinalReport::Clarification {
            question: question.to_owned()
        }
    );
    assert_eq!(report.to_string().trim_end(), question);
    assert_eq!(names(&ctx), vec![CapabilityName::Data]);
    assert!(harness.performance.requests().is_empty());
    assert!(harness.chart.calls().is_empty());
    assert_eq!(ctx.state(), PipelineState::StoppedClarification);
}

#[tokio::test]
async fn specialist_error_halts_before_chart() {
    let harness = Harness::new(Scripted::success(daily_data())).with_performance(
        Scripted::new(CapabilityResult::Error {
            message: "performance specialist unavailable".to_owned(),
            details: Some("timeout".to_owned()),
        }),
    );

    let (report, ctx) = harness.run("performance last week with a chart").await;

    assert_eq!(
        report,
        FinalReport::Error {
            message: "performance specialist unavailable".to_owned()
        }
    );
    assert!(harness.chart.calls().is_empty());
    assert_eq!(
        names(&ctx),
        vec![CapabilityName::Data, CapabilityName::Performance]
    );
    assert_eq!(ctx.termination_reason(), TerminationReason::Error);
}

#[tokio::test]
async fn data_status_error_is_an_upstream_error() {
    let harness = Harness::new(Scripted::success(json!({
        "status": "ERROR",
        "data": null,
        "error": {"message": "table not found", "details": null}
    })));

    let (report, ctx) = harness.run("campaign performance").await;

    assert_eq!(
        report,
        FinalReport::Error {
            message: "table not found".to_owned()
        }
    );
    assert_eq!(names(&ctx), vec![CapabilityName::Data]);
}

#[tokio::test]
async fn chart_failure_is_terminal() {
    let harness = Harness::new(Scripted::success(json!({
        "status": "SUCCESS",
        "data": [{"campaign": "A", "note": "paused"}]
    })));

    let (report, ctx) = harness.run("campaign performance chart").await;

    match report {
        FinalReport::Error { message } => assert!(message.contains("no numeric columns")),
        other => panic!("expected error report, got {other:?}"),
    }
    assert_eq!(names(&ctx).last(), Some(&CapabilityName::Chart));
    assert!(ctx.artifacts().is_empty());
}

#[tokio::test]
async fn chart_is_skipped_without_tabular_data() {
    let harness = Harness::new(Scripted::success(json!({
        "status": "SUCCESS",
        "data": {"columns": ["date", "cost"], "rows": []}
    })));

    let (report, ctx) = harness.run("performance last week with a chart").await;

    assert!(harness.chart.calls().is_empty());
    assert!(!names(&ctx).contains(&CapabilityName::Chart));
    let sections = report.sections().expect("complete report");
    assert!(sections.graphs.is_empty());
}

#[tokio::test]
async fn ambiguous_brand_asks_before_any_call() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let controller = harness.controller("he");
    let request = "compare brand: Strauss and brand: Osem performance";

    let report = controller.run(request).await.expect("pipeline should not fault");

    assert_eq!(
        report,
        FinalReport::Clarification {
            question: "באיזה מותג מדובר: Strauss / Osem?".to_owned()
        }
    );
    assert!(harness.data.requests().is_empty());
}

#[tokio::test]
async fn explicit_brand_is_locked_into_every_envelope() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let (_, ctx) = harness.run("performance last week for brand Strauss").await;

    assert_eq!(ctx.brand_lock(), "Strauss");
    for request in harness
        .data
        .requests()
        .iter()
        .chain(harness.performance.requests().iter())
    {
        let envelope = RequestEnvelope::parse(request).expect("envelope");
        assert_eq!(envelope.brand_context.brand, "Strauss");
    }
}

#[tokio::test]
async fn research_only_request_skips_data() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let (report, ctx) = harness.run("what is the news about our competitors?").await;

    assert_eq!(names(&ctx), vec![CapabilityName::Research]);
    let sections = report.sections().expect("complete report");
    assert_eq!(sections.summary, vec!["Competitor launched a promo."]);
    assert_eq!(
        sections.insights,
        vec!["Launch (Globes, 2024-05-01): https://example.com/a"]
    );
}

#[tokio::test]
async fn payload_warnings_reach_the_report() {
    let mut perf = performance_payload();
    perf["warnings"] = json!(["Conversions lag by 48h."]);
    let harness =
        Harness::new(Scripted::success(daily_data())).with_performance(Scripted::success(perf));

    let (report, _) = harness.run("performance last week").await;

    let sections = report.sections().expect("complete report");
    assert_eq!(sections.warnings, vec!["Conversions lag by 48h."]);
    assert_eq!(sections.rendered_sections().last(), Some(&Section::Warnings));
    assert!(report.to_string().contains("Warnings\nConversions lag by 48h."));
}

#[tokio::test]
async fn hebrew_report_uses_hebrew_labels() {
    let harness = Harness::new(Scripted::success(daily_data()));
    let controller = harness.controller("he");

    let report = controller
        .run("ביצועים שבוע אחרון")
        .await
        .expect("pipeline should not fault");

    let text = report.to_string();
    assert!(text.starts_with("סיכום\n"));
    assert!(text.contains("גרפים\nאין מידע זמין."));
}

#[test]
fn charging_twice_exceeds_the_budget() {
    let registry = CapabilityRegistry::standard().expect("standard registry");
    let descriptor = registry.get("data").expect("data descriptor");
    let mut ctx = RequestContext::new("r1", "Tami4", "en");

    assert!(ctx.charge(descriptor).is_ok());
    let second = ctx.charge(descriptor);
    assert!(matches!(
        second,
        Err(campaigner::pipeline::PipelineError::BudgetExceeded { limit: 1, .. })
    ));
    assert_eq!(ctx.call_count(CapabilityName::Data), 1);
}
