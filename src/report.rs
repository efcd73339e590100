//! Six-section report assembly.
//!
//! Sections, always in this order: Summary, Key Metrics, Graphs, Insights,
//! Next Steps, Warnings. Graphs lists artifact filenames one per line and is
//! the only place filenames appear. Warnings is rendered only when a
//! capability reported one. A halted request yields a single message.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::artifacts::ArtifactDescriptor;
use crate::capability::CapabilityName;
use crate::pipeline::{RequestContext, TerminationReason};

/// Report section, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Section {
    /// Factual overview.
    Summary,
    /// Numeric results.
    KeyMetrics,
    /// Artifact filenames.
    Graphs,
    /// Interpretation.
    Insights,
    /// Recommendations.
    NextSteps,
    /// Non-fatal warnings.
    Warnings,
}

impl Section {
    /// All sections in display order.
    pub const ORDER: [Section; 6] = [
        Self::Summary,
        Self::KeyMetrics,
        Self::Graphs,
        Self::Insights,
        Self::NextSteps,
        Self::Warnings,
    ];

    /// Localized label. Languages other than Hebrew get English.
    pub fn label(self, language: &str) -> &'static str {
        let hebrew = language == "he";
        match (self, hebrew) {
            (Self::Summary, true) => "סיכום",
            (Self::Summary, false) => "Summary",
            (Self::KeyMetrics, true) => "מדדים מרכזיים",
            (Self::KeyMetrics, false) => "Key Metrics",
            (Self::Graphs, true) => "גרפים",
            (Self::Graphs, false) => "Graphs",
            (Self::Insights, true) => "תובנות",
            (Self::Insights, false) => "Insights",
            (Self::NextSteps, true) => "צעדים הבאים",
            (Self::NextSteps, false) => "Next Steps",
            (Self::Warnings, true) => "אזהרות",
            (Self::Warnings, false) => "Warnings",
        }
    }
}

/// Line shown in an empty section.
pub fn placeholder(language: &str) -> &'static str {
    if language == "he" {
        "אין מידע זמין."
    } else {
        "No information available."
    }
}

/// Content of a completed report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSections {
    /// Language of labels and placeholders.
    pub language: String,
    /// Summary lines.
    pub summary: Vec<String>,
    /// Key metric lines.
    pub key_metrics: Vec<String>,
    /// Artifact filenames in renderer order.
    pub graphs: Vec<String>,
    /// Insight lines.
    pub insights: Vec<String>,
    /// Next-step lines.
    pub next_steps: Vec<String>,
    /// Warnings; empty means the section is omitted.
    pub warnings: Vec<String>,
}

impl ReportSections {
    /// Lines of one section.
    pub fn lines(&self, section: Section) -> &[String] {
        match section {
            Section::Summary => &self.summary,
            Section::KeyMetrics => &self.key_metrics,
            Section::Graphs => &self.graphs,
            Section::Insights => &self.insights,
            Section::NextSteps => &self.next_steps,
            Section::Warnings => &self.warnings,
        }
    }

    /// Sections that are rendered, in order.
    pub fn rendered_sections(&self) -> Vec<Section> {
        Section::ORDER
            .into_iter()
            .filter(|s| *s != Section::Warnings || !self.warnings.is_empty())
            .collect()
    }
}

/// Final response for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalReport {
    /// Six-section report.
    Complete(ReportSections),
    /// The request halted on a question.
    Clarification {
        /// Question, verbatim.
        question: String,
    },
    /// The request halted on an upstream error.
    Error {
        /// Error message, verbatim.
        message: String,
    },
}

impl FinalReport {
    /// Sections of a completed report.
    pub fn sections(&self) -> Option<&ReportSections> {
        match self {
            Self::Complete(sections) => Some(sections),
            _ => None,
        }
    }
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = match self {
            Self::Clarification { question } => return writeln!(f, "{question}"),
            Self::Error { message } => return writeln!(f, "{message}"),
            Self::Complete(sections) => sections,
        };
        for (i, section) in sections.rendered_sections().into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", section.label(&sections.language))?;
            let lines = sections.lines(section);
            if lines.is_empty() {
                writeln!(f, "{}", placeholder(&sections.language))?;
            }
            for line in lines {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

/// Build the final report from a finished request context.
pub fn assemble(ctx: &RequestContext) -> FinalReport {
    match ctx.termination_reason() {
        TerminationReason::Clarification => {
            return FinalReport::Clarification {
                question: ctx.halt_message().unwrap_or_default().to_owned(),
            }
        }
        TerminationReason::Error => {
            return FinalReport::Error {
                message: ctx.halt_message().unwrap_or_default().to_owned(),
            }
        }
        TerminationReason::None | TerminationReason::Complete => {}
    }

    let performance = ctx.payload(CapabilityName::Performance);
    let creative = ctx.payload(CapabilityName::Creative);
    let research = ctx.payload(CapabilityName::Research);
    let data = ctx.payload(CapabilityName::Data);

    let mut summary = Vec::new();
    summary.extend(field_lines(performance, "diagnosis"));
    summary.extend(field_lines(creative, "summary"));
    summary.extend(field_lines(research, "summary"));
    summary.extend(field_lines(data, "assumptions"));

    let key_metrics = performance
        .and_then(|p| localized(p, "key_metrics"))
        .and_then(Value::as_array)
        .map(|items| items.iter().map(metric_line).collect())
        .unwrap_or_default();

    let mut insights = Vec::new();
    insights.extend(field_lines(performance, "segments"));
    for key in ["winners", "losers", "fatigue", "concept_insights"] {
        insights.extend(field_lines(creative, key));
    }
    insights.extend(field_lines(research, "key_points"));
    insights.extend(
        research
            .and_then(|r| localized(r, "sources"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(source_line).collect::<Vec<_>>())
            .unwrap_or_default(),
    );

    let mut next_steps = Vec::new();
    for payload in [performance, creative] {
        next_steps.extend(
            payload
                .and_then(|p| localized(p, "recommendations"))
                .and_then(Value::as_array)
                .map(|items| items.iter().map(recommendation_line).collect::<Vec<_>>())
                .unwrap_or_default(),
        );
    }

    let artifacts = ctx.artifacts();
    let scrub = |lines: Vec<String>| -> Vec<String> {
        lines
            .into_iter()
            .map(|line| replace_filenames(&line, artifacts))
            .collect()
    };

    FinalReport::Complete(ReportSections {
        language: ctx.language().to_owned(),
        summary: scrub(summary),
        key_metrics: scrub(key_metrics),
        graphs: artifacts.iter().map(|a| a.filename.clone()).collect(),
        insights: scrub(insights),
        next_steps: scrub(next_steps),
        warnings: scrub(ctx.warnings().to_vec()),
    })
}

// ---------------------------------------------------------------------------
// Field rendering
// ---------------------------------------------------------------------------

/// Read `<key>_he`, falling back to `key`.
fn localized<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    payload
        .get(format!("{key}_he"))
        .filter(|v| !v.is_null())
        .or_else(|| payload.get(key).filter(|v| !v.is_null()))
}

fn field_lines(payload: Option<&Value>, key: &str) -> Vec<String> {
    payload
        .and_then(|p| localized(p, key))
        .map(value_lines)
        .unwrap_or_default()
}

fn value_lines(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(text) => text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(inline)
            .filter(|l| !l.is_empty())
            .collect(),
        other => vec![inline(other)],
    }
}

/// Render any value on one line.
fn inline(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_owned(),
        Value::Array(items) => items
            .iter()
            .map(inline)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => inline_object(map),
        other => other.to_string(),
    }
}

fn inline_object(map: &Map<String, Value>) -> String {
    map.iter()
        .filter_map(|(k, v)| {
            let text = inline(v);
            (!text.is_empty()).then(|| format!("{k}: {text}"))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// `name: value (change)`.
fn metric_line(item: &Value) -> String {
    let Some(map) = item.as_object() else {
        return inline(item);
    };
    let name = map.get("name").map(inline).unwrap_or_default();
    let value = map.get("value").map(inline).unwrap_or_default();
    let change = map
        .get("wow_change")
        .or_else(|| map.get("change"))
        .map(inline)
        .unwrap_or_default();
    match (name.is_empty(), change.is_empty()) {
        (true, _) => inline_object(map),
        (false, true) => format!("{name}: {value}"),
        (false, false) => format!("{name}: {value} ({change})"),
    }
}

/// `[priority] action: why`.
fn recommendation_line(item: &Value) -> String {
    let Some(map) = item.as_object() else {
        return inline(item);
    };
    let priority = map.get("priority").map(inline).unwrap_or_default();
    let action = map.get("action").map(inline).unwrap_or_default();
    let why = map.get("why").map(inline).unwrap_or_default();
    if action.is_empty() {
        return inline_object(map);
    }
    let mut line = if priority.is_empty() {
        action
    } else {
        format!("[{priority}] {action}")
    };
    if !why.is_empty() {
        line = format!("{line}: {why}");
    }
    line
}

/// `title (publisher, date): url`.
fn source_line(item: &Value) -> String {
    let Some(map) = item.as_object() else {
        return inline(item);
    };
    let title = map.get("title").map(inline).unwrap_or_default();
    let meta: Vec<String> = ["publisher", "date"]
        .iter()
        .filter_map(|k| map.get(*k).map(inline))
        .filter(|s| !s.is_empty())
        .collect();
    let url = map.get("url").map(inline).unwrap_or_default();

    let mut line = title;
    if !meta.is_empty() {
        line = format!("{line} ({})", meta.join(", "));
    }
    if !url.is_empty() {
        line = if line.is_empty() {
            url
        } else {
            format!("{line}: {url}")
        };
    }
    line
}

/// Replace artifact filenames with their titles.
fn replace_filenames(line: &str, artifacts: &[ArtifactDescriptor]) -> String {
    artifacts.iter().fold(line.to_owned(), |acc, artifact| {
        if artifact.filename.is_empty() {
            acc
        } else {
            acc.replace(&artifact.filename, &artifact.title)
        }
    })
}
