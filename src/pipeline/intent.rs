//! Request planner: a deterministic keyword classifier.
//!
//! Decides brand scope, whether data is needed, which specialist(s) run,
//! which charts were asked for and whether external research is warranted.
//! English and Hebrew keywords are recognised. Plain string and regex
//! matching keeps the outcome reproducible for a given request.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::BrandPolicy;
use crate::capability::CapabilityName;
use crate::chart::{ChartKind, ChartSpec};

/// Upper bound on charts derived from a single count ("5 charts").
const MAX_CHARTS_PER_MENTION: usize = 5;

/// Metric tokens recognised in chart requests, with the column name they map to.
const METRIC_TOKENS: [(&str, &str); 17] = [
    ("cost", "cost"),
    ("spend", "spend"),
    ("lead", "leads"),
    ("leads", "leads"),
    ("click", "clicks"),
    ("clicks", "clicks"),
    ("impressions", "impressions"),
    ("ctr", "ctr"),
    ("cpl", "cpl"),
    ("cpa", "cpa"),
    ("cpc", "cpc"),
    ("conversions", "conversions"),
    ("purchases", "purchases"),
    ("revenue", "revenue"),
    ("roas", "roas"),
    ("עלות", "cost"),
    ("לידים", "leads"),
];

/// Brand scope resolved from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BrandScope {
    /// No brand named: the configured default applies.
    Default,
    /// A single brand other than the default was named.
    Explicit(String),
    /// Several distinct brands were named.
    Ambiguous(Vec<String>),
}

/// What a request needs from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestPlan {
    /// Brand scope.
    pub brand: BrandScope,
    /// Whether the data capability runs.
    pub needs_data: bool,
    /// Analysis specialists, in call order (subset of performance/creative).
    pub specialists: Vec<CapabilityName>,
    /// Requested charts; empty means no chart call.
    pub charts: Vec<ChartSpec>,
    /// Whether the research capability runs.
    pub needs_research: bool,
}

impl RequestPlan {
    /// The common case: data, performance and nothing else.
    pub fn performance_only() -> Self {
        Self {
            brand: BrandScope::Default,
            needs_data: true,
            specialists: vec![CapabilityName::Performance],
            charts: Vec::new(),
            needs_research: false,
        }
    }
}

/// Classify a request.
pub fn plan(request: &str, policy: &BrandPolicy) -> RequestPlan {
    let lower = request.to_lowercase();

    let brand = resolve_brand(request, policy);
    let charts = extract_charts(request);
    let needs_research = wants_research(&lower, policy);
    let data_signal = has_data_signal(&lower) || !charts.is_empty();
    let needs_data = data_signal || !needs_research;

    let specialists = if needs_data {
        select_specialists(&lower)
    } else {
        Vec::new()
    };

    RequestPlan {
        brand,
        needs_data,
        specialists,
        charts,
        needs_research,
    }
}

/// Clarification question for an ambiguous brand scope, in `language`.
pub fn brand_question(names: &[String], language: &str) -> String {
    let list = names.join(" / ");
    if language == "he" {
        format!("באיזה מותג מדובר: {list}?")
    } else {
        format!("Which brand do you mean: {list}?")
    }
}

// ---------------------------------------------------------------------------
// Brand
// ---------------------------------------------------------------------------

static BRAND_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bbrand\s*[:=]\s*|\bfor\s+brand\s+|(?:^|\s)מותג\s*:?\s*)([^\s,.;:!?]+)").ok()
});

/// Find explicitly named brands and compare them to the default and aliases.
pub fn resolve_brand(request: &str, policy: &BrandPolicy) -> BrandScope {
    let mut named: Vec<String> = Vec::new();
    let Some(re) = BRAND_RE.as_ref() else {
        return BrandScope::Default;
    };
    for caps in re.captures_iter(request) {
        let Some(name) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if name.is_empty() || policy.is_default(name) {
            continue;
        }
        if !named.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            named.push(name.to_owned());
        }
    }
    match named.len() {
        0 => BrandScope::Default,
        1 => BrandScope::Explicit(named.remove(0)),
        _ => BrandScope::Ambiguous(named),
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

static CHART_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:charts?|graphs?|plots?|visuali[sz]\w*|visuals?)\b|גרפים|גרף|תרשימים|תרשים").ok()
});

/// One spec per chart mention; a leading count ("3 charts") repeats it.
pub fn extract_charts(request: &str) -> Vec<ChartSpec> {
    let Some(re) = CHART_RE.as_ref() else {
        return Vec::new();
    };
    let mentions: Vec<(usize, usize)> = re
        .find_iter(request)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut specs = Vec::new();
    let mut previous_end = 0;
    for (i, &(start, end)) in mentions.iter().enumerate() {
        let next_start = mentions
            .get(i.saturating_add(1))
            .map_or(request.len(), |&(s, _)| s);
        let before = request.get(previous_end..start).unwrap_or_default();
        let after = request.get(end..next_start).unwrap_or_default();

        let mut metrics = metrics_in(after);
        if metrics.is_empty() {
            metrics = metrics_in(before);
        }
        let lead_words: Vec<&str> = before.split_whitespace().rev().take(2).collect();
        let spec = ChartSpec {
            preferred_time_column: None,
            preferred_metrics: metrics,
            chart_kind_hint: kind_hint(&lead_words),
        };

        let count = chart_count(&lead_words).unwrap_or(1);
        specs.extend(std::iter::repeat(spec).take(count));
        previous_end = end;
    }
    specs
}

fn metrics_in(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_lowercase();
        if let Some((_, column)) = METRIC_TOKENS.iter().find(|(token, _)| *token == lower) {
            if !found.iter().any(|f| f == column) {
                found.push((*column).to_owned());
            }
        }
    }
    found
}

fn kind_hint(lead_words: &[&str]) -> Option<ChartKind> {
    for word in lead_words {
        match word.to_lowercase().as_str() {
            "bar" | "column" | "עמודות" => return Some(ChartKind::Bar),
            "line" | "trend" | "קו" => return Some(ChartKind::Line),
            _ => {}
        }
    }
    None
}

/// Count directly before the mention, or before its kind word ("2 bar charts").
fn chart_count(lead_words: &[&str]) -> Option<usize> {
    let candidate = match lead_words {
        [first, second, ..] if kind_hint(&[*first]).is_some() => second,
        [first, ..] => first,
        [] => return None,
    };
    count_word(candidate).filter(|n| (1..=MAX_CHARTS_PER_MENTION).contains(n))
}

fn count_word(word: &str) -> Option<usize> {
    if let Ok(n) = word.parse::<usize>() {
        return Some(n);
    }
    match word.to_lowercase().as_str() {
        "two" | "שני" | "שתי" => Some(2),
        "three" | "שלושה" | "שלוש" => Some(3),
        "four" | "ארבעה" | "ארבע" => Some(4),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

static RESEARCH_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:competitors?|competition|benchmarks?|news|positioning|industry|market\s+(?:trends?|context|share|landscape))\b|מתחר|בנצ'מרק|חדשות|מיצוב|תעשי|מגמות\s+שוק|נתח\s+שוק",
    )
    .ok()
});

static SUBJECT_QUERY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:what|who)\s+(?:is|are)\b|מה\s+זה|מי\s+זה").ok()
});

/// Whether the request asks for external context.
///
/// "What is" / "who is" counts only when the default brand or one of its
/// aliases follows it; otherwise it is an ordinary data question.
pub fn wants_research(lower: &str, policy: &BrandPolicy) -> bool {
    if RESEARCH_RE.as_ref().is_some_and(|re| re.is_match(lower)) {
        return true;
    }
    let Some(re) = SUBJECT_QUERY_RE.as_ref() else {
        return false;
    };
    re.find_iter(lower).any(|m| {
        let subject = lower.get(m.end()..).unwrap_or_default();
        names_brand(subject, policy)
    })
}

fn names_brand(text: &str, policy: &BrandPolicy) -> bool {
    std::iter::once(&policy.default_brand)
        .chain(&policy.aliases)
        .map(|name| name.trim().to_lowercase())
        .any(|name| !name.is_empty() && text.contains(&name))
}

fn has_data_signal(lower: &str) -> bool {
    const SIGNALS: [&str; 20] = [
        "performance",
        "campaign",
        "creative",
        "metric",
        "kpi",
        "last ",
        "week",
        "month",
        "days",
        "fatigue",
        "ביצועים",
        "קמפיין",
        "נתונים",
        "קריאייטיב",
        "מודעות",
        "שבוע",
        "חודש",
        "ימים",
        "לידים",
        "עלות",
    ];
    SIGNALS.iter().any(|s| lower.contains(s)) || !metrics_in(lower).is_empty()
}

fn select_specialists(lower: &str) -> Vec<CapabilityName> {
    let performance = lower.contains("performance") || lower.contains("ביצועים");
    let creative_explicit = lower.contains("creative") || lower.contains("קריאייטיב");
    if performance && creative_explicit {
        return vec![CapabilityName::Performance, CapabilityName::Creative];
    }

    const CREATIVE: [&str; 8] = [
        "creative", "ad copy", "fatigue", "concept", "banner", "קריאייטיב", "מודעות", "שחיקה",
    ];
    if !performance && CREATIVE.iter().any(|k| lower.contains(k)) {
        vec![CapabilityName::Creative]
    } else {
        vec![CapabilityName::Performance]
    }
}
