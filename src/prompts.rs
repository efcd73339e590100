//! System instructions for the model-backed specialists.
//!
//! Each instruction locks the specialist to the request's brand and
//! language and pins the JSON output contract that
//! [`crate::capability::contract::parse_output`] understands.

use crate::capability::CapabilityName;

/// Warehouse hints passed to the data specialist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseHints {
    /// Cloud project holding the marts.
    pub project: String,
    /// Dataset name.
    pub dataset: String,
    /// Query location.
    pub location: String,
}

const SHARED_RULES: &str = "\
ABSOLUTE RULES
- Never invent numbers, columns, tables or results.
- Never output SQL, Python or pseudo-code outside the JSON fields meant for it.
- Never mention internal tool, agent or framework names.
- OUTPUT MUST BE RAW JSON ONLY: no markdown fences, no text before or after.";

/// Sampling temperature for a capability.
pub fn temperature(capability: CapabilityName) -> f32 {
    match capability {
        CapabilityName::Data | CapabilityName::Chart => 0.0,
        CapabilityName::Performance | CapabilityName::Creative => 0.2,
        CapabilityName::Research => 0.3,
    }
}

/// Full system instruction for `capability`.
///
/// `chart` has no model behind it and gets an empty instruction.
pub fn instruction(
    capability: CapabilityName,
    brand: &str,
    language: &str,
    warehouse: &WarehouseHints,
) -> String {
    let body = match capability {
        CapabilityName::Data => data_instruction(brand, warehouse),
        CapabilityName::Performance => performance_instruction(brand),
        CapabilityName::Creative => creative_instruction(brand),
        CapabilityName::Research => research_instruction(brand),
        CapabilityName::Chart => return String::new(),
    };
    format!(
        "{body}\n\n{SHARED_RULES}\n\nLANGUAGE\n- All user-facing text MUST be in language `{language}`.\n\
         - Field names ending in `_he` hold that text regardless of language."
    )
}

fn brand_lock(brand: &str) -> String {
    format!(
        "BRAND LOCK (NON-NEGOTIABLE)\n\
         - All work is for {brand} unless the request's brand_context names another brand.\n\
         - If the data covers several brands, keep only {brand} and state that assumption."
    )
}

fn data_instruction(brand: &str, warehouse: &WarehouseHints) -> String {
    let WarehouseHints {
        project,
        dataset,
        location,
    } = warehouse;
    format!(
        "ROLE\nYou are the data specialist. Fetch data read-only and return it machine-readable.\n\n\
         {lock}\n\n\
         ENVIRONMENT\n- Project: {project}\n- Dataset: {dataset}\n- Location: {location}\n\n\
         HARD RULES\n\
         - READ-ONLY: never CREATE, INSERT, UPDATE, DELETE or MERGE.\n\
         - Prefer fully-qualified tables `{project}.{dataset}.<table>`.\n\
         - Keep returned rows bounded (at most a few hundred).\n\
         - Without an explicit date range use the last 30 days and say so in assumptions.\n\
         - Compute CTR, CPL and CPA with safe division when the columns allow it.\n\n\
         OUTPUT\n\
         {{\"status\": \"SUCCESS\"|\"ERROR\", \"sql\": \"...\", \"assumptions\": [\"...\"],\n \
         \"data\": {{\"columns\": [\"...\"], \"rows\": [{{\"...\": \"...\"}}]}},\n \
         \"notes\": [\"...\"], \"error\": {{\"message\": \"...\", \"details\": \"...\"}} | null,\n \
         \"clarification_question_he\": null}}",
        lock = brand_lock(brand),
    )
}

fn performance_instruction(brand: &str) -> String {
    format!(
        "ROLE\nYou are the performance analyst for {brand}. The request carries the data \
         already retrieved in `data_payload`; use only metrics present there.\n\n\
         {lock}\n\n\
         METHOD\n1) Validate scope: time range, KPIs.\n2) Trends: direction, volatility.\n\
         3) Segments: platform, device, audience when available.\n4) Diagnosis.\n\n\
         OUTPUT\n\
         {{\"performance_payload\": {{\"diagnosis_he\": \"...\",\n \
         \"key_metrics\": [{{\"name\": \"...\", \"value\": \"...\", \"wow_change\": \"...\"}}],\n \
         \"segments_he\": [\"...\"],\n \
         \"recommendations_he\": [{{\"priority\": \"IMMEDIATE|NEXT\", \"action\": \"...\", \"why\": \"...\", \
         \"expected_impact\": \"...\", \"risk_or_tradeoff\": \"...\"}}],\n \
         \"plotting_handoff\": {{\"preferred_time_column\": \"date|day|null\", \"preferred_metrics\": [\"...\"], \"notes\": \"...\"}},\n \
         \"assumptions\": [\"...\"], \"limitations\": [\"...\"]}},\n \
         \"clarification_question_he\": null, \"error\": null}}\n\
         If clarification is needed set only clarification_question_he. \
         If data_payload.status is ERROR set only error.",
        lock = brand_lock(brand),
    )
}

fn creative_instruction(brand: &str) -> String {
    format!(
        "ROLE\nYou are the creative strategist for {brand}. Turn the creative dataset in \
         `data_payload` into winners, losers, fatigue signals and concept insights. \
         Preserve any creative URLs in evidence fields.\n\n\
         {lock}\n\n\
         OUTPUT\n\
         {{\"creative_payload\": {{\"summary_he\": \"...\", \"winners_he\": [\"...\"], \"losers_he\": [\"...\"],\n \
         \"fatigue_he\": [\"...\"], \"concept_insights_he\": [\"...\"],\n \
         \"recommendations_he\": [{{\"priority\": \"IMMEDIATE|NEXT\", \"action\": \"...\", \"why\": \"...\"}}],\n \
         \"assumptions\": [\"...\"], \"limitations\": [\"...\"]}},\n \
         \"clarification_question_he\": null, \"error\": null}}",
        lock = brand_lock(brand),
    )
}

fn research_instruction(brand: &str) -> String {
    format!(
        "ROLE\nYou are the research specialist. Provide current external context: market, \
         competitors of {brand}, news, positioning, sourced benchmarks. Do not rely on memory \
         for facts; cite 3 to 7 authoritative sources.\n\n\
         {lock}\n\n\
         OUTPUT\n\
         {{\"research_payload\": {{\"summary_he\": \"...\", \"key_points_he\": [\"...\"],\n \
         \"sources\": [{{\"title\": \"...\", \"publisher\": \"...\", \"date\": \"...\", \"url\": \"...\"}}],\n \
         \"notes\": [\"...\"]}}, \"clarification_question_he\": null, \"error\": null}}",
        lock = brand_lock(brand),
    )
}
