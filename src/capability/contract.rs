//! Specialist request envelope and output parsing.
//!
//! Every specialist receives one string: the JSON text of a
//! [`RequestEnvelope`]. Specialists answer with JSON (possibly wrapped in
//! reasoning tags or a markdown fence) which [`parse_output`] maps onto a
//! [`CapabilityResult`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CapabilityName, CapabilityResult};

/// Message used when a specialist's output cannot be interpreted.
pub const MALFORMED_OUTPUT: &str = "malformed output";

/// Longest slice of raw output quoted in error details.
const MAX_DETAIL_CHARS: usize = 200;

/// Brand scope and response language for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandContext {
    /// Brand every capability is locked to.
    pub brand: String,
    /// Language for user-facing text (e.g. `he`).
    pub language: String,
}

/// The single string-shaped request a specialist receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Brand/language policy.
    pub brand_context: BrandContext,
    /// The user's original request.
    pub user_request: String,
    /// Data capability output, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_payload: Option<Value>,
}

impl RequestEnvelope {
    /// Envelope without a data payload.
    pub fn new(brand_context: BrandContext, user_request: impl Into<String>) -> Self {
        Self {
            brand_context,
            user_request: user_request.into(),
            data_payload: None,
        }
    }

    /// Attach the data capability's payload.
    #[must_use]
    pub fn with_data(mut self, data_payload: Value) -> Self {
        self.data_payload = Some(data_payload);
        self
    }

    /// Serialize to the request string.
    pub fn to_request_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Parse a request string back into an envelope.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is not a valid envelope.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Map a specialist's raw text output to a [`CapabilityResult`].
///
/// Order of precedence: clarification, error, payload. The data capability's
/// whole object is its payload and its `status` decides: `SUCCESS` wins over
/// any `error` object, `ERROR` is an error. An `error` without a message
/// counts as absent.
pub fn parse_output(capability: CapabilityName, raw: &str) -> CapabilityResult {
    let Some(Value::Object(object)) = extract_json(raw) else {
        return CapabilityResult::Error {
            message: MALFORMED_OUTPUT.to_owned(),
            details: Some(truncate(raw.trim(), MAX_DETAIL_CHARS).to_owned()),
        };
    };
    interpret(capability, object)
}

/// Map an already-decoded JSON object to a [`CapabilityResult`].
pub fn interpret(capability: CapabilityName, object: Map<String, Value>) -> CapabilityResult {
    for key in ["clarification_question_he", "clarification_question"] {
        if let Some(question) = object.get(key).and_then(non_empty_str) {
            return CapabilityResult::Clarification {
                question: question.to_owned(),
            };
        }
    }

    if capability == CapabilityName::Data {
        return interpret_data(object);
    }

    if let Some(error) = reported_error(&object) {
        return error_result(error);
    }

    match object.get(&capability.payload_key()) {
        Some(payload @ Value::Object(_)) => CapabilityResult::Success {
            payload: payload.clone(),
        },
        _ => CapabilityResult::Error {
            message: MALFORMED_OUTPUT.to_owned(),
            details: Some(format!("missing {}", capability.payload_key())),
        },
    }
}

fn interpret_data(object: Map<String, Value>) -> CapabilityResult {
    match object.get("status").and_then(Value::as_str) {
        Some(status) if status.eq_ignore_ascii_case("SUCCESS") => {}
        Some(status) if status.eq_ignore_ascii_case("ERROR") => {
            return reported_error(&object).map_or_else(
                || CapabilityResult::error("data retrieval failed"),
                error_result,
            );
        }
        _ => {
            if let Some(error) = reported_error(&object) {
                return error_result(error);
            }
        }
    }
    CapabilityResult::Success {
        payload: Value::Object(object),
    }
}

/// The `error` value, unless it is null, empty or carries no message.
fn reported_error(object: &Map<String, Value>) -> Option<&Value> {
    let error = object.get("error")?;
    let present = match error {
        Value::Null | Value::Bool(false) => false,
        Value::String(message) => !message.trim().is_empty(),
        Value::Object(map) => map.get("message").and_then(non_empty_str).is_some(),
        _ => true,
    };
    present.then_some(error)
}

fn error_result(error: &Value) -> CapabilityResult {
    match error {
        Value::String(message) => CapabilityResult::error(message.clone()),
        Value::Object(map) => CapabilityResult::Error {
            message: map
                .get("message")
                .and_then(non_empty_str)
                .unwrap_or("capability reported an error")
                .to_owned(),
            details: map.get("details").and_then(|d| match d {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }),
        },
        other => CapabilityResult::error(other.to_string()),
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Find the JSON value in a model response.
///
/// Strips `<think>` blocks, then tries the whole text, then a fenced block,
/// then the outermost braces.
pub fn extract_json(raw: &str) -> Option<Value> {
    let cleaned = strip_reasoning_tags(raw);
    let trimmed = cleaned.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            return Some(value);
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    trimmed
        .get(start..=end)
        .and_then(|slice| serde_json::from_str(slice).ok())
}

/// Remove `<think>...</think>` blocks. An unclosed tag drops everything after it.
pub fn strip_reasoning_tags(response: &str) -> String {
    let mut result = response.to_owned();
    while let Some(start) = result.find("<think>") {
        let close = result
            .get(start..)
            .and_then(|rest| rest.find("</think>"))
            .and_then(|offset| start.checked_add(offset));
        match close {
            Some(end) => {
                let tag_end = end.saturating_add("</think>".len());
                result = format!(
                    "{}{}",
                    result.get(..start).unwrap_or_default(),
                    result.get(tag_end..).unwrap_or_default()
                );
            }
            None => {
                result = result.get(..start).unwrap_or_default().to_owned();
                break;
            }
        }
    }
    result
}

/// Content of the first markdown code fence (```` ```json ```` or plain).
fn extract_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = text.get(open.checked_add(3)?..)?;
    let after = after.strip_prefix("json").unwrap_or(after);
    let after = after.strip_prefix('\n').unwrap_or(after);
    let close = after.find("```")?;
    after.get(..close).map(str::trim)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s.get(..idx).unwrap_or(s),
        None => s,
    }
}
