//! Capability descriptors and the process-wide registry.
//!
//! The registry is assembled once at startup through [`RegistryBuilder`] and
//! is read-only afterwards; share it behind an `Arc`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::CapabilityName;

/// Default per-request call limit for every capability.
pub const DEFAULT_MAX_CALLS: u32 = 1;

/// Registry lookup and registration failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No capability with that name was registered.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
    /// The same name was registered twice.
    #[error("capability registered twice: {0}")]
    DuplicateCapability(String),
}

/// Static description of one capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    /// Capability name.
    pub name: CapabilityName,
    /// What the capability does.
    pub description: String,
    /// JSON Schema of the request.
    pub input_schema: Value,
    /// JSON Schema of a successful result.
    pub output_schema: Value,
    /// Maximum invocations within one request.
    pub max_calls_per_request: u32,
}

impl CapabilityDescriptor {
    /// Descriptor with the default call limit.
    pub fn new(
        name: CapabilityName,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            input_schema,
            output_schema,
            max_calls_per_request: DEFAULT_MAX_CALLS,
        }
    }
}

/// Collects descriptors before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<CapabilityDescriptor>,
}

impl RegistryBuilder {
    /// Add a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCapability`] if the name is taken.
    pub fn register(mut self, descriptor: CapabilityDescriptor) -> Result<Self, RegistryError> {
        if self.descriptors.iter().any(|d| d.name == descriptor.name) {
            return Err(RegistryError::DuplicateCapability(
                descriptor.name.to_string(),
            ));
        }
        debug!(capability = %descriptor.name, "capability registered");
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> CapabilityRegistry {
        let index = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str().to_owned(), i))
            .collect();
        CapabilityRegistry {
            descriptors: self.descriptors,
            index,
        }
    }
}

/// Read-only set of capability descriptors.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    /// Start a new registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with the five standard capabilities.
    ///
    /// # Errors
    ///
    /// Never fails in practice; propagates [`RegistryError`] from the builder.
    pub fn standard() -> Result<Self, RegistryError> {
        Ok(Self::builder()
            .register(data_descriptor())?
            .register(specialist_descriptor(
                CapabilityName::Performance,
                "Paid-media performance diagnosis, key metrics and prioritized recommendations.",
                performance_payload_schema(),
            ))?
            .register(specialist_descriptor(
                CapabilityName::Creative,
                "Creative and messaging analysis: winners, losers, fatigue and concept insights.",
                creative_payload_schema(),
            ))?
            .register(chart_descriptor())?
            .register(specialist_descriptor(
                CapabilityName::Research,
                "External web research: competitors, benchmarks, market news.",
                research_payload_schema(),
            ))?
            .build())
    }

    /// Look up a descriptor by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCapability`] if absent.
    pub fn get(&self, name: &str) -> Result<&CapabilityDescriptor, RegistryError> {
        self.index
            .get(name)
            .and_then(|&i| self.descriptors.get(i))
            .ok_or_else(|| RegistryError::UnknownCapability(name.to_owned()))
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Standard schemas
// ---------------------------------------------------------------------------

fn envelope_schema() -> Value {
    json!({
        "type": "object",
        "required": ["request"],
        "properties": {
            "request": {
                "type": "string",
                "description": "JSON text of {brand_context, user_request, data_payload?}"
            }
        }
    })
}

fn error_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "properties": {
            "message": {"type": "string"},
            "details": {"type": ["string", "null"]}
        }
    })
}

fn data_descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new(
        CapabilityName::Data,
        "Read-only retrieval of marketing data as a table.",
        envelope_schema(),
        json!({
            "type": "object",
            "required": ["status"],
            "properties": {
                "status": {"enum": ["SUCCESS", "ERROR"]},
                "sql": {"type": ["string", "null"]},
                "assumptions": {"type": "array", "items": {"type": "string"}},
                "data": {
                    "type": "object",
                    "properties": {
                        "columns": {"type": "array", "items": {"type": "string"}},
                        "rows": {"type": "array"}
                    }
                },
                "notes": {"type": "array", "items": {"type": "string"}},
                "error": error_schema()
            }
        }),
    )
}

fn specialist_descriptor(
    name: CapabilityName,
    description: &str,
    payload_schema: Value,
) -> CapabilityDescriptor {
    let mut properties = serde_json::Map::new();
    properties.insert(name.payload_key(), payload_schema);
    properties.insert(
        "clarification_question_he".to_owned(),
        json!({"type": ["string", "null"]}),
    );
    properties.insert("error".to_owned(), error_schema());
    CapabilityDescriptor::new(
        name,
        description,
        envelope_schema(),
        json!({"type": "object", "properties": properties}),
    )
}

fn performance_payload_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "diagnosis_he": {"type": "string"},
            "key_metrics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "value": {},
                        "wow_change": {}
                    }
                }
            },
            "segments_he": {"type": "array", "items": {"type": "string"}},
            "recommendations_he": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "priority": {"type": "string"},
                        "action": {"type": "string"},
                        "why": {"type": "string"},
                        "expected_impact": {"type": "string"},
                        "risk_or_tradeoff": {"type": "string"}
                    }
                }
            },
            "plotting_handoff": {
                "type": "object",
                "properties": {
                    "preferred_time_column": {"type": ["string", "null"]},
                    "preferred_metrics": {"type": "array", "items": {"type": "string"}},
                    "notes": {"type": "string"}
                }
            },
            "assumptions": {"type": "array", "items": {"type": "string"}},
            "limitations": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn creative_payload_schema() -> Value {
    let list = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "properties": {
            "summary_he": {"type": "string"},
            "winners_he": list,
            "losers_he": list,
            "fatigue_he": list,
            "concept_insights_he": list,
            "recommendations_he": {"type": "array"}
        }
    })
}

fn research_payload_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary_he": {"type": "string"},
            "key_points_he": {"type": "array", "items": {"type": "string"}},
            "sources": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "publisher": {"type": "string"},
                        "date": {"type": "string"},
                        "url": {"type": "string"}
                    }
                }
            },
            "notes": {"type": "string"}
        }
    })
}

fn chart_descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::new(
        CapabilityName::Chart,
        "Render line and bar charts from a tabular data payload.",
        json!({
            "type": "object",
            "required": ["data_payload", "plots"],
            "properties": {
                "data_payload": {"type": "object"},
                "plots": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "preferred_time_column": {"type": ["string", "null"]},
                            "preferred_metrics": {"type": "array", "items": {"type": "string"}},
                            "chart_kind_hint": {"enum": ["line", "bar", null]}
                        }
                    }
                }
            }
        }),
        json!({
            "type": "object",
            "required": ["status", "artifacts"],
            "properties": {
                "status": {"enum": ["SUCCESS", "ERROR"]},
                "artifacts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "filename": {"type": "string"},
                            "title": {"type": "string"},
                            "mime_type": {"type": "string"},
                            "version": {"type": "integer"}
                        }
                    }
                },
                "warnings": {"type": "array", "items": {"type": "string"}},
                "error": error_schema()
            }
        }),
    )
}
