//! The five named capabilities the pipeline dispatches to.
//!
//! Four of them (`data`, `performance`, `creative`, `research`) are
//! specialists behind the string-in/structured-out [`Specialist`] boundary.
//! The fifth, `chart`, takes the structured data payload directly through
//! [`ChartTool`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chart::ChartSpec;

pub mod chart;
pub mod contract;
pub mod fixture;
pub mod model;
pub mod registry;

pub use chart::{ChartCapability, ChartOutcome, ChartStatus};
pub use registry::{CapabilityDescriptor, CapabilityRegistry, RegistryError};

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Capability identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityName {
    /// Read-only tabular retrieval.
    Data,
    /// Paid-media performance analysis.
    Performance,
    /// Creative and messaging analysis.
    Creative,
    /// External web research.
    Research,
    /// Chart rendering.
    Chart,
}

impl CapabilityName {
    /// All capabilities in pipeline order.
    pub const ALL: [CapabilityName; 5] = [
        Self::Data,
        Self::Performance,
        Self::Creative,
        Self::Chart,
        Self::Research,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Performance => "performance",
            Self::Creative => "creative",
            Self::Research => "research",
            Self::Chart => "chart",
        }
    }

    /// Key under which a specialist wraps its success payload.
    pub fn payload_key(self) -> String {
        format!("{}_payload", self.as_str())
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityName {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownCapability(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one specialist call. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResult {
    /// The call produced a payload.
    Success {
        /// Structured payload.
        payload: Value,
    },
    /// The specialist needs the user to clarify before continuing.
    Clarification {
        /// Question to forward verbatim.
        question: String,
    },
    /// The call failed.
    Error {
        /// Human-readable message.
        message: String,
        /// Optional diagnostic detail.
        details: Option<String>,
    },
}

/// Variant tag of a [`CapabilityResult`], used in traces and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    /// [`CapabilityResult::Success`].
    Success,
    /// [`CapabilityResult::Clarification`].
    Clarification,
    /// [`CapabilityResult::Error`].
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Clarification => "clarification",
            Self::Error => "error",
        })
    }
}

impl CapabilityResult {
    /// Shorthand for an error without details.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }

    /// Variant tag.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::Clarification { .. } => OutcomeKind::Clarification,
            Self::Error { .. } => OutcomeKind::Error,
        }
    }

    /// Success payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload } => Some(payload),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

/// A specialist behind the single-string request boundary.
///
/// Implementations must not retry internally; a failure is reported as
/// [`CapabilityResult::Error`].
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Handle one request envelope (see [`contract::RequestEnvelope`]).
    async fn call(&self, request: &str) -> CapabilityResult;
}

/// The chart boundary: the full structured data payload plus chart specs.
pub trait ChartTool: Send + Sync {
    /// Render and store charts for a request.
    fn plot(&self, request_id: &str, data_payload: &Value, plots: &[ChartSpec]) -> ChartOutcome;
}

/// Handles to every capability the pipeline can invoke.
#[derive(Clone)]
pub struct Capabilities {
    /// Data retrieval.
    pub data: Arc<dyn Specialist>,
    /// Performance analysis.
    pub performance: Arc<dyn Specialist>,
    /// Creative analysis.
    pub creative: Arc<dyn Specialist>,
    /// Web research.
    pub research: Arc<dyn Specialist>,
    /// Chart rendering.
    pub chart: Arc<dyn ChartTool>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

impl Capabilities {
    /// Specialist handle by name. `None` for `chart`, which is not a
    /// [`Specialist`].
    pub fn specialist(&self, name: CapabilityName) -> Option<&Arc<dyn Specialist>> {
        match name {
            CapabilityName::Data => Some(&self.data),
            CapabilityName::Performance => Some(&self.performance),
            CapabilityName::Creative => Some(&self.creative),
            CapabilityName::Research => Some(&self.research),
            CapabilityName::Chart => None,
        }
    }
}
