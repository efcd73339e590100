//! The `chart` capability: normalize, render, store, describe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::ChartTool;
use crate::artifacts::{ArtifactDescriptor, ArtifactStore};
use crate::chart::{self, ChartOptions, ChartSpec};
use crate::tabular;

/// Whether the chart call produced artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChartStatus {
    /// Artifacts were rendered and stored.
    Success,
    /// Nothing usable was produced.
    Error,
}

/// Structured error carried by a failed [`ChartOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartFailure {
    /// Human-readable message.
    pub message: String,
    /// Optional diagnostic detail.
    #[serde(default)]
    pub details: Option<String>,
}

/// What the chart boundary returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOutcome {
    /// Success or error.
    pub status: ChartStatus,
    /// Stored artifacts in render order.
    pub artifacts: Vec<ArtifactDescriptor>,
    /// Non-fatal issues.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set when `status` is `ERROR`.
    #[serde(default)]
    pub error: Option<ChartFailure>,
}

impl ChartOutcome {
    /// Failed outcome.
    pub fn failure(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: ChartStatus::Error,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            error: Some(ChartFailure {
                message: message.into(),
                details,
            }),
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ChartStatus::Success
    }
}

/// Chart capability backed by the SVG renderer and an artifact store.
pub struct ChartCapability {
    store: Arc<dyn ArtifactStore>,
    options: ChartOptions,
}

impl std::fmt::Debug for ChartCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartCapability")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChartCapability {
    /// Create a chart capability writing to `store`.
    pub fn new(store: Arc<dyn ArtifactStore>, options: ChartOptions) -> Self {
        Self { store, options }
    }
}

impl ChartTool for ChartCapability {
    fn plot(&self, request_id: &str, data_payload: &Value, plots: &[ChartSpec]) -> ChartOutcome {
        let table = tabular::normalize(data_payload);
        let spec = ChartSpec::consolidate(plots);

        let rendered = match chart::render(&table, &spec, &self.options) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(request_id, error = %e, "chart rendering failed");
                return ChartOutcome::failure(e.to_string(), None);
            }
        };

        let mut artifacts = Vec::with_capacity(rendered.artifacts.len());
        for artifact in &rendered.artifacts {
            match self.store.save(request_id, artifact) {
                Ok(version) => artifacts.push(ArtifactDescriptor::new(artifact, version)),
                Err(e) => {
                    warn!(request_id, filename = %artifact.filename, error = %e, "artifact store failed");
                    return ChartOutcome::failure("failed to store chart artifact", Some(e.to_string()));
                }
            }
        }

        info!(
            request_id,
            artifacts = artifacts.len(),
            plots = plots.len(),
            "charts rendered"
        );
        ChartOutcome {
            status: ChartStatus::Success,
            artifacts,
            warnings: rendered.warnings,
            error: None,
        }
    }
}
