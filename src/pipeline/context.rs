//! Per-request state owned by the controller.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::PipelineError;
use crate::artifacts::ArtifactDescriptor;
use crate::capability::contract::BrandContext;
use crate::capability::{CapabilityDescriptor, CapabilityName, CapabilityResult, OutcomeKind};

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Nothing invoked yet.
    Pending,
    /// Data retrieved.
    DataFetched,
    /// Analysis specialist(s) done.
    SpecialistDone,
    /// Charts rendered.
    ChartDone,
    /// Research done.
    ResearchDone,
    /// Report assembled.
    Assembled,
    /// Halted on a clarification question.
    StoppedClarification,
    /// Halted on an upstream error.
    StoppedError,
}

impl PipelineState {
    /// Display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DataFetched => "DATA_FETCHED",
            Self::SpecialistDone => "SPECIALIST_DONE",
            Self::ChartDone => "CHART_DONE",
            Self::ResearchDone => "RESEARCH_DONE",
            Self::Assembled => "ASSEMBLED",
            Self::StoppedClarification => "STOPPED_CLARIFICATION",
            Self::StoppedError => "STOPPED_ERROR",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Assembled | Self::StoppedClarification | Self::StoppedError
        )
    }

    /// Forward position along the happy path.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::DataFetched => 1,
            Self::SpecialistDone => 2,
            Self::ChartDone => 3,
            Self::ResearchDone => 4,
            Self::Assembled | Self::StoppedClarification | Self::StoppedError => 5,
        }
    }

    /// Check if transitioning to `target` is valid.
    ///
    /// Forward only; any non-terminal state may stop.
    pub fn can_transition_to(self, target: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match target {
            Self::StoppedClarification | Self::StoppedError => true,
            _ => target.rank() > self.rank(),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    /// Still running.
    None,
    /// Halted on a clarification question.
    Clarification,
    /// Halted on an upstream error.
    Error,
    /// Report assembled.
    Complete,
}

/// One capability invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Capability invoked.
    pub capability: CapabilityName,
    /// Outcome of the call.
    pub outcome: OutcomeKind,
}

/// Per-request mutable state, exclusive to one controller run.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    brand_lock: String,
    language: String,
    call_counts: HashMap<CapabilityName, u32>,
    results: HashMap<CapabilityName, CapabilityResult>,
    artifacts: Vec<ArtifactDescriptor>,
    warnings: Vec<String>,
    state: PipelineState,
    termination_reason: TerminationReason,
    halt_message: Option<String>,
    trace: Vec<TraceEntry>,
}

impl RequestContext {
    /// Fresh context in [`PipelineState::Pending`].
    pub fn new(
        request_id: impl Into<String>,
        brand_lock: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            brand_lock: brand_lock.into(),
            language: language.into(),
            call_counts: HashMap::new(),
            results: HashMap::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
            state: PipelineState::Pending,
            termination_reason: TerminationReason::None,
            halt_message: None,
            trace: Vec::new(),
        }
    }

    /// Request identifier.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Brand every capability is scoped to.
    pub fn brand_lock(&self) -> &str {
        &self.brand_lock
    }

    /// Response language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Brand context passed to specialists.
    pub fn brand_context(&self) -> BrandContext {
        BrandContext {
            brand: self.brand_lock.clone(),
            language: self.language.clone(),
        }
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Why the request ended, if it has.
    pub fn termination_reason(&self) -> TerminationReason {
        self.termination_reason
    }

    /// Whether the request has stopped or completed.
    pub fn is_terminated(&self) -> bool {
        self.termination_reason != TerminationReason::None
    }

    /// Clarification question or error message of a halted request.
    pub fn halt_message(&self) -> Option<&str> {
        self.halt_message.as_deref()
    }

    /// Times `capability` has been charged.
    pub fn call_count(&self, capability: CapabilityName) -> u32 {
        self.call_counts.get(&capability).copied().unwrap_or(0)
    }

    /// Result recorded for `capability`.
    pub fn result(&self, capability: CapabilityName) -> Option<&CapabilityResult> {
        self.results.get(&capability)
    }

    /// Success payload recorded for `capability`.
    pub fn payload(&self, capability: CapabilityName) -> Option<&serde_json::Value> {
        self.result(capability).and_then(CapabilityResult::payload)
    }

    /// Stored chart artifacts, in renderer order.
    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    /// Non-fatal warnings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Invocations in call order.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Reserve one call to `descriptor`'s capability.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BudgetExceeded`] if the call would exceed the
    /// per-request limit, and [`PipelineError::InvalidTransition`] if the
    /// request has already terminated.
    pub fn charge(&mut self, descriptor: &CapabilityDescriptor) -> Result<(), PipelineError> {
        if self.state.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: self.state,
            });
        }
        let count = self.call_counts.entry(descriptor.name).or_insert(0);
        if *count >= descriptor.max_calls_per_request {
            return Err(PipelineError::BudgetExceeded {
                capability: descriptor.name,
                limit: descriptor.max_calls_per_request,
            });
        }
        *count = count.saturating_add(1);
        Ok(())
    }

    /// Record the outcome of a charged call.
    pub fn record(&mut self, capability: CapabilityName, result: CapabilityResult) {
        self.trace.push(TraceEntry {
            capability,
            outcome: result.kind(),
        });
        self.results.insert(capability, result);
    }

    /// Add stored artifacts.
    pub fn add_artifacts(&mut self, artifacts: impl IntoIterator<Item = ArtifactDescriptor>) {
        self.artifacts.extend(artifacts);
    }

    /// Add non-fatal warnings.
    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] for backward moves or
    /// moves out of a terminal state.
    pub fn transition(&mut self, target: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(target) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.termination_reason = match target {
            PipelineState::StoppedClarification => TerminationReason::Clarification,
            PipelineState::StoppedError => TerminationReason::Error,
            PipelineState::Assembled => TerminationReason::Complete,
            _ => TerminationReason::None,
        };
        Ok(())
    }

    /// Halt with a clarification question.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if already terminated.
    pub fn stop_clarification(&mut self, question: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(PipelineState::StoppedClarification)?;
        self.halt_message = Some(question.into());
        Ok(())
    }

    /// Halt with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if already terminated.
    pub fn stop_error(&mut self, message: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(PipelineState::StoppedError)?;
        self.halt_message = Some(message.into());
        Ok(())
    }
}
