//! Call-budgeted pipeline controller.
//!
//! Runs one request through a strict, forward-only sequence:
//! - Brand: resolve the brand lock; an ambiguous brand halts with a question
//! - Data: fetch the table once, when the request needs data
//! - Analysis: performance and/or creative, once each, with the data payload
//! - Charts: one chart call carrying every requested spec
//! - Research: once, for external-context requests
//! - Assembly: the six-section report
//!
//! A clarification or error from any capability halts the request; nothing
//! is retried and no other capability is invoked afterwards.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capability::contract::{self, RequestEnvelope};
use crate::capability::{
    Capabilities, CapabilityName, CapabilityRegistry, CapabilityResult, RegistryError,
};
use crate::chart::ChartSpec;
use crate::report::{self, FinalReport};
use crate::tabular;

pub mod context;
pub mod intent;

pub use context::{PipelineState, RequestContext, TerminationReason, TraceEntry};
pub use intent::{BrandScope, RequestPlan};

/// Internal pipeline failures. Never shown to the user as a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A capability was not registered.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
    /// A capability would be called more often than its descriptor allows.
    #[error("call budget exceeded for {capability}: limit {limit}")]
    BudgetExceeded {
        /// Capability over budget.
        capability: CapabilityName,
        /// Its per-request limit.
        limit: u32,
    },
    /// A state transition went backward or out of a terminal state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// The source state.
        from: PipelineState,
        /// The target state.
        to: PipelineState,
    },
}

impl From<RegistryError> for PipelineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownCapability(name) | RegistryError::DuplicateCapability(name) => {
                Self::UnknownCapability(name)
            }
        }
    }
}

/// Brand lock and language applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandPolicy {
    /// Brand used when the request names none.
    pub default_brand: String,
    /// Other names of the default brand.
    pub aliases: Vec<String>,
    /// Response language code.
    pub language: String,
}

impl BrandPolicy {
    /// Whether `name` refers to the default brand.
    pub fn is_default(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        std::iter::once(&self.default_brand)
            .chain(&self.aliases)
            .any(|b| b.trim().to_lowercase() == name)
    }
}

/// The pipeline controller. Cheap to share; holds no per-request state.
#[derive(Debug, Clone)]
pub struct Controller {
    registry: Arc<CapabilityRegistry>,
    capabilities: Capabilities,
    policy: BrandPolicy,
}

impl Controller {
    /// Create a controller.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        capabilities: Capabilities,
        policy: BrandPolicy,
    ) -> Self {
        Self {
            registry,
            capabilities,
            policy,
        }
    }

    /// Brand policy in force.
    pub fn policy(&self) -> &BrandPolicy {
        &self.policy
    }

    /// Classify a request without running it.
    pub fn plan(&self, user_request: &str) -> RequestPlan {
        intent::plan(user_request, &self.policy)
    }

    /// Classify and run a request.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for internal faults; upstream failures
    /// are a [`FinalReport::Error`].
    pub async fn run(&self, user_request: &str) -> Result<FinalReport, PipelineError> {
        let plan = self.plan(user_request);
        self.run_plan(user_request, plan).await
    }

    /// Run a request with a pre-built plan.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for internal faults.
    pub async fn run_plan(
        &self,
        user_request: &str,
        plan: RequestPlan,
    ) -> Result<FinalReport, PipelineError> {
        let (report, _) = self.execute(user_request, plan).await?;
        Ok(report)
    }

    /// Run a request and return the report with the finished context.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for internal faults.
    pub async fn execute(
        &self,
        user_request: &str,
        plan: RequestPlan,
    ) -> Result<(FinalReport, RequestContext), PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let language = self.policy.language.clone();

        let brand = match &plan.brand {
            BrandScope::Default => self.policy.default_brand.clone(),
            BrandScope::Explicit(name) => name.clone(),
            BrandScope::Ambiguous(names) => {
                let mut ctx =
                    RequestContext::new(request_id, self.policy.default_brand.clone(), language);
                warn!(request_id = %ctx.request_id(), brands = ?names, "ambiguous brand, asking");
                ctx.stop_clarification(intent::brand_question(names, ctx.language()))?;
                return Ok((report::assemble(&ctx), ctx));
            }
        };

        let mut ctx = RequestContext::new(request_id, brand, language);
        info!(
            request_id = %ctx.request_id(),
            brand = %ctx.brand_lock(),
            needs_data = plan.needs_data,
            specialists = ?plan.specialists,
            charts = plan.charts.len(),
            needs_research = plan.needs_research,
            "pipeline started"
        );

        self.drive(&mut ctx, user_request, &plan).await?;
        if !ctx.is_terminated() {
            ctx.transition(PipelineState::Assembled)?;
        }

        debug!(request_id = %ctx.request_id(), trace = ?ctx.trace(), state = %ctx.state(), "pipeline finished");
        Ok((report::assemble(&ctx), ctx))
    }

    /// Invoke capabilities in order until done or halted.
    async fn drive(
        &self,
        ctx: &mut RequestContext,
        user_request: &str,
        plan: &RequestPlan,
    ) -> Result<(), PipelineError> {
        let envelope = RequestEnvelope::new(ctx.brand_context(), user_request);

        // Data.
        let mut data_payload: Option<Value> = None;
        if plan.needs_data {
            let request = envelope.to_request_string();
            match self.call_specialist(ctx, CapabilityName::Data, &request).await? {
                Some(payload) => data_payload = Some(payload),
                None => return Ok(()),
            }
            ctx.transition(PipelineState::DataFetched)?;
        }

        // Analysis.
        let analysis_request = match &data_payload {
            Some(payload) => envelope.clone().with_data(payload.clone()),
            None => envelope.clone(),
        }
        .to_request_string();
        let mut analysed = false;
        for &name in &plan.specialists {
            if !matches!(name, CapabilityName::Performance | CapabilityName::Creative) {
                debug!(capability = %name, "not an analysis specialist, skipping");
                continue;
            }
            if self
                .call_specialist(ctx, name, &analysis_request)
                .await?
                .is_none()
            {
                return Ok(());
            }
            analysed = true;
        }
        if analysed {
            ctx.transition(PipelineState::SpecialistDone)?;
        }

        // Charts.
        if !plan.charts.is_empty() {
            match &data_payload {
                Some(data) if !tabular::normalize(data).is_empty() => {
                    let specs = complete_specs(&plan.charts, ctx.payload(CapabilityName::Performance));
                    if !self.call_chart(ctx, data, &specs)? {
                        return Ok(());
                    }
                    ctx.transition(PipelineState::ChartDone)?;
                }
                _ => {
                    info!(request_id = %ctx.request_id(), "no tabular data, chart skipped");
                }
            }
        }

        // Research.
        if plan.needs_research {
            let request = envelope.to_request_string();
            if self
                .call_specialist(ctx, CapabilityName::Research, &request)
                .await?
                .is_none()
            {
                return Ok(());
            }
            ctx.transition(PipelineState::ResearchDone)?;
        }

        Ok(())
    }

    /// Charge, call and record one specialist.
    ///
    /// Returns the success payload, or `None` after halting the request.
    async fn call_specialist(
        &self,
        ctx: &mut RequestContext,
        name: CapabilityName,
        request: &str,
    ) -> Result<Option<Value>, PipelineError> {
        let descriptor = self.registry.get(name.as_str())?;
        let specialist = self
            .capabilities
            .specialist(name)
            .ok_or_else(|| PipelineError::UnknownCapability(name.to_string()))?;

        ctx.charge(descriptor)?;
        let result = upstream_view(name, specialist.call(request).await);
        info!(request_id = %ctx.request_id(), capability = %name, outcome = %result.kind(), "capability invoked");
        ctx.record(name, result.clone());

        match result {
            CapabilityResult::Success { payload } => {
                ctx.add_warnings(payload_warnings(&payload));
                Ok(Some(payload))
            }
            CapabilityResult::Clarification { question } => {
                warn!(request_id = %ctx.request_id(), capability = %name, "halting on clarification");
                ctx.stop_clarification(question)?;
                Ok(None)
            }
            CapabilityResult::Error { message, details } => {
                warn!(
                    request_id = %ctx.request_id(),
                    capability = %name,
                    error = %message,
                    details = details.as_deref().unwrap_or(""),
                    "halting on upstream error"
                );
                ctx.stop_error(message)?;
                Ok(None)
            }
        }
    }

    /// Charge, call and record the chart capability. `false` after halting.
    fn call_chart(
        &self,
        ctx: &mut RequestContext,
        data: &Value,
        specs: &[ChartSpec],
    ) -> Result<bool, PipelineError> {
        let descriptor = self.registry.get(CapabilityName::Chart.as_str())?;
        ctx.charge(descriptor)?;

        let outcome = self.capabilities.chart.plot(ctx.request_id(), data, specs);
        let result = if outcome.is_success() {
            CapabilityResult::Success {
                payload: serde_json::to_value(&outcome).unwrap_or(Value::Null),
            }
        } else {
            let failure = outcome.error.clone();
            CapabilityResult::Error {
                message: failure
                    .as_ref()
                    .map_or_else(|| "chart rendering failed".to_owned(), |f| f.message.clone()),
                details: failure.and_then(|f| f.details),
            }
        };
        info!(
            request_id = %ctx.request_id(),
            capability = %CapabilityName::Chart,
            outcome = %result.kind(),
            specs = specs.len(),
            "capability invoked"
        );
        ctx.record(CapabilityName::Chart, result.clone());
        ctx.add_warnings(outcome.warnings);

        match result {
            CapabilityResult::Error { message, .. } => {
                warn!(request_id = %ctx.request_id(), error = %message, "halting on chart error");
                ctx.stop_error(message)?;
                Ok(false)
            }
            _ => {
                ctx.add_artifacts(outcome.artifacts);
                Ok(true)
            }
        }
    }
}

/// Apply data-status semantics to a raw specialist result.
///
/// Specialists that hand back an already-decoded object still go through
/// [`contract::interpret`], so `status` decides for the data capability.
fn upstream_view(name: CapabilityName, result: CapabilityResult) -> CapabilityResult {
    match (result, name) {
        (CapabilityResult::Success { payload: Value::Object(object) }, CapabilityName::Data) => {
            contract::interpret(CapabilityName::Data, object)
        }
        (result, _) => result,
    }
}

/// Top-level `warnings` strings of a success payload.
fn payload_warnings(payload: &Value) -> Vec<String> {
    payload
        .get("warnings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Fill empty spec fields from the performance `plotting_handoff`.
///
/// The number of specs never changes.
pub fn complete_specs(specs: &[ChartSpec], performance: Option<&Value>) -> Vec<ChartSpec> {
    let Some(handoff) = performance.and_then(|p| p.get("plotting_handoff")) else {
        return specs.to_vec();
    };
    let time_column = handoff
        .get("preferred_time_column")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "null")
        .map(str::to_owned);
    let metrics: Vec<String> = handoff
        .get("preferred_metrics")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    specs
        .iter()
        .map(|spec| {
            let mut spec = spec.clone();
            if spec.preferred_time_column.is_none() {
                spec.preferred_time_column.clone_from(&time_column);
            }
            if spec.preferred_metrics.is_empty() {
                spec.preferred_metrics.clone_from(&metrics);
            }
            spec
        })
        .collect()
}
