//! Specialists backed by a language model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::contract::{self, BrandContext, RequestEnvelope};
use super::{CapabilityName, CapabilityResult, Specialist};
use crate::prompts::{self, WarehouseHints};
use crate::providers::{CompletionRequest, LlmProvider, Message};

/// A specialist that forwards the request envelope to a model and parses
/// its JSON answer.
pub struct ModelSpecialist {
    name: CapabilityName,
    provider: Arc<dyn LlmProvider>,
    fallback: BrandContext,
    warehouse: WarehouseHints,
    max_tokens: u32,
}

impl std::fmt::Debug for ModelSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSpecialist")
            .field("name", &self.name)
            .field("model", &self.provider.model_id())
            .finish_non_exhaustive()
    }
}

impl ModelSpecialist {
    /// Create a specialist for `name`.
    ///
    /// `fallback` is used for the instruction when a request string is not
    /// a valid envelope.
    pub fn new(
        name: CapabilityName,
        provider: Arc<dyn LlmProvider>,
        fallback: BrandContext,
        warehouse: WarehouseHints,
        max_tokens: u32,
    ) -> Self {
        Self {
            name,
            provider,
            fallback,
            warehouse,
            max_tokens,
        }
    }

    /// Completion request sent for `request`.
    pub fn completion_request(&self, request: &str) -> CompletionRequest {
        let brand_context = match RequestEnvelope::parse(request) {
            Ok(envelope) => envelope.brand_context,
            Err(_) => self.fallback.clone(),
        };
        CompletionRequest {
            messages: vec![Message::user(request)],
            system: Some(prompts::instruction(
                self.name,
                &brand_context.brand,
                &brand_context.language,
                &self.warehouse,
            )),
            max_tokens: Some(self.max_tokens),
            temperature: Some(prompts::temperature(self.name)),
        }
    }
}

#[async_trait]
impl Specialist for ModelSpecialist {
    async fn call(&self, request: &str) -> CapabilityResult {
        let completion = self.completion_request(request);
        match self.provider.complete(completion).await {
            Ok(response) => {
                debug!(
                    capability = %self.name,
                    model = %response.model,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "specialist completion received"
                );
                contract::parse_output(self.name, &response.text)
            }
            Err(e) => {
                warn!(capability = %self.name, error = %e, "specialist call failed");
                CapabilityResult::Error {
                    message: format!("{} specialist unavailable", self.name),
                    details: Some(e.to_string()),
                }
            }
        }
    }
}
