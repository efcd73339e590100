//! OpenAI-compatible provider using the `/chat/completions` API.
//!
//! Works against OpenAI itself and any gateway that speaks the same wire
//! format (Vertex AI's OpenAI endpoint, vLLM, LiteLLM).

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, ProviderError, Role,
    UsageStats,
};

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Body posted to `/chat/completions`. Borrows from the completion request.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatBody<'a> {
    /// Model identifier.
    pub model: &'a str,
    /// System instruction first, then the conversation.
    pub messages: Vec<ChatTurn<'a>>,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature; omitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One `{role, content}` entry.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatTurn<'a> {
    /// `system`, `user` or `assistant`.
    pub role: &'static str,
    /// Text content.
    pub content: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    choices: Vec<ReplyChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: ReplyUsage,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Default, Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider for `model` at `base_url` (without the
    /// `/chat/completions` suffix).
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint_url(base_url),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Join a base URL and the chat completions path.
#[doc(hidden)]
pub fn endpoint_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Lay out a completion request as a chat body.
#[doc(hidden)]
pub fn build_request<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatBody<'a> {
    let system = request.system.as_deref().map(|content| ChatTurn {
        role: Role::System.as_str(),
        content,
    });
    let turns = request.messages.iter().map(|m| ChatTurn {
        role: m.role.as_str(),
        content: &m.content,
    });

    ChatBody {
        model,
        messages: system.into_iter().chain(turns).collect(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
    }
}

/// Read the first choice's text and the token usage from a reply body.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body is not a chat reply or has no
/// choices.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let reply: ChatReply =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let choice = reply
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("reply has no choices".to_owned()))?;

    Ok(CompletionResponse {
        text: choice.message.content.unwrap_or_default(),
        usage: UsageStats {
            input_tokens: reply.usage.prompt_tokens,
            output_tokens: reply.usage.completion_tokens,
        },
        model: reply.model,
    })
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = build_request(&self.model, &request);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }

        let response = builder.json(&body).send().await?;
        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
