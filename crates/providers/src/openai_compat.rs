//! OpenAI-compatible generator implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/v1/chat/completions`. The same backend serves both generator modes:
//! answering with guardrails, and summarizing old conversation turns.

use admitline_core::error::GeneratorError;
use admitline_core::generator::{GenerationRequest, Generator};
use admitline_core::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Tokens requested for a conversation summary.
const SUMMARY_MAX_TOKENS: u32 = 300;

/// An OpenAI-compatible text generator.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a new OpenAI-compatible generator.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeneratorError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Create an OpenAI generator (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GeneratorError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model, Duration::from_secs(30))
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(guardrails: &str, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !guardrails.is_empty() {
            out.push(ApiMessage {
                role: "system".into(),
                content: guardrails.to_string(),
            });
        }
        out.extend(messages.iter().map(|m| ApiMessage {
            role: m.role.as_str().into(),
            content: m.content.clone(),
        }));
        out
    }

    async fn chat(&self, messages: Vec<ApiMessage>, temperature: f32, max_tokens: Option<u32>) -> Result<String, GeneratorError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "stream": false,
        });

        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(generator = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(e.to_string())
                } else {
                    GeneratorError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GeneratorError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(GeneratorError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            if is_context_overflow_body(status, &error_body) {
                warn!(status, "Generator reported context overflow");
                return Err(GeneratorError::ContextOverflow(error_body));
            }
            warn!(status, body = %error_body, "Generator returned error");
            return Err(GeneratorError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

/// Providers signal an oversized prompt with a 400 and one of a few
/// well-known error codes or phrases.
fn is_context_overflow_body(status: u16, body: &str) -> bool {
    if status != 400 && status != 413 {
        return false;
    }
    let lower = body.to_ascii_lowercase();
    lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
        || lower.contains("context window")
        || status == 413
}

/// Instruction used for the summarize mode.
fn summary_prompt(messages: &[Message]) -> String {
    let transcript = messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_ascii_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Summarize this conversation between a user and an admissions assistant.\n\
         Preserve ranks, cutoffs, branch, category and gender details, the questions \
         asked with their answers, and any pending requests.\n\
         Be concise but complete.\n\nCONVERSATION:\n{transcript}\n\nSUMMARY:"
    )
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GeneratorError> {
        let messages = Self::to_api_messages(&request.guardrails, &request.messages);
        self.chat(messages, request.temperature, request.max_tokens).await
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, GeneratorError> {
        let prompt = vec![ApiMessage {
            role: "user".into(),
            content: summary_prompt(messages),
        }];
        self.chat(prompt, 0.3, Some(SUMMARY_MAX_TOKENS)).await
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
