//! Generator trait — the abstraction over the text-generation backend.
//!
//! A Generator turns an assembled context into a reply, and in a second
//! mode condenses old conversation turns into a compact summary for the
//! token budget manager.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::message::Message;

/// A fully assembled generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System prompt carrying the scope guardrails and grounding data.
    pub guardrails: String,

    /// Bounded history followed by the current user message.
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

impl GenerationRequest {
    pub fn new(guardrails: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            guardrails: guardrails.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The core Generator trait.
///
/// Failures are reported, never retried here: the caller owns the single
/// overflow retry and the degraded-reply policy.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// The model that requests are sent to.
    fn model(&self) -> &str;

    /// Produce a reply for the assembled context.
    async fn complete(&self, request: GenerationRequest) -> Result<String, GeneratorError>;

    /// Condense conversation turns into a short summary.
    async fn summarize(&self, messages: &[Message]) -> Result<String, GeneratorError>;
}
