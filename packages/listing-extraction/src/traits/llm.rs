//! LLM provider contract.
//!
//! Every provider answers `run(prompt, options)` with the same response
//! shape. Provider failures are reported in `error`, not raised, so the AI
//! step can move on to the next provider in its configured order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOptions {
    /// Model override; providers fall back to their default
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// JSON schema the response content must follow
    pub response_schema: Option<serde_json::Value>,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: None,
            system: None,
            temperature: 0.0,
            max_tokens: Some(2_000),
            response_schema: None,
        }
    }
}

impl LlmOptions {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Uniform provider response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    /// Provider-reported confidence, when it has one
    pub confidence: Option<f32>,
    pub tokens: Option<u32>,
    pub error: Option<String>,
    pub model: Option<String>,
}

impl LlmResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A language model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name (matches `PipelineConfig::ai_provider_order`).
    fn name(&self) -> &str;

    async fn run(&self, prompt: &str, options: &LlmOptions) -> LlmResponse;
}
