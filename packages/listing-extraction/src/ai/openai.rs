//! OpenAI chat-completions provider.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::traits::llm::{LlmOptions, LlmProvider, LlmResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_schema: Option<JsonSchemaFormat>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// [`LlmProvider`] backed by the OpenAI API.
pub struct OpenAiProvider {
    http_client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from `OPENAI_API_KEY`, with `OPENAI_MODEL` overriding the
    /// default model.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::Invalid {
            key: "OPENAI_API_KEY".to_string(),
            reason: "not set".to_string(),
        })?;
        let mut provider = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            provider = provider.with_model(model);
        }
        Ok(provider)
    }

    /// Set a custom base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, prompt: &'a str, options: &'a LlmOptions) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let response_format = match &options.response_schema {
            // Optional fields are not expressible in strict mode
            Some(schema) => ResponseFormat {
                format_type: "json_schema",
                json_schema: Some(JsonSchemaFormat {
                    name: "job_posting",
                    strict: false,
                    schema: schema.clone(),
                }),
            },
            None => ResponseFormat {
                format_type: "json_object",
                json_schema: None,
            },
        };

        ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn run(&self, prompt: &str, options: &LlmOptions) -> LlmResponse {
        let start = Instant::now();
        let request = self.build_request(prompt, options);

        let response = match self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "OpenAI request failed");
                return LlmResponse::failed(format!("network error: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return LlmResponse::failed(format!("OpenAI API error {status}: {error_text}"));
        }

        let raw: ChatResponseRaw = match response.json().await {
            Ok(raw) => raw,
            Err(e) => return LlmResponse::failed(format!("invalid response body: {e}")),
        };

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        let Some(content) = content else {
            return LlmResponse::failed("no response from OpenAI");
        };

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );

        LlmResponse {
            content,
            confidence: None,
            tokens: raw.usage.map(|u| u.total_tokens),
            error: None,
            model: Some(raw.model.unwrap_or_else(|| request.model.to_string())),
        }
    }
}
