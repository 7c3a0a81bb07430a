//! AI extraction.
//!
//! Providers are tried in the configured order; the first response that
//! parses and clears the confidence floor wins. Provider errors are
//! values on [`LlmResponse`], so one failing provider only moves the
//! chain along. The hard wall-clock bound on the whole step is applied by
//! the pipeline, not here.

pub mod openai;
pub mod prompt;

pub use openai::OpenAiProvider;

use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::confidence;
use crate::salary::{self, SalaryInput};
use crate::traits::llm::{LlmOptions, LlmProvider};
use crate::types::attempt::ExtractionMethod;
use crate::types::job::{JobData, RemoteType};
use crate::types::outcome::Candidate;

/// Shape the model is asked to return.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AiJobPayload {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<String>,
    pub employment_type: Option<String>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub about: Option<String>,
    pub culture: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    /// Pay period as written near the figure
    pub salary_period: Option<String>,
    /// Model's own estimate, 0.0-1.0
    pub confidence: Option<f32>,
}

impl AiJobPayload {
    /// JSON schema sent as the structured-output format.
    pub fn schema() -> Option<serde_json::Value> {
        serde_json::to_value(schemars::schema_for!(AiJobPayload)).ok()
    }

    /// Parse model output, tolerating a fenced code block around the JSON.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let trimmed = content.trim();
        let unfenced = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed);
        serde_json::from_str(unfenced.trim())
    }

    pub fn into_job_data(self) -> JobData {
        let validation = salary::normalize(
            self.salary_min.map(SalaryInput::Number),
            self.salary_max.map(SalaryInput::Number),
            self.salary_currency.as_deref(),
            self.salary_period.as_deref(),
        );

        let mut data = JobData {
            remote_type: self
                .remote_type
                .as_deref()
                .and_then(|r| RemoteType::parse(&r.trim().to_lowercase().replace('-', "_")))
                .unwrap_or_default(),
            employment_type: self.employment_type.filter(|v| !v.trim().is_empty()),
            salary: validation.into_range(),
            ..JobData::default()
        };
        data.title = self.title;
        data.company_name = self.company_name;
        data.description = self.description;
        data.location = self.location;
        data.requirements = self.requirements;
        data.responsibilities = self.responsibilities;
        data.benefits = self.benefits;
        data.about = self.about;
        data.culture = self.culture;

        // Normalize blanks through the field setter
        for field in crate::types::job::JobField::ALL {
            let value = data.field(field).map(str::to_string);
            data.set_field(field, value);
        }

        if data.remote_type == RemoteType::Unspecified {
            data.remote_type = RemoteType::infer(&[data.location.as_deref()]);
        }
        data
    }
}

/// LLM providers in their configured order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl ProviderChain {
    /// Arrange `providers` by `order`. Providers not named are left out;
    /// an empty order keeps registration order.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, order: &[String]) -> Self {
        if order.is_empty() {
            return Self { providers };
        }
        let providers = order
            .iter()
            .filter_map(|name| providers.iter().find(|p| p.name() == name).cloned())
            .collect();
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LlmProvider>> {
        self.providers.iter()
    }
}

/// What the provider chain produced.
#[derive(Debug, Clone)]
pub enum AiAttempt {
    /// First response at or above the floor
    Usable(Candidate),
    /// Every response was below the floor; the best one is kept for
    /// partial persistence
    BelowFloor(Candidate),
    /// No provider produced a parseable result
    Failed { errors: Vec<String> },
}

/// Runs extraction prompts through a [`ProviderChain`].
#[derive(Clone)]
pub struct AiExtractor {
    chain: ProviderChain,
    floor: f32,
}

impl AiExtractor {
    pub fn new(chain: ProviderChain, floor: f32) -> Self {
        Self { chain, floor }
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Extract job data from page text.
    pub async fn extract(&self, url: &str, page_text: &str) -> AiAttempt {
        let prompt = prompt::format_extract_prompt(url, page_text);
        let mut options = LlmOptions::default().with_system(prompt::EXTRACT_SYSTEM);
        if let Some(schema) = AiJobPayload::schema() {
            options = options.with_schema(schema);
        }

        let mut errors = Vec::new();
        let mut best_below_floor: Option<Candidate> = None;

        for provider in self.chain.iter() {
            let name = provider.name().to_string();
            let response = provider.run(&prompt, &options).await;

            if let Some(error) = &response.error {
                warn!(provider = %name, error = %error, "LLM provider failed");
                errors.push(format!("{name}: {error}"));
                continue;
            }

            let payload = match AiJobPayload::parse(&response.content) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(provider = %name, error = %e, "LLM response was not valid JSON");
                    errors.push(format!("{name}: unparseable response: {e}"));
                    continue;
                }
            };

            let self_reported = payload.confidence;
            let data = payload.into_job_data();
            if data.extracted_fields().is_empty() {
                errors.push(format!("{name}: no fields extracted"));
                continue;
            }

            let raw = response
                .confidence
                .or(self_reported)
                .unwrap_or_else(|| confidence::weighted_sum(&data));
            let score = confidence::cap_for_required(&data, raw);
            let candidate = Candidate::new(data, score, ExtractionMethod::Ai)
                .with_provider(name.clone())
                .with_model(response.model.clone());

            if score >= self.floor {
                debug!(provider = %name, confidence = score, "LLM response usable");
                return AiAttempt::Usable(candidate);
            }

            debug!(provider = %name, confidence = score, floor = self.floor, "LLM response below floor");
            if best_below_floor
                .as_ref()
                .map_or(true, |best| candidate.confidence > best.confidence)
            {
                best_below_floor = Some(candidate);
            }
        }

        match best_below_floor {
            Some(candidate) => AiAttempt::BelowFloor(candidate),
            None => AiAttempt::Failed { errors },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlmProvider;
    use crate::traits::llm::LlmResponse;

    fn chain(providers: Vec<Arc<dyn LlmProvider>>, order: &[&str]) -> ProviderChain {
        let order: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        ProviderChain::new(providers, &order)
    }

    #[test]
    fn test_chain_follows_configured_order() {
        let a: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::new("openai"));
        let b: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::new("anthropic"));
        let c: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider::new("local"));

        let ordered = chain(vec![a, b, c], &["anthropic", "openai"]);
        assert_eq!(ordered.names(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_parse_fenced_payload() {
        let payload = AiJobPayload::parse("```json\n{\"title\": \"Engineer\"}\n```").unwrap();
        assert_eq!(payload.title.as_deref(), Some("Engineer"));
    }

    #[test]
    fn test_payload_salary_is_validated() {
        let payload = AiJobPayload {
            title: Some("Engineer".into()),
            salary_min: Some(40.0),
            salary_max: Some(55.0),
            salary_currency: Some("USD".into()),
            salary_period: Some("per hour".into()),
            remote_type: Some("On-Site".into()),
            ..Default::default()
        };
        let data = payload.into_job_data();
        assert!(data.salary.is_none());
        assert_eq!(data.remote_type, RemoteType::OnSite);
    }

    #[tokio::test]
    async fn test_first_usable_response_wins() {
        let failing = MockLlmProvider::new("openai").with_response(LlmResponse::failed("rate limited"));
        let good = MockLlmProvider::new("anthropic").with_response(
            LlmResponse::ok(r#"{"title": "Engineer", "company_name": "Acme", "description": "Build"}"#)
                .with_confidence(0.8),
        );
        let never = MockLlmProvider::new("local");

        let extractor = AiExtractor::new(
            chain(
                vec![Arc::new(failing), Arc::new(good), Arc::new(never.clone())],
                &["openai", "anthropic", "local"],
            ),
            0.2,
        );

        match extractor.extract("https://acme.com/1", "text").await {
            AiAttempt::Usable(candidate) => {
                assert_eq!(candidate.provider.as_deref(), Some("anthropic"));
                assert_eq!(candidate.confidence, 0.8);
            }
            other => panic!("expected usable, got {other:?}"),
        }
        assert_eq!(never.call_count(), 0);
    }

    #[tokio::test]
    async fn test_below_floor_keeps_best() {
        let weak = MockLlmProvider::new("openai")
            .with_response(LlmResponse::ok(r#"{"title": "Engineer"}"#).with_confidence(0.1));
        let extractor = AiExtractor::new(chain(vec![Arc::new(weak)], &["openai"]), 0.2);

        match extractor.extract("https://acme.com/1", "text").await {
            AiAttempt::BelowFloor(candidate) => assert_eq!(candidate.confidence, 0.1),
            other => panic!("expected below floor, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let garbage = MockLlmProvider::new("openai").with_response(LlmResponse::ok("not json"));
        let extractor = AiExtractor::new(chain(vec![Arc::new(garbage)], &[]), 0.2);

        match extractor.extract("https://acme.com/1", "text").await {
            AiAttempt::Failed { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("openai: unparseable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
