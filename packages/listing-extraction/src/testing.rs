//! Test doubles and fixtures.
//!
//! Recording mocks for the collaborator seams, usable from unit tests and
//! from the integration tests under `tests/`.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::llm::{LlmOptions, LlmProvider, LlmResponse};
use crate::traits::notify::{Alert, AlertKind, Notifier};

// =============================================================================
// Mock LLM provider
// =============================================================================

/// LLM provider with queued canned responses.
///
/// Responses are served in order; the last one repeats once the queue is
/// down to one. With nothing queued every call fails. Clones share state.
#[derive(Clone)]
pub struct MockLlmProvider {
    name: String,
    responses: Arc<Mutex<Vec<LlmResponse>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockLlmProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a response.
    pub fn with_response(self, response: LlmResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    /// Queue a JSON payload as a successful response.
    pub fn with_json_response(self, payload: serde_json::Value, confidence: Option<f32>) -> Self {
        let mut response = LlmResponse::ok(payload.to_string()).with_model("mock-model");
        response.confidence = confidence;
        self.with_response(response)
    }

    /// Sleep before answering. Runs on tokio time, so paused-clock tests
    /// can push a call past a timeout without waiting.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|p| p.contains(text))
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str, _options: &LlmOptions) -> LlmResponse {
        self.calls.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => LlmResponse::failed("no canned response"),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}

// =============================================================================
// Recording notifier
// =============================================================================

/// Notifier that keeps every alert.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub mod fixtures {
    use serde_json::json;

    /// A page with no job markup at all.
    pub const BARE_PAGE: &str = r#"<html><head><title>Welcome</title></head>
<body><div class="wrapper"><span>Hello there.</span></div></body></html>"#;

    /// A Greenhouse posting page with every required field.
    pub const GREENHOUSE_PAGE: &str = r#"<html><body>
<div id="app_body">
  <div id="header">
    <h1 class="app-title">Senior Backend Engineer</h1>
    <span class="company-name">at Acme</span>
    <div class="location">Remote - US</div>
  </div>
  <div id="content">
    <p>Acme builds developer tools used by thousands of teams.</p>
    <h3>Requirements</h3><ul><li>Rust</li><li>Postgres</li></ul>
  </div>
</div>
</body></html>"#;

    /// An auth-walled page as served to anonymous visitors.
    pub const LOGIN_WALL_PAGE: &str = r#"<html><body>
<form class="login-form" action="/uas/login"><input type="password" name="session_password"></form>
<p>Sign in to view this job</p>
</body></html>"#;

    /// AI payload with the given required fields.
    pub fn ai_payload(
        title: Option<&str>,
        company: Option<&str>,
        description: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "title": title,
            "company_name": company,
            "description": description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_mock_llm_serves_queue_then_repeats() {
        let provider = MockLlmProvider::new("openai")
            .with_response(LlmResponse::ok("first"))
            .with_response(LlmResponse::ok("second"));
        let options = LlmOptions::default();

        assert_eq!(provider.run("a", &options).await.content, "first");
        assert_eq!(provider.run("b", &options).await.content, "second");
        assert_eq!(provider.run("c", &options).await.content, "second");
        assert_eq!(provider.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier
            .notify(Alert {
                kind: AlertKind::UnexpectedError,
                attempt_id: Uuid::new_v4(),
                listing_id: Uuid::new_v4(),
                message: "boom".into(),
                details: serde_json::Value::Null,
            })
            .await;
        assert_eq!(notifier.count(AlertKind::UnexpectedError), 1);
        assert_eq!(notifier.count(AlertKind::StuckAttempt), 0);
    }
}
