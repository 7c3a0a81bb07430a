//! Event recorder.
//!
//! Side channel only: storage errors are logged and swallowed so a broken
//! event table never changes the outcome of a run.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::store::{EventStore, ScrapingLogStore};
use crate::types::event::{EventStatus, ExtractionEvent, HtmlScrapingLogEntry};
use crate::types::job::JobData;
use crate::types::outcome::{Candidate, StepFailure};

/// Event type of the per-run summary.
pub const RUN_COMPLETED: &str = "run_completed";

/// Handle to an open step event.
#[derive(Debug, Clone)]
pub struct OpenEvent {
    pub id: Uuid,
    pub event_type: String,
    /// False when the insert failed; finishing is then a no-op
    persisted: bool,
}

pub struct EventRecorder<S: EventStore + ScrapingLogStore> {
    store: Arc<S>,
}

impl<S: EventStore + ScrapingLogStore> Clone for EventRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: EventStore + ScrapingLogStore> EventRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Entry event for a step.
    pub async fn start(&self, attempt_id: Uuid, step: &str, input: Value) -> OpenEvent {
        let event = ExtractionEvent::started(attempt_id, step, input);
        let persisted = match self.store.insert_event(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%attempt_id, step, error = %e, "Failed to record step start");
                false
            }
        };
        OpenEvent {
            id: event.id,
            event_type: event.event_type,
            persisted,
        }
    }

    async fn finish(&self, event: &OpenEvent, status: EventStatus, output: Value) {
        if !event.persisted {
            return;
        }
        match self
            .store
            .finish_event(event.id, status, output, Utc::now())
            .await
        {
            Ok(true) => debug!(step = %event.event_type, status = status.as_str(), "Step event closed"),
            // Reclaimer closed it first
            Ok(false) => debug!(step = %event.event_type, "Step event already closed"),
            Err(e) => warn!(step = %event.event_type, error = %e, "Failed to record step exit"),
        }
    }

    pub async fn succeed(&self, event: &OpenEvent, output: Value) {
        self.finish(event, EventStatus::Success, output).await
    }

    pub async fn fail(&self, event: &OpenEvent, output: Value) {
        self.finish(event, EventStatus::Failed, output).await
    }

    pub async fn skip(&self, event: &OpenEvent, reason: &str) {
        self.finish(event, EventStatus::Skipped, json!({ "reason": reason }))
            .await
    }

    pub async fn record_scraping_log(&self, entry: &HtmlScrapingLogEntry) {
        if let Err(e) = self.store.insert_scraping_log(entry).await {
            warn!(attempt_id = %entry.attempt_id, error = %e, "Failed to record scraping log");
        }
    }

    /// Closed summary event for the whole run.
    pub async fn run_completed(&self, attempt_id: Uuid, summary: Value) {
        let mut event = ExtractionEvent::started(attempt_id, RUN_COMPLETED, json!({}));
        event.status = EventStatus::Success;
        event.output_payload = Some(summary);
        event.finished_at = Some(Utc::now());

        if let Err(e) = self.store.insert_event(&event).await {
            warn!(%attempt_id, error = %e, "Failed to record run summary");
        }
    }
}

fn field_names(data: &JobData, extracted: bool) -> Vec<&'static str> {
    let fields = if extracted {
        data.extracted_fields()
    } else {
        data.missing_fields()
    };
    fields.into_iter().map(|f| f.as_str()).collect()
}

/// Output payload for a candidate-producing step.
pub fn candidate_output(candidate: &Candidate, accepted: bool) -> Value {
    json!({
        "confidence": candidate.confidence,
        "method": candidate.method.as_str(),
        "provider": candidate.provider,
        "model": candidate.model,
        "accepted": accepted,
        "extracted_fields": field_names(&candidate.data, true),
        "missing_fields": field_names(&candidate.data, false),
    })
}

/// Output payload for a failed step.
pub fn failure_output(failure: &StepFailure) -> Value {
    json!({
        "error": failure.message,
        "error_kind": failure.kind.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::types::attempt::ExtractionMethod;
    use crate::types::outcome::FailureKind;

    #[tokio::test]
    async fn test_step_events_are_closed_once() {
        let store = Arc::new(MemoryStore::new());
        let recorder = EventRecorder::new(store.clone());
        let attempt_id = Uuid::new_v4();

        let event = recorder.start(attempt_id, "api_extraction", json!({"board": "lever"})).await;
        let failure = StepFailure::new(FailureKind::Transient, "HTTP status 503");
        recorder.fail(&event, failure_output(&failure)).await;
        recorder.succeed(&event, json!({})).await;

        let events = store.events_for_attempt(attempt_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, EventStatus::Failed);
        assert_eq!(events[0].output_payload.as_ref().unwrap()["error_kind"], "transient");
    }

    #[tokio::test]
    async fn test_run_summary_is_closed_on_insert() {
        let store = Arc::new(MemoryStore::new());
        let recorder = EventRecorder::new(store.clone());
        let attempt_id = Uuid::new_v4();

        recorder.run_completed(attempt_id, json!({"status": "completed"})).await;

        let events = store.events_for_attempt(attempt_id).await.unwrap();
        assert_eq!(events[0].event_type, RUN_COMPLETED);
        assert!(!events[0].is_open());
    }

    #[test]
    fn test_candidate_output_lists_fields() {
        let data = JobData {
            title: Some("Engineer".into()),
            ..JobData::default()
        };
        let output = candidate_output(&Candidate::new(data, 0.25, ExtractionMethod::Selector), false);
        assert_eq!(output["extracted_fields"], json!(["title"]));
        assert_eq!(output["accepted"], false);
        assert_eq!(output["missing_fields"].as_array().unwrap().len(), 8);
    }
}
