//! Stuck-attempt reclaimer.
//!
//! A crashed or hung worker leaves its attempt in an in-flight status
//! forever. The sweep is triggered externally (every ten minutes or so)
//! and fails every in-flight attempt not touched within the threshold.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::notify::{Alert, AlertKind, Notifier};
use crate::traits::store::{AttemptStore, EventStore};
use crate::types::attempt::{Attempt, AttemptStatus};
use crate::types::event::EventStatus;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReclaimReport {
    /// Attempts moved to `failed` by this pass
    pub reclaimed: Vec<Uuid>,
    /// Stale attempts another writer moved first
    pub raced: usize,
    /// Open events closed as timeouts
    pub events_closed: usize,
    /// Store errors; the attempt is left for the next pass or partially closed
    pub errors: usize,
}

pub struct StuckReclaimer<S: AttemptStore + EventStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    threshold: chrono::Duration,
}

impl<S: AttemptStore + EventStore> StuckReclaimer<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, threshold: chrono::Duration) -> Self {
        Self {
            store,
            notifier,
            threshold,
        }
    }

    pub async fn sweep(&self) -> Result<ReclaimReport> {
        self.sweep_at(Utc::now()).await
    }

    #[instrument(skip(self), fields(threshold_secs = self.threshold.num_seconds()))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<ReclaimReport> {
        let stale = self
            .store
            .find_stale_attempts(&AttemptStatus::IN_FLIGHT, now - self.threshold)
            .await?;

        let mut report = ReclaimReport::default();
        for attempt in stale {
            let attempt_id = attempt.id;
            if let Err(e) = self.reclaim(attempt, now, &mut report).await {
                report.errors += 1;
                error!(attempt_id = %attempt_id, error = %e, "Failed to reclaim stuck attempt");
            }
        }

        if !report.reclaimed.is_empty() || report.errors > 0 {
            info!(
                reclaimed = report.reclaimed.len(),
                raced = report.raced,
                errors = report.errors,
                "Stuck attempts reclaimed"
            );
        }
        Ok(report)
    }

    async fn reclaim(
        &self,
        attempt: Attempt,
        now: DateTime<Utc>,
        report: &mut ReclaimReport,
    ) -> Result<()> {
        let open_events = self.store.open_events_for_attempt(attempt.id).await?;
        let stuck_step = open_events
            .last()
            .map(|e| e.event_type.clone())
            .unwrap_or_else(|| attempt.status.as_str().to_string());
        let minutes = (now - attempt.updated_at).num_minutes();
        let message = format!(
            "Attempt stuck in {} for {} minutes during {}; presumed abandoned (timeout)",
            attempt.status, minutes, stuck_step
        );

        let mut updated = attempt.clone();
        updated.status = AttemptStatus::Failed;
        updated.updated_at = now;
        updated.finished_at = Some(now);
        updated.retry_count += 1;
        updated.failed_step = Some(stuck_step.clone());
        updated.error_message = Some(message.clone());

        if !self.store.update_attempt_if_status(&updated, attempt.status).await? {
            report.raced += 1;
            return Ok(());
        }

        // The attempt is already failed, so the rest is best effort
        report.reclaimed.push(attempt.id);
        for event in &open_events {
            let closed = self
                .store
                .finish_event(
                    event.id,
                    EventStatus::Failed,
                    json!({
                        "error": "timeout",
                        "error_kind": "timeout",
                        "message": message,
                    }),
                    now,
                )
                .await;
            match closed {
                Ok(true) => report.events_closed += 1,
                Ok(false) => {}
                Err(e) => {
                    report.errors += 1;
                    error!(
                        attempt_id = %attempt.id,
                        event_id = %event.id,
                        error = %e,
                        "Failed to close event of reclaimed attempt"
                    );
                }
            }
        }

        warn!(
            attempt_id = %attempt.id,
            listing_id = %attempt.listing_id,
            stuck_step = %stuck_step,
            minutes,
            "Reclaimed stuck attempt"
        );

        self.notifier
            .notify(Alert {
                kind: AlertKind::StuckAttempt,
                attempt_id: attempt.id,
                listing_id: attempt.listing_id,
                message,
                details: json!({
                    "status": attempt.status.as_str(),
                    "stuck_step": stuck_step,
                    "last_updated_at": attempt.updated_at,
                    "retry_count": updated.retry_count,
                }),
            })
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::stores::MemoryStore;
    use crate::testing::RecordingNotifier;
    use crate::traits::notify::MockNotifier;
    use crate::types::event::ExtractionEvent;
    use chrono::Duration;

    fn stuck_attempt(store: &MemoryStore, status: AttemptStatus, age: Duration) -> Attempt {
        let attempt = Attempt::new(Uuid::new_v4())
            .with_started_at(Utc::now() - age)
            .with_status(status);
        store.put_attempt(attempt.clone());
        attempt
    }

    #[tokio::test]
    async fn test_reclaims_once_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let attempt = stuck_attempt(&store, AttemptStatus::Fetching, Duration::minutes(11));
        let event = ExtractionEvent::started(attempt.id, "fetch_html", json!({}));
        store.insert_event(&event).await.unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|alert| alert.kind == AlertKind::StuckAttempt)
            .times(1)
            .returning(|_| ());

        let reclaimer = StuckReclaimer::new(store.clone(), Arc::new(notifier), Duration::minutes(10));

        let first = reclaimer.sweep().await.unwrap();
        assert_eq!(first.reclaimed, vec![attempt.id]);
        assert_eq!(first.events_closed, 1);

        let second = reclaimer.sweep().await.unwrap();
        assert!(second.reclaimed.is_empty());

        let stored = store.get_attempt(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert_eq!(stored.failed_step.as_deref(), Some("fetch_html"));
        assert!(stored.error_message.unwrap().contains("timeout"));

        let events = store.events_for_attempt(attempt.id).await.unwrap();
        assert_eq!(events[0].status, EventStatus::Failed);
        assert_eq!(events[0].output_payload.as_ref().unwrap()["error_kind"], "timeout");
    }

    #[tokio::test]
    async fn test_fresh_and_terminal_attempts_are_left_alone() {
        let store = Arc::new(MemoryStore::new());
        stuck_attempt(&store, AttemptStatus::Extracting, Duration::minutes(3));
        stuck_attempt(&store, AttemptStatus::Completed, Duration::hours(2));

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let reclaimer = StuckReclaimer::new(store, Arc::new(notifier), Duration::minutes(10));
        assert_eq!(reclaimer.sweep().await.unwrap(), ReclaimReport::default());
    }

    /// Memory store whose events can never be closed.
    struct UnclosableEvents(MemoryStore);

    #[async_trait::async_trait]
    impl AttemptStore for UnclosableEvents {
        async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
            self.0.insert_attempt(attempt).await
        }

        async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
            self.0.get_attempt(id).await
        }

        async fn latest_attempt_for_listing(&self, listing_id: Uuid) -> Result<Option<Attempt>> {
            self.0.latest_attempt_for_listing(listing_id).await
        }

        async fn update_attempt_if_status(
            &self,
            attempt: &Attempt,
            expected: AttemptStatus,
        ) -> Result<bool> {
            self.0.update_attempt_if_status(attempt, expected).await
        }

        async fn find_stale_attempts(
            &self,
            statuses: &[AttemptStatus],
            older_than: DateTime<Utc>,
        ) -> Result<Vec<Attempt>> {
            self.0.find_stale_attempts(statuses, older_than).await
        }
    }

    #[async_trait::async_trait]
    impl EventStore for UnclosableEvents {
        async fn insert_event(&self, event: &ExtractionEvent) -> Result<()> {
            self.0.insert_event(event).await
        }

        async fn finish_event(
            &self,
            _id: Uuid,
            _status: EventStatus,
            _output: serde_json::Value,
            _finished_at: DateTime<Utc>,
        ) -> Result<bool> {
            Err(PipelineError::Storage("connection reset".into()))
        }

        async fn events_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<ExtractionEvent>> {
            self.0.events_for_attempt(attempt_id).await
        }
    }

    #[tokio::test]
    async fn test_event_store_errors_do_not_stop_the_sweep() {
        let store = Arc::new(UnclosableEvents(MemoryStore::new()));
        let first = stuck_attempt(&store.0, AttemptStatus::Fetching, Duration::minutes(20));
        let second = stuck_attempt(&store.0, AttemptStatus::Extracting, Duration::minutes(15));
        for (attempt, step) in [(&first, "fetch_html"), (&second, "ai_extraction")] {
            store
                .insert_event(&ExtractionEvent::started(attempt.id, step, json!({})))
                .await
                .unwrap();
        }

        let notifier = RecordingNotifier::new();
        let reclaimer =
            StuckReclaimer::new(store.clone(), Arc::new(notifier.clone()), Duration::minutes(10));
        let report = reclaimer.sweep().await.unwrap();

        assert_eq!(report.reclaimed.len(), 2);
        assert!(report.reclaimed.contains(&first.id));
        assert!(report.reclaimed.contains(&second.id));
        assert_eq!(report.events_closed, 0);
        assert_eq!(report.errors, 2);
        assert_eq!(notifier.count(AlertKind::StuckAttempt), 2);

        for id in [first.id, second.id] {
            let stored = store.get_attempt(id).await.unwrap().unwrap();
            assert_eq!(stored.status, AttemptStatus::Failed);
        }
    }
}
