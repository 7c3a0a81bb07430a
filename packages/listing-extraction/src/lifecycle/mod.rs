//! Attempt state machine.
//!
//! Every status change goes through [`AttemptLifecycle`], which checks the
//! forward-only transition table and persists with a compare-and-set on
//! the previous status. A lost race (the reclaimer got there first)
//! surfaces as [`PipelineError::InvalidTransition`] against the stored
//! status.

pub mod reclaim;

pub use reclaim::{ReclaimReport, StuckReclaimer};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::store::AttemptStore;
use crate::types::attempt::{Attempt, AttemptStatus};
use crate::types::outcome::Candidate;

pub struct AttemptLifecycle<S: AttemptStore> {
    store: Arc<S>,
}

impl<S: AttemptStore> Clone for AttemptLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AttemptStore> AttemptLifecycle<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create the pending attempt for a new run.
    ///
    /// A listing whose latest attempt was scheduled for retry carries its
    /// retry count forward.
    pub async fn start(&self, listing_id: Uuid) -> Result<Attempt> {
        let retry_count = match self.store.latest_attempt_for_listing(listing_id).await? {
            Some(previous) if previous.status == AttemptStatus::Retrying => previous.retry_count,
            _ => 0,
        };

        let attempt = Attempt::new(listing_id).with_retry_count(retry_count);
        self.store.insert_attempt(&attempt).await?;
        debug!(attempt_id = %attempt.id, %listing_id, retry_count, "Attempt created");
        Ok(attempt)
    }

    /// Move `attempt` to `next`, applying `mutate` to the new row.
    async fn transition(
        &self,
        attempt: &mut Attempt,
        next: AttemptStatus,
        mutate: impl FnOnce(&mut Attempt) + Send,
    ) -> Result<()> {
        if !attempt.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: attempt.status,
                to: next,
            });
        }

        let now = Utc::now();
        let mut updated = attempt.clone();
        updated.status = next;
        updated.updated_at = now;
        if !next.is_in_flight() && next != AttemptStatus::Retrying {
            updated.finished_at.get_or_insert(now);
        }
        mutate(&mut updated);

        if !self.store.update_attempt_if_status(&updated, attempt.status).await? {
            let stored = self
                .store
                .get_attempt(attempt.id)
                .await?
                .ok_or(PipelineError::AttemptNotFound(attempt.id))?;
            return Err(PipelineError::InvalidTransition {
                from: stored.status,
                to: next,
            });
        }

        debug!(attempt_id = %attempt.id, from = %attempt.status, to = %next, "Attempt transition");
        *attempt = updated;
        Ok(())
    }

    /// Persist field changes without a status change.
    pub async fn annotate(
        &self,
        attempt: &mut Attempt,
        mutate: impl FnOnce(&mut Attempt) + Send,
    ) -> Result<()> {
        let mut updated = attempt.clone();
        updated.updated_at = Utc::now();
        mutate(&mut updated);

        if !self.store.update_attempt_if_status(&updated, attempt.status).await? {
            let stored = self
                .store
                .get_attempt(attempt.id)
                .await?
                .ok_or(PipelineError::AttemptNotFound(attempt.id))?;
            return Err(PipelineError::InvalidTransition {
                from: stored.status,
                to: attempt.status,
            });
        }
        *attempt = updated;
        Ok(())
    }

    pub async fn mark_fetching(&self, attempt: &mut Attempt) -> Result<()> {
        self.transition(attempt, AttemptStatus::Fetching, |_| {}).await
    }

    pub async fn mark_extracting(&self, attempt: &mut Attempt) -> Result<()> {
        self.transition(attempt, AttemptStatus::Extracting, |_| {}).await
    }

    /// Terminal success. Records how the accepted result was produced.
    pub async fn complete(&self, attempt: &mut Attempt, candidate: &Candidate) -> Result<()> {
        let method = candidate.method;
        let provider = candidate.provider.clone();
        let model = candidate.model.clone();
        let confidence = candidate.confidence;

        self.transition(attempt, AttemptStatus::Completed, move |a| {
            a.extraction_method = Some(method);
            a.provider = provider;
            a.model = model;
            a.confidence_score = Some(confidence);
            a.failed_step = None;
            a.error_message = None;
        })
        .await?;

        info!(
            attempt_id = %attempt.id,
            method = %method,
            confidence,
            "Attempt completed"
        );
        Ok(())
    }

    /// Mark the attempt failed at `step`. Every failure counts toward the
    /// retry budget.
    pub async fn fail(
        &self,
        attempt: &mut Attempt,
        step: &str,
        message: impl Into<String>,
        confidence: Option<f32>,
    ) -> Result<()> {
        let step = step.to_string();
        let message = message.into();

        self.transition(attempt, AttemptStatus::Failed, move |a| {
            a.retry_count += 1;
            a.failed_step = Some(step);
            a.error_message = Some(message);
            if confidence.is_some() {
                a.confidence_score = confidence;
            }
        })
        .await?;

        info!(
            attempt_id = %attempt.id,
            failed_step = attempt.failed_step.as_deref().unwrap_or_default(),
            retry_count = attempt.retry_count,
            "Attempt failed"
        );
        Ok(())
    }

    /// Operator override: stop automation for this attempt.
    pub async fn mark_manual(&self, attempt: &mut Attempt, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.transition(attempt, AttemptStatus::Manual, move |a| {
            a.error_message = Some(reason);
        })
        .await
    }

    /// Scheduler decision for a failed attempt: retry until `max_retries`
    /// failures have been counted, then dead-letter.
    pub async fn decide_after_failure(
        &self,
        attempt: &mut Attempt,
        max_retries: i32,
    ) -> Result<AttemptStatus> {
        let next = if attempt.retry_count >= max_retries {
            AttemptStatus::DeadLetter
        } else {
            AttemptStatus::Retrying
        };
        self.transition(attempt, next, |_| {}).await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::types::attempt::ExtractionMethod;
    use crate::types::job::JobData;

    fn lifecycle() -> (Arc<MemoryStore>, AttemptLifecycle<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), AttemptLifecycle::new(store))
    }

    #[tokio::test]
    async fn test_happy_path_records_method() {
        let (store, lifecycle) = lifecycle();
        let mut attempt = lifecycle.start(Uuid::new_v4()).await.unwrap();

        lifecycle.mark_fetching(&mut attempt).await.unwrap();
        lifecycle.mark_extracting(&mut attempt).await.unwrap();
        let candidate = Candidate::new(JobData::new(), 0.9, ExtractionMethod::Api).with_provider("lever");
        lifecycle.complete(&mut attempt, &candidate).await.unwrap();

        let stored = store.get_attempt(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Completed);
        assert_eq!(stored.extraction_method, Some(ExtractionMethod::Api));
        assert_eq!(stored.provider.as_deref(), Some("lever"));
        assert_eq!(stored.confidence_score, Some(0.9));
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_regression_is_rejected() {
        let (_, lifecycle) = lifecycle();
        let mut attempt = lifecycle.start(Uuid::new_v4()).await.unwrap();
        lifecycle.mark_fetching(&mut attempt).await.unwrap();
        lifecycle.mark_extracting(&mut attempt).await.unwrap();

        let err = lifecycle.mark_fetching(&mut attempt).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: AttemptStatus::Extracting,
                to: AttemptStatus::Fetching
            }
        ));
    }

    #[tokio::test]
    async fn test_lost_race_reports_stored_status() {
        let (store, lifecycle) = lifecycle();
        let mut attempt = lifecycle.start(Uuid::new_v4()).await.unwrap();
        lifecycle.mark_fetching(&mut attempt).await.unwrap();

        // Someone else fails it behind our back
        let mut other = attempt.clone();
        lifecycle.fail(&mut other, "fetch_html", "stuck", None).await.unwrap();

        let err = lifecycle.mark_extracting(&mut attempt).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                from: AttemptStatus::Failed,
                ..
            }
        ));
        assert_eq!(
            store.get_attempt(attempt.id).await.unwrap().unwrap().status,
            AttemptStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_retry_budget() {
        let (_, lifecycle) = lifecycle();
        let listing_id = Uuid::new_v4();

        let mut attempt = lifecycle.start(listing_id).await.unwrap();
        lifecycle.fail(&mut attempt, "fetch_html", "timeout", None).await.unwrap();
        assert_eq!(attempt.retry_count, 1);
        assert_eq!(
            lifecycle.decide_after_failure(&mut attempt, 2).await.unwrap(),
            AttemptStatus::Retrying
        );

        // The next run inherits the counter
        let mut second = lifecycle.start(listing_id).await.unwrap();
        assert_eq!(second.retry_count, 1);
        lifecycle.fail(&mut second, "ai_extraction", "timeout", None).await.unwrap();
        assert_eq!(
            lifecycle.decide_after_failure(&mut second, 2).await.unwrap(),
            AttemptStatus::DeadLetter
        );
    }

    #[tokio::test]
    async fn test_manual_override() {
        let (_, lifecycle) = lifecycle();
        let mut attempt = lifecycle.start(Uuid::new_v4()).await.unwrap();
        lifecycle.mark_manual(&mut attempt, "login wall").await.unwrap();

        assert_eq!(attempt.status, AttemptStatus::Manual);
        assert!(attempt.status.is_terminal());
        assert!(lifecycle.mark_fetching(&mut attempt).await.is_err());
    }
}
