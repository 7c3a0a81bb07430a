//! Extraction run orchestrator.
//!
//! Drives one listing through the fixed step sequence. Every step is
//! bracketed by an entry and an exit event, and runs behind a panic
//! boundary so nothing a step does can leave the attempt in flight.

use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::context::RunContext;
use super::steps::PipelineStep;
use crate::ai::{AiExtractor, ProviderChain};
use crate::cache::HtmlCache;
use crate::confidence;
use crate::error::{PipelineError, Result};
use crate::events::{candidate_output, failure_output, EventRecorder, OpenEvent};
use crate::extractors::ExtractorRegistry;
use crate::fetchers::{Backfiller, FetcherRegistry};
use crate::lifecycle::{AttemptLifecycle, StuckReclaimer};
use crate::traits::flags::{FeatureFlags, StaticFlags};
use crate::traits::html::HtmlFetcher;
use crate::traits::llm::LlmProvider;
use crate::traits::notify::{Alert, AlertKind, LogNotifier, Notifier};
use crate::traits::store::PipelineStore;
use crate::types::attempt::{Attempt, AttemptStatus, ExtractionMethod};
use crate::types::cache::FetchMode;
use crate::types::config::PipelineConfig;
use crate::types::event::EventStatus;
use crate::types::listing::ListingUpdate;
use crate::types::outcome::{
    Candidate, ExtractionOutcome, FailureKind, StepFailure, StepOutput, StepResult,
};

/// How one step of a run ended.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub status: EventStatus,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub attempt_id: Uuid,
    pub listing_id: Uuid,
    pub status: AttemptStatus,
    pub extraction_method: Option<ExtractionMethod>,
    pub provider: Option<String>,
    pub confidence: Option<f32>,
    pub failed_step: Option<String>,
    pub error_message: Option<String>,
    pub fetch_mode: Option<FetchMode>,
    pub steps: Vec<StepRecord>,
    /// Listing fields written during the run
    pub written_fields: Vec<&'static str>,
}

impl RunReport {
    fn new(ctx: &RunContext, steps: Vec<StepRecord>) -> Self {
        let attempt = &ctx.attempt;
        Self {
            attempt_id: attempt.id,
            listing_id: attempt.listing_id,
            status: attempt.status,
            extraction_method: attempt.extraction_method,
            provider: attempt.provider.clone(),
            confidence: attempt.confidence_score,
            failed_step: attempt.failed_step.clone(),
            error_message: attempt.error_message.clone(),
            fetch_mode: ctx.fetch_mode,
            steps,
            written_fields: ctx.written_fields.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    /// Status of `step`, if it ran.
    pub fn step_status(&self, step: PipelineStep) -> Option<EventStatus> {
        self.steps
            .iter()
            .find(|r| r.step == step.as_str())
            .map(|r| r.status)
    }

    fn summary(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "status": self.status.as_str() }))
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs extraction attempts against a [`PipelineStore`].
pub struct Orchestrator<S: PipelineStore> {
    pub(super) store: Arc<S>,
    pub(super) config: PipelineConfig,
    pub(super) html_fetcher: Arc<dyn HtmlFetcher>,
    pub(super) fetchers: FetcherRegistry,
    pub(super) extractors: ExtractorRegistry,
    pub(super) ai: AiExtractor,
    pub(super) backfiller: Option<Backfiller>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) lifecycle: AttemptLifecycle<S>,
    pub(super) cache: HtmlCache<S>,
    pub(super) events: EventRecorder<S>,
}

impl<S: PipelineStore + 'static> Orchestrator<S> {
    /// Orchestrator with the public API fetchers enabled, no LLM providers
    /// and a logging notifier.
    pub fn new(store: Arc<S>, config: PipelineConfig, html_fetcher: Arc<dyn HtmlFetcher>) -> Self {
        let flags: Arc<dyn FeatureFlags> = Arc::new(StaticFlags::all_enabled());
        Self {
            fetchers: FetcherRegistry::with_default_fetchers(flags, config.api_timeout),
            extractors: ExtractorRegistry::new(),
            ai: AiExtractor::new(ProviderChain::default(), config.ai_confidence_floor),
            backfiller: None,
            notifier: Arc::new(LogNotifier),
            lifecycle: AttemptLifecycle::new(store.clone()),
            cache: HtmlCache::new(store.clone(), config.cache_ttl_chrono()),
            events: EventRecorder::new(store.clone()),
            store,
            config,
            html_fetcher,
        }
    }

    pub fn with_fetchers(mut self, fetchers: FetcherRegistry) -> Self {
        self.fetchers = fetchers;
        self
    }

    /// Register LLM providers; they run in the configured order.
    pub fn with_llm_providers(mut self, providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let chain = ProviderChain::new(providers, &self.config.ai_provider_order);
        self.backfiller = self
            .config
            .backfill_enabled
            .then(|| Backfiller::new(chain.clone()));
        self.ai = AiExtractor::new(chain, self.config.ai_confidence_floor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &HtmlCache<S> {
        &self.cache
    }

    pub fn lifecycle(&self) -> &AttemptLifecycle<S> {
        &self.lifecycle
    }

    /// Sweep for abandoned attempts, sharing this orchestrator's store
    /// and notifier.
    pub fn reclaimer(&self) -> StuckReclaimer<S> {
        StuckReclaimer::new(
            self.store.clone(),
            self.notifier.clone(),
            self.config.stuck_threshold_chrono(),
        )
    }

    /// Retry or dead-letter a failed attempt against the configured budget.
    pub async fn schedule_retry(&self, attempt: &mut Attempt) -> Result<AttemptStatus> {
        self.lifecycle
            .decide_after_failure(attempt, self.config.max_retries)
            .await
    }

    /// Run the extraction waterfall for one listing.
    ///
    /// Step failures end up on the attempt row, not in the returned error.
    /// `Err` means the run could not be recorded at all: the listing is
    /// missing, storage failed, or another writer moved the attempt.
    #[instrument(skip(self), fields(attempt_id = tracing::field::Empty))]
    pub async fn run_extraction(&self, listing_id: Uuid) -> Result<RunReport> {
        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or(PipelineError::ListingNotFound(listing_id))?;
        let attempt = self.lifecycle.start(listing_id).await?;
        tracing::Span::current().record("attempt_id", tracing::field::display(attempt.id));
        info!(url = %listing.url, retry_count = attempt.retry_count, "Extraction run starting");

        let mut ctx = RunContext::new(listing, attempt);
        let mut steps = Vec::with_capacity(PipelineStep::ALL.len());
        let mut verdict = StepResult::Continue;
        let mut stopped_at = None;

        for step in PipelineStep::ALL {
            self.enter(step, &mut ctx).await?;
            let (result, status) = self.execute(step, &mut ctx).await;
            steps.push(StepRecord {
                step: step.as_str(),
                status,
            });
            if result != StepResult::Continue {
                debug!(step = %step, result = result.as_str(), "Waterfall stopped");
                verdict = result;
                stopped_at = Some(step);
                break;
            }
        }

        if let Err(e) = self.finish(&mut ctx, verdict, stopped_at).await {
            warn!(attempt_id = %ctx.attempt.id, error = %e, "Could not record run outcome");
            return Err(e);
        }

        let report = RunReport::new(&ctx, steps);
        self.events
            .run_completed(ctx.attempt.id, report.summary())
            .await;
        info!(
            status = %report.status,
            method = ?report.extraction_method,
            confidence = ?report.confidence,
            failed_step = ?report.failed_step,
            "Extraction run finished"
        );
        Ok(report)
    }

    /// Status moves tied to step boundaries.
    async fn enter(&self, step: PipelineStep, ctx: &mut RunContext) -> Result<()> {
        match step {
            PipelineStep::FetchHtml => self.lifecycle.mark_fetching(&mut ctx.attempt).await,
            PipelineStep::ApiExtraction => self.lifecycle.mark_extracting(&mut ctx.attempt).await,
            _ => Ok(()),
        }
    }

    async fn execute(&self, step: PipelineStep, ctx: &mut RunContext) -> (StepResult, EventStatus) {
        let event = self
            .events
            .start(ctx.attempt.id, step.as_str(), step.input(ctx))
            .await;

        let outcome = AssertUnwindSafe(self.run_step(step, ctx))
            .catch_unwind()
            .await;
        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return self.unexpected(step, ctx, &event, e.to_string()).await,
            Err(panic) => {
                let message = panic_message(&panic);
                error!(step = %step, panic = %message, "Step panicked");
                let error = PipelineError::StepPanicked {
                    step: step.as_str().to_string(),
                };
                return self
                    .unexpected(step, ctx, &event, format!("{error}: {message}"))
                    .await;
            }
        };

        match output {
            StepOutput::Proceed { detail } => {
                self.events.succeed(&event, detail).await;
                (StepResult::Continue, EventStatus::Success)
            }
            StepOutput::Skipped { reason } => {
                debug!(step = %step, reason = %reason, "Step skipped");
                self.events.skip(&event, &reason).await;
                (StepResult::Continue, EventStatus::Skipped)
            }
            StepOutput::Failed { failure, halt } => {
                debug!(step = %step, kind = %failure.kind, halt, error = %failure.message, "Step failed");
                self.events.fail(&event, failure_output(&failure)).await;
                ctx.last_failure = Some((step, failure.clone()));
                if halt {
                    (StepResult::StopFailure(failure), EventStatus::Failed)
                } else {
                    (StepResult::Continue, EventStatus::Failed)
                }
            }
            StepOutput::Candidate(candidate) => {
                match self.judge(step, ctx, &event, candidate).await {
                    Ok(verdict) => verdict,
                    Err(e) => self.unexpected(step, ctx, &event, e.to_string()).await,
                }
            }
        }
    }

    /// Acceptance check after a candidate-producing step.
    async fn judge(
        &self,
        step: PipelineStep,
        ctx: &mut RunContext,
        event: &OpenEvent,
        candidate: Candidate,
    ) -> Result<(StepResult, EventStatus)> {
        ctx.observe_confidence(candidate.confidence);

        let failure = match confidence::evaluate(&candidate.data, candidate.confidence) {
            ExtractionOutcome::Success { data, confidence } => {
                self.write_listing(ctx, ListingUpdate::from_accepted(&data))
                    .await?;
                self.events
                    .succeed(event, candidate_output(&candidate, true))
                    .await;
                info!(step = %step, method = %candidate.method, confidence, "Result accepted");
                ctx.accepted = Some(Candidate {
                    confidence,
                    ..candidate
                });
                return Ok((StepResult::StopSuccess, EventStatus::Success));
            }
            ExtractionOutcome::PartialSuccess { data, confidence } => {
                ctx.merge_partial(&data, confidence);
                let update = ListingUpdate::partial(&ctx.partial);
                if !update.is_empty() {
                    self.write_listing(ctx, update).await?;
                }
                StepFailure::new(
                    FailureKind::LowConfidence,
                    format!(
                        "confidence {confidence:.2} below threshold {:.2}",
                        ctx.threshold
                    ),
                )
            }
            ExtractionOutcome::Failure { reason } => {
                StepFailure::new(FailureKind::LowConfidence, reason)
            }
        };

        debug!(step = %step, confidence = candidate.confidence, error = %failure.message, "Result rejected");
        let mut output = candidate_output(&candidate, false);
        output["error"] = json!(failure.message);
        output["error_kind"] = json!(failure.kind.as_str());
        self.events.fail(event, output).await;
        ctx.last_failure = Some((step, failure));
        Ok((StepResult::Continue, EventStatus::Failed))
    }

    async fn write_listing(&self, ctx: &mut RunContext, update: ListingUpdate) -> Result<()> {
        self.store.update_listing(ctx.listing.id, &update).await?;
        ctx.listing.apply(&update);
        for field in update.written_fields() {
            if !ctx.written_fields.contains(&field) {
                ctx.written_fields.push(field);
            }
        }
        Ok(())
    }

    /// An error or panic escaped a step.
    async fn unexpected(
        &self,
        step: PipelineStep,
        ctx: &mut RunContext,
        event: &OpenEvent,
        message: String,
    ) -> (StepResult, EventStatus) {
        error!(step = %step, error = %message, "Unexpected error in step");
        let failure = StepFailure::new(FailureKind::Unexpected, message);
        self.events.fail(event, failure_output(&failure)).await;

        self.notifier
            .notify(Alert {
                kind: AlertKind::UnexpectedError,
                attempt_id: ctx.attempt.id,
                listing_id: ctx.listing.id,
                message: format!("Unexpected error in {step}: {}", failure.message),
                details: json!({ "step": step.as_str(), "url": ctx.listing.url }),
            })
            .await;

        ctx.last_failure = Some((step, failure.clone()));
        (StepResult::StopFailure(failure), EventStatus::Failed)
    }

    /// Move the attempt to its terminal status.
    async fn finish(
        &self,
        ctx: &mut RunContext,
        verdict: StepResult,
        stopped_at: Option<PipelineStep>,
    ) -> Result<()> {
        let (step, failure) = match verdict {
            StepResult::StopSuccess => {
                return match ctx.accepted.as_ref() {
                    Some(candidate) => self.lifecycle.complete(&mut ctx.attempt, candidate).await,
                    None => Err(PipelineError::InvalidTransition {
                        from: ctx.attempt.status,
                        to: AttemptStatus::Completed,
                    }),
                };
            }
            StepResult::StopFailure(failure) => {
                (stopped_at.unwrap_or(PipelineStep::AiExtraction), failure)
            }
            StepResult::Continue => ctx.last_failure.clone().unwrap_or_else(|| {
                (
                    PipelineStep::AiExtraction,
                    StepFailure::new(
                        FailureKind::LowConfidence,
                        "no strategy produced an acceptable result",
                    ),
                )
            }),
        };

        if failure.kind == FailureKind::AccessLimited && self.config.manual_for_limited_sources {
            return self
                .lifecycle
                .mark_manual(&mut ctx.attempt, failure.message)
                .await;
        }

        self.lifecycle
            .fail(
                &mut ctx.attempt,
                step.as_str(),
                failure.message,
                ctx.best_confidence,
            )
            .await
    }
}
