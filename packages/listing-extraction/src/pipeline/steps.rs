//! The fixed step sequence and the body of each step.

use serde_json::{json, Value};
use std::fmt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::context::RunContext;
use super::orchestrator::Orchestrator;
use crate::ai::AiAttempt;
use crate::board::detect_board;
use crate::error::Result;
use crate::extractors::extract_generic;
use crate::fetchers::{failure_kind, FetcherLookup};
use crate::traits::store::PipelineStore;
use crate::types::attempt::ExtractionMethod;
use crate::types::cache::FetchMode;
use crate::types::event::HtmlScrapingLogEntry;
use crate::types::outcome::{Candidate, FailureKind, StepOutput};

/// One stage of an extraction run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    DetectBoard,
    FetchHtml,
    ApiExtraction,
    SelectorExtraction,
    LimitedSource,
    GenericHtmlExtraction,
    AiExtraction,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 7] = [
        PipelineStep::DetectBoard,
        PipelineStep::FetchHtml,
        PipelineStep::ApiExtraction,
        PipelineStep::SelectorExtraction,
        PipelineStep::LimitedSource,
        PipelineStep::GenericHtmlExtraction,
        PipelineStep::AiExtraction,
    ];

    /// Event type recorded for this step.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::DetectBoard => "detect_board",
            PipelineStep::FetchHtml => "fetch_html",
            PipelineStep::ApiExtraction => "api_extraction",
            PipelineStep::SelectorExtraction => "selector_extraction",
            PipelineStep::LimitedSource => "limited_source",
            PipelineStep::GenericHtmlExtraction => "generic_html_extraction",
            PipelineStep::AiExtraction => "ai_extraction",
        }
    }

    /// Whether the step can produce a candidate result.
    pub fn extracts(&self) -> bool {
        matches!(
            self,
            PipelineStep::ApiExtraction
                | PipelineStep::SelectorExtraction
                | PipelineStep::GenericHtmlExtraction
                | PipelineStep::AiExtraction
        )
    }

    /// Input payload recorded on the step's entry event.
    pub(crate) fn input(&self, ctx: &RunContext) -> Value {
        match self {
            PipelineStep::DetectBoard => json!({ "url": ctx.listing.url }),
            PipelineStep::FetchHtml => json!({ "url": ctx.url() }),
            _ => json!({
                "url": ctx.url(),
                "board": ctx.board_type().as_str(),
                "has_html": ctx.has_html(),
            }),
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers of a login or signup wall served in place of the posting.
const AUTH_WALL_MARKERS: &[&str] = &[
    "sign in to view",
    "log in to view",
    "login to view",
    "join to view",
    "sign in to see",
    "please log in",
    "please sign in",
    "authwall",
    "uas/login",
];

/// Whether `html` is an authentication wall rather than a posting.
pub fn detect_auth_wall(html: &str) -> bool {
    let lower = html.to_lowercase();
    if AUTH_WALL_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    lower.contains("type=\"password\"") && lower.contains("<form")
}

impl<S: PipelineStore + 'static> Orchestrator<S> {
    pub(super) async fn run_step(
        &self,
        step: PipelineStep,
        ctx: &mut RunContext,
    ) -> Result<StepOutput> {
        match step {
            PipelineStep::DetectBoard => Ok(self.detect_board(ctx)),
            PipelineStep::FetchHtml => self.fetch_html(ctx).await,
            PipelineStep::ApiExtraction => Ok(self.api_extraction(ctx).await),
            PipelineStep::SelectorExtraction => Ok(self.selector_extraction(ctx).await),
            PipelineStep::LimitedSource => Ok(self.limited_source(ctx)),
            PipelineStep::GenericHtmlExtraction => Ok(self.generic_extraction(ctx)),
            PipelineStep::AiExtraction => Ok(self.ai_extraction(ctx).await),
        }
    }

    fn detect_board(&self, ctx: &mut RunContext) -> StepOutput {
        match detect_board(&ctx.listing.url) {
            Ok(info) => {
                debug!(board = %info.board, url = %info.normalized_url, "Board detected");
                let detail = json!({
                    "board": info.board.as_str(),
                    "normalized_url": info.normalized_url,
                    "company_slug": info.company_slug,
                    "posting_id": info.posting_id,
                });
                ctx.board = Some(info);
                StepOutput::Proceed { detail }
            }
            Err(e) => StepOutput::hard_failure(FailureKind::Permanent, e.to_string()),
        }
    }

    /// Cache first; a miss fetches and writes through.
    async fn fetch_html(&self, ctx: &mut RunContext) -> Result<StepOutput> {
        let url = ctx.url().to_string();
        let listing_id = ctx.listing.id;

        if let Some(entry) = self.cache.lookup(listing_id, &url).await? {
            let detail = json!({
                "source": "cache",
                "content_hash": entry.content_hash,
                "bytes": entry.raw_html.len(),
            });
            ctx.attempt.http_status = entry.http_status.or(ctx.attempt.http_status);
            ctx.raw_html = Some(entry.raw_html);
            ctx.cleaned_html = entry.cleaned_html;
            ctx.fetch_mode = Some(FetchMode::Cached);
            return Ok(StepOutput::Proceed { detail });
        }

        let fetched = match timeout(
            self.config.html_fetch_timeout,
            self.html_fetcher.fetch_html(&url),
        )
        .await
        {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                ctx.attempt.http_status = e.http_status();
                warn!(url = %url, error = %e, "HTML fetch failed");
                return Ok(StepOutput::soft_failure(failure_kind(&e), e.to_string()));
            }
            Err(_) => {
                return Ok(StepOutput::soft_failure(
                    FailureKind::Timeout,
                    format!(
                        "HTML fetch timed out after {}s",
                        self.config.html_fetch_timeout.as_secs()
                    ),
                ));
            }
        };

        let write = self
            .cache
            .store(listing_id, &url, ctx.board_type(), &fetched)
            .await?;

        ctx.attempt.http_status = Some(fetched.status);
        ctx.fetch_mode = Some(fetched.mode);
        ctx.raw_html = Some(write.entry.raw_html);
        ctx.cleaned_html = write.entry.cleaned_html;

        Ok(StepOutput::Proceed {
            detail: json!({
                "source": "fetch",
                "status": fetched.status,
                "final_url": fetched.final_url,
                "content_hash": write.entry.content_hash,
                "created": write.created,
            }),
        })
    }

    async fn api_extraction(&self, ctx: &mut RunContext) -> StepOutput {
        let fetcher = match self.fetchers.lookup(ctx.board_type()).await {
            FetcherLookup::Available(fetcher) => fetcher,
            FetcherLookup::Disabled { provider } => {
                return StepOutput::skipped(format!("{provider} API fetcher disabled"));
            }
            FetcherLookup::Unsupported => {
                return StepOutput::skipped("no public API for this board");
            }
        };

        let url = ctx.url().to_string();
        let (posting_id, company_slug) = match &ctx.board {
            Some(info) => (info.posting_id.clone(), info.company_slug.clone()),
            None => (None, None),
        };

        let result = match timeout(
            self.config.api_timeout,
            fetcher.fetch(&url, posting_id.as_deref(), company_slug.as_deref()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                return StepOutput::soft_failure(
                    FailureKind::Timeout,
                    format!(
                        "{} API timed out after {}s",
                        fetcher.provider(),
                        self.config.api_timeout.as_secs()
                    ),
                );
            }
        };

        if ctx.attempt.http_status.is_none() {
            ctx.attempt.http_status = result.http_status;
        }

        let Some(mut data) = result.data else {
            return StepOutput::soft_failure(
                result.failure_kind.unwrap_or(FailureKind::Permanent),
                result
                    .error
                    .unwrap_or_else(|| format!("{} API returned no data", result.provider)),
            );
        };

        if let Some(backfiller) = &self.backfiller {
            match timeout(self.config.ai_timeout, backfiller.backfill(data.clone())).await {
                Ok(filled) => data = filled,
                Err(_) => warn!(provider = result.provider, "Backfill timed out, keeping API data"),
            }
        }

        StepOutput::Candidate(
            Candidate::new(data, result.confidence, ExtractionMethod::Api)
                .with_provider(result.provider),
        )
    }

    async fn selector_extraction(&self, ctx: &mut RunContext) -> StepOutput {
        let Some(html) = ctx.raw_html.as_deref().filter(|h| !h.trim().is_empty()) else {
            return StepOutput::skipped("no HTML available");
        };

        let board = ctx.board_type();
        let extraction = self.extractors.for_board(board).extract(html);

        let entry = HtmlScrapingLogEntry::new(
            ctx.attempt.id,
            ctx.listing.id,
            ctx.url(),
            ctx.host(),
            board,
            extraction.field_results,
        );
        debug!(
            board = %board,
            extracted = entry.fields_extracted,
            attempted = entry.fields_attempted,
            "Selector pass finished"
        );
        self.events.record_scraping_log(&entry).await;

        StepOutput::Candidate(
            Candidate::new(extraction.data, extraction.confidence, ExtractionMethod::Selector)
                .with_provider(board.as_str()),
        )
    }

    fn limited_source(&self, ctx: &mut RunContext) -> StepOutput {
        if !ctx.board_type().is_access_limited() {
            return StepOutput::skipped("not an access-limited host");
        }

        let host = ctx.host().to_string();
        match ctx.raw_html.as_deref() {
            Some(html) if !html.trim().is_empty() && !detect_auth_wall(html) => {
                StepOutput::Proceed {
                    detail: json!({ "host": host, "auth_wall": false }),
                }
            }
            Some(html) if !html.trim().is_empty() => {
                info!(host = %host, "Authentication wall detected");
                StepOutput::hard_failure(
                    FailureKind::AccessLimited,
                    format!("{host} requires authentication to view this posting"),
                )
            }
            _ => StepOutput::hard_failure(
                FailureKind::AccessLimited,
                format!("no public HTML available from {host}"),
            ),
        }
    }

    fn generic_extraction(&self, ctx: &mut RunContext) -> StepOutput {
        let Some(html) = ctx.raw_html.as_deref().filter(|h| !h.trim().is_empty()) else {
            return StepOutput::skipped("no HTML available");
        };

        match extract_generic(html) {
            Some(extraction) => StepOutput::Candidate(
                Candidate::new(extraction.data, extraction.confidence, ExtractionMethod::GenericHtml)
                    .with_provider(extraction.source.as_str()),
            ),
            None => StepOutput::soft_failure(FailureKind::LowConfidence, "no job data found in page"),
        }
    }

    /// Last resort. The whole provider chain shares one wall-clock bound.
    async fn ai_extraction(&self, ctx: &mut RunContext) -> StepOutput {
        if self.ai.chain().is_empty() {
            return StepOutput::skipped("no LLM providers configured");
        }
        if !ctx.has_html() {
            return StepOutput::skipped("no HTML available");
        }

        let url = ctx.url().to_string();
        let text = ctx.page_text();

        match timeout(self.config.ai_timeout, self.ai.extract(&url, &text)).await {
            Ok(AiAttempt::Usable(candidate)) | Ok(AiAttempt::BelowFloor(candidate)) => {
                StepOutput::Candidate(candidate)
            }
            Ok(AiAttempt::Failed { errors }) => {
                StepOutput::soft_failure(FailureKind::Transient, errors.join("; "))
            }
            Err(_) => {
                warn!(url = %url, timeout_secs = self.config.ai_timeout.as_secs(), "AI extraction timed out");
                StepOutput::soft_failure(
                    FailureKind::Timeout,
                    format!(
                        "AI extraction exceeded {}s",
                        self.config.ai_timeout.as_secs()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_names() {
        let names: Vec<_> = PipelineStep::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "detect_board",
                "fetch_html",
                "api_extraction",
                "selector_extraction",
                "limited_source",
                "generic_html_extraction",
                "ai_extraction",
            ]
        );
        assert!(PipelineStep::AiExtraction.extracts());
        assert!(!PipelineStep::LimitedSource.extracts());
    }

    #[test]
    fn test_auth_wall_detection() {
        assert!(detect_auth_wall(crate::testing::fixtures::LOGIN_WALL_PAGE));
        assert!(detect_auth_wall("<div>Join to view the full posting</div>"));
        assert!(!detect_auth_wall(crate::testing::fixtures::GREENHOUSE_PAGE));
    }
}
