//! Storage traits for the pipeline's persisted state.
//!
//! The storage layer is split into focused traits:
//! - `ListingStore`: the application-owned listing (read URL, write fields)
//! - `AttemptStore`: attempt rows with compare-and-set status updates
//! - `HtmlCacheStore`: content-addressable HTML cache
//! - `EventStore`: per-step extraction events
//! - `ScrapingLogStore`: field-level selector logs
//! - `PipelineStore`: composite trait combining all of them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    attempt::{Attempt, AttemptStatus},
    cache::CachedHtmlEntry,
    event::{EventStatus, ExtractionEvent, HtmlScrapingLogEntry, ScrapingStatus},
    listing::{Listing, ListingUpdate},
};

/// Access to the listings this pipeline fills in.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>>;

    /// Write the non-`None` fields of `update` onto the listing.
    async fn update_listing(&self, id: Uuid, update: &ListingUpdate) -> Result<()>;
}

/// Attempt rows.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()>;

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>>;

    /// Most recently started attempt for a listing.
    async fn latest_attempt_for_listing(&self, listing_id: Uuid) -> Result<Option<Attempt>>;

    /// Persist `attempt` only if the stored status still equals `expected`.
    ///
    /// Returns `false` when another writer moved the attempt first.
    async fn update_attempt_if_status(
        &self,
        attempt: &Attempt,
        expected: AttemptStatus,
    ) -> Result<bool>;

    /// Attempts in one of `statuses` whose `updated_at` is before `older_than`.
    async fn find_stale_attempts(
        &self,
        statuses: &[AttemptStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Attempt>>;
}

/// Content-addressable HTML cache rows.
#[async_trait]
pub trait HtmlCacheStore: Send + Sync {
    /// Insert unless a row with the same (listing, url, content_hash) exists.
    ///
    /// Returns the stored row and whether this call inserted it.
    async fn insert_cache_entry(&self, entry: &CachedHtmlEntry) -> Result<(CachedHtmlEntry, bool)>;

    async fn find_cache_entry(
        &self,
        listing_id: Uuid,
        url: &str,
        content_hash: &str,
    ) -> Result<Option<CachedHtmlEntry>>;

    /// Freshest entry for (listing, url) still valid at `now`.
    async fn latest_valid_cache_entry(
        &self,
        listing_id: Uuid,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedHtmlEntry>>;

    async fn set_cache_valid_until(&self, id: Uuid, valid_until: DateTime<Utc>) -> Result<()>;

    /// Expire every still-valid entry for (listing, url). Returns the count.
    async fn expire_cache_entries(
        &self,
        listing_id: Uuid,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Delete entries expired before `now`. Returns the count.
    async fn purge_expired_cache_entries(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Number of rows for (listing, url), expired or not.
    async fn count_cache_entries(&self, listing_id: Uuid, url: &str) -> Result<usize>;
}

/// Per-step extraction events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &ExtractionEvent) -> Result<()>;

    /// Close an open event. Returns `false` if it was already finished.
    async fn finish_event(
        &self,
        id: Uuid,
        status: EventStatus,
        output: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Events for an attempt, oldest first.
    async fn events_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<ExtractionEvent>>;

    /// Events still in `started`.
    async fn open_events_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<ExtractionEvent>> {
        Ok(self
            .events_for_attempt(attempt_id)
            .await?
            .into_iter()
            .filter(|e| e.is_open())
            .collect())
    }
}

/// Field-level selector scraping logs.
#[async_trait]
pub trait ScrapingLogStore: Send + Sync {
    async fn insert_scraping_log(&self, entry: &HtmlScrapingLogEntry) -> Result<()>;

    async fn scraping_logs_for_domain(&self, domain: &str) -> Result<Vec<HtmlScrapingLogEntry>>;

    /// Share of selector runs on `domain` that ended in `success`.
    async fn domain_success_rate(&self, domain: &str) -> Result<Option<f32>> {
        let logs = self.scraping_logs_for_domain(domain).await?;
        if logs.is_empty() {
            return Ok(None);
        }
        let successes = logs
            .iter()
            .filter(|l| l.status == ScrapingStatus::Success)
            .count();
        Ok(Some(successes as f32 / logs.len() as f32))
    }
}

/// Composite storage trait used by the orchestrator.
pub trait PipelineStore:
    ListingStore + AttemptStore + HtmlCacheStore + EventStore + ScrapingLogStore
{
}

// Blanket implementation: anything implementing all parts is a PipelineStore
impl<T> PipelineStore for T where
    T: ListingStore + AttemptStore + HtmlCacheStore + EventStore + ScrapingLogStore
{
}
