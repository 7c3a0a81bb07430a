//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::store::{
    AttemptStore, EventStore, HtmlCacheStore, ListingStore, ScrapingLogStore,
};
use crate::types::{
    attempt::{Attempt, AttemptStatus},
    cache::CachedHtmlEntry,
    event::{EventStatus, ExtractionEvent, HtmlScrapingLogEntry},
    listing::{Listing, ListingUpdate},
};

/// In-memory storage for listings, attempts, cached HTML, events and logs.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart. The cache uniqueness key is enforced the
/// same way the database constraint would.
pub struct MemoryStore {
    listings: RwLock<HashMap<Uuid, Listing>>,
    attempts: RwLock<HashMap<Uuid, Attempt>>,
    cache: RwLock<Vec<CachedHtmlEntry>>,
    events: RwLock<Vec<ExtractionEvent>>,
    scraping_logs: RwLock<Vec<HtmlScrapingLogEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
            cache: RwLock::new(Vec::new()),
            events: RwLock::new(Vec::new()),
            scraping_logs: RwLock::new(Vec::new()),
        }
    }

    /// Seed a listing.
    pub fn add_listing(&self, listing: Listing) {
        self.listings.write().unwrap().insert(listing.id, listing);
    }

    /// Snapshot of a listing.
    pub fn listing(&self, id: Uuid) -> Option<Listing> {
        self.listings.read().unwrap().get(&id).cloned()
    }

    /// All attempts for a listing, oldest first.
    pub fn attempts_for_listing(&self, listing_id: Uuid) -> Vec<Attempt> {
        let mut attempts: Vec<Attempt> = self
            .attempts
            .read()
            .unwrap()
            .values()
            .filter(|a| a.listing_id == listing_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| (a.started_at, a.id));
        attempts
    }

    /// Seed or overwrite an attempt without status checks.
    pub fn put_attempt(&self, attempt: Attempt) {
        self.attempts.write().unwrap().insert(attempt.id, attempt);
    }

    /// Event types recorded for an attempt, in order.
    pub fn event_types(&self, attempt_id: Uuid) -> Vec<String> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.attempt_id == attempt_id)
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Get the number of cached HTML rows.
    pub fn cache_entry_count(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.listings.write().unwrap().clear();
        self.attempts.write().unwrap().clear();
        self.cache.write().unwrap().clear();
        self.events.write().unwrap().clear();
        self.scraping_logs.write().unwrap().clear();
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        Ok(self.listings.read().unwrap().get(&id).cloned())
    }

    async fn update_listing(&self, id: Uuid, update: &ListingUpdate) -> Result<()> {
        let mut listings = self.listings.write().unwrap();
        let listing = listings
            .get_mut(&id)
            .ok_or(PipelineError::ListingNotFound(id))?;
        listing.apply(update);
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<()> {
        self.attempts
            .write()
            .unwrap()
            .insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
        Ok(self.attempts.read().unwrap().get(&id).cloned())
    }

    async fn latest_attempt_for_listing(&self, listing_id: Uuid) -> Result<Option<Attempt>> {
        Ok(self
            .attempts
            .read()
            .unwrap()
            .values()
            .filter(|a| a.listing_id == listing_id)
            .max_by_key(|a| (a.started_at, a.id))
            .cloned())
    }

    async fn update_attempt_if_status(
        &self,
        attempt: &Attempt,
        expected: AttemptStatus,
    ) -> Result<bool> {
        let mut attempts = self.attempts.write().unwrap();
        let stored = attempts
            .get_mut(&attempt.id)
            .ok_or(PipelineError::AttemptNotFound(attempt.id))?;

        if stored.status != expected {
            return Ok(false);
        }
        *stored = attempt.clone();
        Ok(true)
    }

    async fn find_stale_attempts(
        &self,
        statuses: &[AttemptStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<Attempt>> {
        let mut stale: Vec<Attempt> = self
            .attempts
            .read()
            .unwrap()
            .values()
            .filter(|a| statuses.contains(&a.status) && a.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|a| a.updated_at);
        Ok(stale)
    }
}

#[async_trait]
impl HtmlCacheStore for MemoryStore {
    async fn insert_cache_entry(&self, entry: &CachedHtmlEntry) -> Result<(CachedHtmlEntry, bool)> {
        let mut cache = self.cache.write().unwrap();
        if let Some(existing) = cache.iter().find(|e| e.same_key(entry)) {
            return Ok((existing.clone(), false));
        }
        cache.push(entry.clone());
        Ok((entry.clone(), true))
    }

    async fn find_cache_entry(
        &self,
        listing_id: Uuid,
        url: &str,
        content_hash: &str,
    ) -> Result<Option<CachedHtmlEntry>> {
        Ok(self
            .cache
            .read()
            .unwrap()
            .iter()
            .find(|e| e.listing_id == listing_id && e.url == url && e.content_hash == content_hash)
            .cloned())
    }

    async fn latest_valid_cache_entry(
        &self,
        listing_id: Uuid,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedHtmlEntry>> {
        Ok(self
            .cache
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.listing_id == listing_id && e.url == url && e.is_valid_at(now))
            .max_by_key(|e| e.fetched_at)
            .cloned())
    }

    async fn set_cache_valid_until(&self, id: Uuid, valid_until: DateTime<Utc>) -> Result<()> {
        let mut cache = self.cache.write().unwrap();
        let entry = cache
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PipelineError::Storage(format!("cache entry not found: {id}").into()))?;
        entry.valid_until = valid_until;
        Ok(())
    }

    async fn expire_cache_entries(
        &self,
        listing_id: Uuid,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut expired = 0;
        for entry in self.cache.write().unwrap().iter_mut() {
            if entry.listing_id == listing_id && entry.url == url && entry.is_valid_at(now) {
                entry.valid_until = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn purge_expired_cache_entries(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut cache = self.cache.write().unwrap();
        let before = cache.len();
        cache.retain(|e| e.is_valid_at(now));
        Ok(before - cache.len())
    }

    async fn count_cache_entries(&self, listing_id: Uuid, url: &str) -> Result<usize> {
        Ok(self
            .cache
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.listing_id == listing_id && e.url == url)
            .count())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: &ExtractionEvent) -> Result<()> {
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }

    async fn finish_event(
        &self,
        id: Uuid,
        status: EventStatus,
        output: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut events = self.events.write().unwrap();
        match events.iter_mut().find(|e| e.id == id) {
            Some(event) if event.is_open() => {
                event.status = status;
                event.output_payload = Some(output);
                event.finished_at = Some(finished_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn events_for_attempt(&self, attempt_id: Uuid) -> Result<Vec<ExtractionEvent>> {
        Ok(self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.attempt_id == attempt_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScrapingLogStore for MemoryStore {
    async fn insert_scraping_log(&self, entry: &HtmlScrapingLogEntry) -> Result<()> {
        self.scraping_logs.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn scraping_logs_for_domain(&self, domain: &str) -> Result<Vec<HtmlScrapingLogEntry>> {
        Ok(self
            .scraping_logs
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.domain == domain)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::board::BoardType;
    use crate::types::event::FieldResult;
    use indexmap::IndexMap;

    #[tokio::test]
    async fn test_compare_and_set_attempt_update() {
        let store = MemoryStore::new();
        let attempt = Attempt::new(Uuid::new_v4());
        store.insert_attempt(&attempt).await.unwrap();

        let fetching = attempt.clone().with_status(AttemptStatus::Fetching);
        assert!(store
            .update_attempt_if_status(&fetching, AttemptStatus::Pending)
            .await
            .unwrap());

        // Second writer expecting the old status loses
        let failed = attempt.clone().with_status(AttemptStatus::Failed);
        assert!(!store
            .update_attempt_if_status(&failed, AttemptStatus::Pending)
            .await
            .unwrap());

        let stored = store.get_attempt(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Fetching);
    }

    #[tokio::test]
    async fn test_update_unknown_listing_fails() {
        let store = MemoryStore::new();
        let result = store
            .update_listing(Uuid::new_v4(), &ListingUpdate::default())
            .await;
        assert!(matches!(result, Err(PipelineError::ListingNotFound(_))));
    }

    #[tokio::test]
    async fn test_extend_unknown_cache_entry_fails() {
        let store = MemoryStore::new();
        let result = store.set_cache_valid_until(Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(result, Err(PipelineError::Storage(_))));
    }

    #[tokio::test]
    async fn test_finish_event_only_once() {
        let store = MemoryStore::new();
        let event = ExtractionEvent::started(Uuid::new_v4(), "fetch_html", serde_json::json!({}));
        store.insert_event(&event).await.unwrap();

        let now = Utc::now();
        assert!(store
            .finish_event(event.id, EventStatus::Success, serde_json::json!({}), now)
            .await
            .unwrap());
        assert!(!store
            .finish_event(event.id, EventStatus::Failed, serde_json::json!({}), now)
            .await
            .unwrap());
        assert!(store.open_events_for_attempt(event.attempt_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_domain_success_rate() {
        let store = MemoryStore::new();
        for extracted in [true, false] {
            let mut fields = IndexMap::new();
            fields.insert(
                "title".to_string(),
                FieldResult {
                    success: extracted,
                    selector: None,
                },
            );
            let entry = HtmlScrapingLogEntry::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "https://careers.acme.com/1",
                "careers.acme.com",
                BoardType::Unknown,
                fields,
            );
            store.insert_scraping_log(&entry).await.unwrap();
        }

        let rate = store.domain_success_rate("careers.acme.com").await.unwrap();
        assert_eq!(rate, Some(0.5));
        assert_eq!(store.domain_success_rate("other.com").await.unwrap(), None);
    }
}
