//! Content-addressable HTML cache.
//!
//! Rows are keyed by (listing, normalized URL, content hash). Writing the
//! same content twice never creates a second row; it extends the existing
//! row's validity instead. Different content for the same URL becomes a
//! new dated row. Concurrent writers rely on the store's uniqueness
//! constraint, not on in-process locking.

mod clean;

pub use clean::clean_html;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::{html::FetchedHtml, store::HtmlCacheStore};
use crate::types::{board::BoardType, cache::CachedHtmlEntry};

/// Result of a cache write.
#[derive(Debug, Clone)]
pub struct CacheWrite {
    pub entry: CachedHtmlEntry,
    /// `false` when identical content was already cached
    pub created: bool,
}

/// HTML cache service over an [`HtmlCacheStore`].
pub struct HtmlCache<S: HtmlCacheStore> {
    store: Arc<S>,
    ttl: chrono::Duration,
}

impl<S: HtmlCacheStore> HtmlCache<S> {
    pub fn new(store: Arc<S>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Find-or-create a row for freshly fetched HTML.
    pub async fn store(
        &self,
        listing_id: Uuid,
        url: &str,
        board: BoardType,
        fetched: &FetchedHtml,
    ) -> Result<CacheWrite> {
        self.store_at(listing_id, url, board, fetched, Utc::now())
            .await
    }

    /// [`HtmlCache::store`] with an explicit clock.
    pub async fn store_at(
        &self,
        listing_id: Uuid,
        url: &str,
        board: BoardType,
        fetched: &FetchedHtml,
        now: DateTime<Utc>,
    ) -> Result<CacheWrite> {
        let entry = CachedHtmlEntry::new(listing_id, url, fetched.html.clone(), self.ttl)
            .with_cleaned_html(clean_html(board, &fetched.html))
            .with_board(board)
            .with_fetch_mode(fetched.mode)
            .with_http_status(Some(fetched.status))
            .with_fetched_at(now, self.ttl);

        let (mut stored, created) = self.store.insert_cache_entry(&entry).await?;

        if created {
            info!(
                listing_id = %listing_id,
                url = %url,
                content_hash = %stored.content_hash,
                "Cached new HTML"
            );
        } else {
            let valid_until = now + self.ttl;
            self.store
                .set_cache_valid_until(stored.id, valid_until)
                .await?;
            stored.valid_until = valid_until;
            debug!(
                listing_id = %listing_id,
                url = %url,
                content_hash = %stored.content_hash,
                "Identical HTML already cached, extended validity"
            );
        }

        Ok(CacheWrite {
            entry: stored,
            created,
        })
    }

    /// Freshest non-expired entry for (listing, url).
    pub async fn lookup(&self, listing_id: Uuid, url: &str) -> Result<Option<CachedHtmlEntry>> {
        self.lookup_at(listing_id, url, Utc::now()).await
    }

    pub async fn lookup_at(
        &self,
        listing_id: Uuid,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedHtmlEntry>> {
        let entry = self
            .store
            .latest_valid_cache_entry(listing_id, url, now)
            .await?;

        match &entry {
            Some(e) => debug!(listing_id = %listing_id, url = %url, entry_id = %e.id, "Cache hit"),
            None => debug!(listing_id = %listing_id, url = %url, "Cache miss"),
        }

        Ok(entry)
    }

    /// Expire every valid entry for (listing, url).
    pub async fn invalidate(&self, listing_id: Uuid, url: &str) -> Result<usize> {
        let expired = self
            .store
            .expire_cache_entries(listing_id, url, Utc::now())
            .await?;
        info!(listing_id = %listing_id, url = %url, expired, "Invalidated cached HTML");
        Ok(expired)
    }

    /// Delete rows that expired before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.store.purge_expired_cache_entries(now).await?;
        if purged > 0 {
            info!(purged, "Purged expired HTML cache entries");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    const URL: &str = "https://boards.greenhouse.io/acme/jobs/1";

    fn cache(store: Arc<MemoryStore>) -> HtmlCache<MemoryStore> {
        HtmlCache::new(store, chrono::Duration::days(30))
    }

    #[tokio::test]
    async fn test_identical_content_is_stored_once() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let listing_id = Uuid::new_v4();
        let fetched = FetchedHtml::new(URL, "<html><body><h1>Engineer</h1></body></html>");

        let first = cache
            .store(listing_id, URL, BoardType::Greenhouse, &fetched)
            .await
            .unwrap();
        let second = cache
            .store(listing_id, URL, BoardType::Greenhouse, &fetched)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(store.count_cache_entries(listing_id, URL).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_extends_validity() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let listing_id = Uuid::new_v4();
        let fetched = FetchedHtml::new(URL, "<html><body>v1</body></html>");
        let earlier = Utc::now() - chrono::Duration::days(20);

        let first = cache
            .store_at(listing_id, URL, BoardType::Unknown, &fetched, earlier)
            .await
            .unwrap();
        let later = Utc::now();
        let second = cache
            .store_at(listing_id, URL, BoardType::Unknown, &fetched, later)
            .await
            .unwrap();

        assert!(second.entry.valid_until > first.entry.valid_until);
        let found = cache
            .lookup_at(listing_id, URL, later + chrono::Duration::days(15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.entry.id);
    }

    #[tokio::test]
    async fn test_new_content_creates_dated_entry_and_lookup_prefers_freshest() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let listing_id = Uuid::new_v4();
        let now = Utc::now();

        cache
            .store_at(
                listing_id,
                URL,
                BoardType::Unknown,
                &FetchedHtml::new(URL, "<html><body>old</body></html>"),
                now - chrono::Duration::days(2),
            )
            .await
            .unwrap();
        let newer = cache
            .store_at(
                listing_id,
                URL,
                BoardType::Unknown,
                &FetchedHtml::new(URL, "<html><body>new</body></html>"),
                now,
            )
            .await
            .unwrap();

        assert_eq!(store.count_cache_entries(listing_id, URL).await.unwrap(), 2);
        let found = cache.lookup_at(listing_id, URL, now).await.unwrap().unwrap();
        assert_eq!(found.id, newer.entry.id);
        assert!(found.preferred_html().contains("new"));
    }

    #[tokio::test]
    async fn test_invalidate_and_purge() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let listing_id = Uuid::new_v4();
        let fetched = FetchedHtml::new(URL, "<html><body>x</body></html>");

        cache
            .store(listing_id, URL, BoardType::Unknown, &fetched)
            .await
            .unwrap();
        assert_eq!(cache.invalidate(listing_id, URL).await.unwrap(), 1);
        assert!(cache.lookup(listing_id, URL).await.unwrap().is_none());

        let purged = cache
            .purge_expired(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.count_cache_entries(listing_id, URL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(store.clone());
        let listing_id = Uuid::new_v4();
        let fetched = FetchedHtml::new(URL, "<html><body>x</body></html>");

        cache
            .store_at(
                listing_id,
                URL,
                BoardType::Unknown,
                &fetched,
                Utc::now() - chrono::Duration::days(31),
            )
            .await
            .unwrap();
        assert!(cache.lookup(listing_id, URL).await.unwrap().is_none());
    }
}
