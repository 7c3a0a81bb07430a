//! Cached HTML types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::types::board::BoardType;

/// How the HTML for a run was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP GET, no script execution
    #[default]
    Static,
    /// Rendered by a headless browser upstream
    Rendered,
    /// Served from the HTML cache
    Cached,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Static => "static",
            FetchMode::Rendered => "rendered",
            FetchMode::Cached => "cached",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Static, Self::Rendered, Self::Cached]
            .into_iter()
            .find(|m| m.as_str() == s)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-addressable cache row keyed by (listing, url, content_hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedHtmlEntry {
    pub id: Uuid,
    pub listing_id: Uuid,
    /// Normalized URL
    pub url: String,
    pub raw_html: String,
    /// Board-aware cleaned variant, when cleaning produced something useful
    pub cleaned_html: Option<String>,
    /// SHA-256 hex digest of `raw_html`
    pub content_hash: String,
    pub board: BoardType,
    pub fetch_mode: FetchMode,
    pub http_status: Option<u16>,
    pub fetched_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl CachedHtmlEntry {
    /// Create an entry valid for `ttl` from now.
    pub fn new(
        listing_id: Uuid,
        url: impl Into<String>,
        raw_html: impl Into<String>,
        ttl: chrono::Duration,
    ) -> Self {
        let raw_html = raw_html.into();
        let content_hash = Self::hash_content(&raw_html);
        let now = Utc::now();

        Self {
            id: Uuid::now_v7(),
            listing_id,
            url: url.into(),
            raw_html,
            cleaned_html: None,
            content_hash,
            board: BoardType::Unknown,
            fetch_mode: FetchMode::Static,
            http_status: None,
            fetched_at: now,
            valid_until: now + ttl,
        }
    }

    /// Calculate SHA-256 hash of content.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn with_cleaned_html(mut self, cleaned: Option<String>) -> Self {
        self.cleaned_html = cleaned;
        self
    }

    pub fn with_board(mut self, board: BoardType) -> Self {
        self.board = board;
        self
    }

    pub fn with_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    /// Override fetch and expiry timestamps.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        self.fetched_at = fetched_at;
        self.valid_until = fetched_at + ttl;
        self
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }

    /// Cleaned HTML when present, raw HTML otherwise.
    pub fn preferred_html(&self) -> &str {
        self.cleaned_html.as_deref().unwrap_or(&self.raw_html)
    }

    /// Whether this entry has the same uniqueness key as `other`.
    pub fn same_key(&self, other: &CachedHtmlEntry) -> bool {
        self.listing_id == other.listing_id
            && self.url == other.url
            && self.content_hash == other.content_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = CachedHtmlEntry::hash_content("<html>same</html>");
        let b = CachedHtmlEntry::hash_content("<html>same</html>");
        let c = CachedHtmlEntry::hash_content("<html>other</html>");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_preferred_html() {
        let entry = CachedHtmlEntry::new(
            Uuid::new_v4(),
            "https://example.com/job",
            "<html>raw</html>",
            chrono::Duration::days(30),
        );
        assert_eq!(entry.preferred_html(), "<html>raw</html>");

        let cleaned = entry.with_cleaned_html(Some("<main>clean</main>".into()));
        assert_eq!(cleaned.preferred_html(), "<main>clean</main>");
    }

    #[test]
    fn test_validity_window() {
        let fetched = Utc::now() - chrono::Duration::days(31);
        let entry = CachedHtmlEntry::new(Uuid::new_v4(), "u", "x", chrono::Duration::days(30))
            .with_fetched_at(fetched, chrono::Duration::days(30));

        assert!(!entry.is_valid_at(Utc::now()));
        assert!(entry.is_valid_at(fetched + chrono::Duration::days(29)));
    }
}
