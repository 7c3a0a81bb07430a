//! HTML fetch collaborator.
//!
//! The concrete fetch mechanism (plain HTTP, headless browser, proxy pool)
//! lives outside the pipeline; the pipeline only needs raw HTML back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchResult;
use crate::types::cache::FetchMode;

/// HTML returned by a fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedHtml {
    pub html: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub mode: FetchMode,
}

impl FetchedHtml {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            final_url: url.into(),
            status: 200,
            mode: FetchMode::Static,
        }
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Fetches raw HTML for a URL.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> FetchResult<FetchedHtml>;
}
