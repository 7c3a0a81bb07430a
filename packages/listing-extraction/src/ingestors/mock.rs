//! Canned-page HTML fetcher.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{FetchError, FetchResult};
use crate::traits::html::{FetchedHtml, HtmlFetcher};

/// Serves pages registered per URL and records every call.
///
/// Unregistered URLs answer with a 404 status error.
#[derive(Clone, Default)]
pub struct MockHtmlFetcher {
    pages: Arc<Mutex<HashMap<String, FetchedHtml>>>,
    failures: Arc<Mutex<HashMap<String, u16>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockHtmlFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), FetchedHtml::new(url, html));
        self
    }

    pub fn with_fetched(self, url: &str, fetched: FetchedHtml) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), fetched);
        self
    }

    /// Answer `url` with an HTTP error status.
    pub fn with_status_error(self, url: &str, status: u16) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), status);
        self
    }

    /// URLs fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HtmlFetcher for MockHtmlFetcher {
    async fn fetch_html(&self, url: &str) -> FetchResult<FetchedHtml> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(status) = self.failures.lock().unwrap().get(url) {
            return Err(FetchError::Status {
                status: *status,
                url: url.to_string(),
            });
        }

        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_and_records() {
        let fetcher = MockHtmlFetcher::new()
            .with_page("https://acme.com/jobs/1", "<h1>Engineer</h1>")
            .with_status_error("https://acme.com/jobs/2", 500);

        assert!(fetcher.fetch_html("https://acme.com/jobs/1").await.is_ok());
        let err = fetcher.fetch_html("https://acme.com/jobs/2").await.unwrap_err();
        assert!(err.is_transient());
        let missing = fetcher.fetch_html("https://acme.com/jobs/3").await.unwrap_err();
        assert_eq!(missing.http_status(), Some(404));
        assert_eq!(fetcher.call_count(), 3);
    }
}
