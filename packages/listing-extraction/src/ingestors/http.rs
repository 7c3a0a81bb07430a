//! HTTP HTML fetcher.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::fetchers::request_error;
use crate::traits::html::{FetchedHtml, HtmlFetcher};
use crate::types::cache::FetchMode;

/// Browser-like User-Agent; several boards serve a stripped page to bots.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

/// Fetches static HTML over HTTP. No JavaScript execution.
#[derive(Debug, Clone)]
pub struct HttpHtmlFetcher {
    client: reqwest::Client,
}

impl HttpHtmlFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HtmlFetcher for HttpHtmlFetcher {
    async fn fetch_html(&self, url: &str) -> FetchResult<FetchedHtml> {
        debug!(url = %url, "HTML fetch starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTML request failed");
            request_error(e, url)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| request_error(e, url))?;

        debug!(url = %url, final_url = %final_url, bytes = html.len(), "HTML fetch complete");
        Ok(FetchedHtml::new(final_url, html)
            .with_status(status.as_u16())
            .with_mode(FetchMode::Static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_html_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/1"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><h1>Engineer</h1></html>"))
            .mount(&server)
            .await;

        let fetcher = HttpHtmlFetcher::new(Duration::from_secs(5)).unwrap();
        let fetched = fetcher
            .fetch_html(&format!("{}/jobs/1", server.uri()))
            .await
            .unwrap();

        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.mode, FetchMode::Static);
        assert!(fetched.html.contains("Engineer"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = HttpHtmlFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch_html(&server.uri()).await.unwrap_err();
        assert_eq!(err.http_status(), Some(403));
    }
}
