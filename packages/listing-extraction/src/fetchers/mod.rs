//! Structured-ATS API fetchers.
//!
//! One fetcher per provider with a public posting API. Fetchers never
//! raise: every outcome, including missing identifiers and HTTP errors,
//! comes back as an [`ApiFetchResult`] with confidence 0.0 on failure.

pub mod ashby;
pub mod greenhouse;
pub mod lever;
pub mod postprocess;
pub mod sections;

pub use ashby::AshbyFetcher;
pub use greenhouse::GreenhouseFetcher;
pub use lever::LeverFetcher;
pub use postprocess::Backfiller;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::board::detect_board;
use crate::confidence;
use crate::error::{FetchError, FetchResult};
use crate::traits::flags::{api_fetcher_flag, FeatureFlags};
use crate::types::board::BoardType;
use crate::types::job::JobData;
use crate::types::outcome::FailureKind;

/// Confidence reported for a complete API result.
pub const API_CONFIDENCE: f32 = 0.9;

/// Outcome of one API fetch.
#[derive(Debug, Clone)]
pub struct ApiFetchResult {
    pub provider: &'static str,
    pub data: Option<JobData>,
    pub confidence: f32,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub http_status: Option<u16>,
}

impl ApiFetchResult {
    pub fn success(provider: &'static str, data: JobData, http_status: u16) -> Self {
        Self {
            provider,
            confidence: confidence::cap_for_required(&data, API_CONFIDENCE),
            data: Some(data),
            error: None,
            failure_kind: None,
            http_status: Some(http_status),
        }
    }

    pub fn failed(provider: &'static str, error: &FetchError) -> Self {
        Self {
            provider,
            data: None,
            confidence: 0.0,
            error: Some(error.to_string()),
            failure_kind: Some(failure_kind(error)),
            http_status: error.http_status(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

/// How a fetch error is classified for retry purposes.
pub fn failure_kind(error: &FetchError) -> FailureKind {
    match error {
        FetchError::Timeout { .. } => FailureKind::Timeout,
        e if e.is_transient() => FailureKind::Transient,
        _ => FailureKind::Permanent,
    }
}

/// Map a reqwest error onto [`FetchError`].
pub(crate) fn request_error(e: reqwest::Error, url: &str) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http(Box::new(e))
    }
}

/// A successfully parsed posting.
#[derive(Debug, Clone)]
pub struct FetchedPosting {
    pub data: JobData,
    pub http_status: u16,
}

/// Thin JSON GET client shared by the fetchers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> FetchResult<(T, u16)> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok((body, status.as_u16()))
    }
}

/// Resolve identifiers, falling back to the URL shape.
fn resolve_identifiers(
    url: &str,
    job_id: Option<&str>,
    company_slug: Option<&str>,
) -> FetchResult<(String, String)> {
    if let (Some(slug), Some(id)) = (company_slug, job_id) {
        return Ok((slug.to_string(), id.to_string()));
    }

    let detected = detect_board(url).ok();
    let slug = company_slug
        .map(str::to_string)
        .or_else(|| detected.as_ref().and_then(|d| d.company_slug.clone()));
    let id = job_id
        .map(str::to_string)
        .or_else(|| detected.as_ref().and_then(|d| d.posting_id.clone()));

    match (slug, id) {
        (Some(slug), Some(id)) => Ok((slug, id)),
        _ => Err(FetchError::MissingIdentifiers {
            url: url.to_string(),
        }),
    }
}

/// "acme-corp" → "Acme Corp".
pub fn humanize_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A provider with a public posting API.
#[async_trait]
pub trait ApiFetcher: Send + Sync {
    fn board(&self) -> BoardType;

    /// Provider name, also the feature-flag suffix.
    fn provider(&self) -> &'static str;

    /// Fetch and normalize one posting.
    async fn fetch_posting(&self, company_slug: &str, job_id: &str) -> FetchResult<FetchedPosting>;

    /// Fetch a posting by URL. Missing identifiers are resolved from the
    /// URL; if that fails no request is made.
    async fn fetch(
        &self,
        url: &str,
        job_id: Option<&str>,
        company_slug: Option<&str>,
    ) -> ApiFetchResult {
        let (slug, id) = match resolve_identifiers(url, job_id, company_slug) {
            Ok(ids) => ids,
            Err(e) => {
                debug!(provider = self.provider(), url, "No identifiers, skipping API call");
                return ApiFetchResult::failed(self.provider(), &e);
            }
        };

        match self.fetch_posting(&slug, &id).await {
            Ok(posting) => ApiFetchResult::success(self.provider(), posting.data, posting.http_status),
            Err(e) => {
                warn!(provider = self.provider(), slug = %slug, id = %id, error = %e, "API fetch failed");
                ApiFetchResult::failed(self.provider(), &e)
            }
        }
    }
}

/// Result of looking up a fetcher for a board.
pub enum FetcherLookup<'a> {
    Available(&'a dyn ApiFetcher),
    /// A fetcher exists but its feature flag is off
    Disabled { provider: &'static str },
    /// No public API for this board
    Unsupported,
}

/// Board → fetcher, gated by feature flags.
#[derive(Clone)]
pub struct FetcherRegistry {
    fetchers: Vec<Arc<dyn ApiFetcher>>,
    flags: Arc<dyn FeatureFlags>,
}

impl FetcherRegistry {
    pub fn new(flags: Arc<dyn FeatureFlags>) -> Self {
        Self {
            fetchers: Vec::new(),
            flags,
        }
    }

    /// Greenhouse, Lever and Ashby against their public endpoints.
    pub fn with_default_fetchers(flags: Arc<dyn FeatureFlags>, timeout: Duration) -> Self {
        let client = ApiClient::new(timeout);
        Self::new(flags)
            .register(Arc::new(GreenhouseFetcher::new(client.clone())))
            .register(Arc::new(LeverFetcher::new(client.clone())))
            .register(Arc::new(AshbyFetcher::new(client)))
    }

    pub fn register(mut self, fetcher: Arc<dyn ApiFetcher>) -> Self {
        self.fetchers.retain(|f| f.board() != fetcher.board());
        self.fetchers.push(fetcher);
        self
    }

    pub async fn lookup(&self, board: BoardType) -> FetcherLookup<'_> {
        let Some(fetcher) = self.fetchers.iter().find(|f| f.board() == board) else {
            return FetcherLookup::Unsupported;
        };
        if self.flags.is_enabled(&api_fetcher_flag(fetcher.provider())).await {
            FetcherLookup::Available(fetcher.as_ref())
        } else {
            FetcherLookup::Disabled {
                provider: fetcher.provider(),
            }
        }
    }
}
