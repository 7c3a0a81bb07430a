//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Minimum confidence for a result to be accepted. Fixed for every run.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Configuration for extraction runs and the stuck-attempt sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bound on each API fetcher HTTP call. Default: 30s.
    pub api_timeout: Duration,

    /// Hard wall-clock bound on the whole AI step. Default: 120s.
    pub ai_timeout: Duration,

    /// Bound on the external HTML fetch. Default: 30s.
    pub html_fetch_timeout: Duration,

    /// Validity window of a cache write. Default: 30 days.
    pub cache_ttl: Duration,

    /// Age after which an in-flight attempt is presumed abandoned. Default: 10 min.
    pub stuck_threshold: Duration,

    /// Failures allowed before an attempt is dead-lettered. Default: 3.
    pub max_retries: i32,

    /// AI responses below this confidence are not usable. Default: 0.2.
    pub ai_confidence_floor: f32,

    /// LLM provider names, tried in order.
    pub ai_provider_order: Vec<String>,

    /// Let the AI step backfill compensation/requirements on API results.
    pub backfill_enabled: bool,

    /// Send auth-walled postings to `manual` instead of `failed`.
    pub manual_for_limited_sources: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_timeout: Duration::from_secs(30),
            ai_timeout: Duration::from_secs(120),
            html_fetch_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            stuck_threshold: Duration::from_secs(10 * 60),
            max_retries: 3,
            ai_confidence_floor: 0.2,
            ai_provider_order: vec!["openai".to_string()],
            backfill_enabled: true,
            manual_for_limited_sources: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `LISTING_EXTRACTION_*` environment variables.
    ///
    /// A `.env` file is read first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("LISTING_EXTRACTION_API_TIMEOUT_SECS")? {
            config.api_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("LISTING_EXTRACTION_AI_TIMEOUT_SECS")? {
            config.ai_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("LISTING_EXTRACTION_HTML_TIMEOUT_SECS")? {
            config.html_fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(days) = env_parse::<u64>("LISTING_EXTRACTION_CACHE_TTL_DAYS")? {
            config.cache_ttl = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(mins) = env_parse::<u64>("LISTING_EXTRACTION_STUCK_THRESHOLD_MINS")? {
            config.stuck_threshold = Duration::from_secs(mins * 60);
        }
        if let Some(max) = env_parse::<i32>("LISTING_EXTRACTION_MAX_RETRIES")? {
            config.max_retries = max;
        }
        if let Some(floor) = env_parse::<f32>("LISTING_EXTRACTION_AI_CONFIDENCE_FLOOR")? {
            if !(0.0..=1.0).contains(&floor) {
                return Err(ConfigError::Invalid {
                    key: "LISTING_EXTRACTION_AI_CONFIDENCE_FLOOR".into(),
                    reason: "must be between 0 and 1".into(),
                });
            }
            config.ai_confidence_floor = floor;
        }
        if let Ok(order) = env::var("LISTING_EXTRACTION_AI_PROVIDERS") {
            config.ai_provider_order = order
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(enabled) = env_parse::<bool>("LISTING_EXTRACTION_BACKFILL")? {
            config.backfill_enabled = enabled;
        }
        if let Some(manual) = env_parse::<bool>("LISTING_EXTRACTION_MANUAL_LIMITED")? {
            config.manual_for_limited_sources = manual;
        }

        Ok(config)
    }

    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub fn with_stuck_threshold(mut self, threshold: Duration) -> Self {
        self.stuck_threshold = threshold;
        self
    }

    pub fn with_max_retries(mut self, max: i32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_provider_order(mut self, order: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ai_provider_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_backfill(mut self, enabled: bool) -> Self {
        self.backfill_enabled = enabled;
        self
    }

    pub fn with_manual_for_limited_sources(mut self, manual: bool) -> Self {
        self.manual_for_limited_sources = manual;
        self
    }

    pub fn cache_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cache_ttl).unwrap_or(chrono::Duration::days(30))
    }

    pub fn stuck_threshold_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stuck_threshold).unwrap_or(chrono::Duration::minutes(10))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
