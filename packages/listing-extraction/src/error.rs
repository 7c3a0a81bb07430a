//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Expected failure
//! modes of a step (bad status codes, missing identifiers, low confidence)
//! are values, not errors; only the variants below cross a step boundary.

use thiserror::Error;
use uuid::Uuid;

use crate::types::attempt::AttemptStatus;

/// Errors that abort a pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The listing the run targets does not exist
    #[error("listing not found: {0}")]
    ListingNotFound(Uuid),

    /// The attempt being mutated does not exist
    #[error("attempt not found: {0}")]
    AttemptNotFound(Uuid),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Attempt status would move backwards or sideways
    #[error("invalid attempt transition: {from} -> {to}")]
    InvalidTransition {
        from: AttemptStatus,
        to: AttemptStatus,
    },

    /// A step panicked; the context may be inconsistent
    #[error("step panicked: {step}")]
    StepPanicked { step: String },

    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Wrap any storage backend error.
    pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(e))
    }
}

/// Errors raised while fetching HTML or calling a provider API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Request exceeded its time bound
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Company slug or posting id could not be resolved
    #[error("missing board identifiers for {url}")]
    MissingIdentifiers { url: String },

    /// Response body did not match the expected shape
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a later retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl { .. } | Self::MissingIdentifiers { .. } | Self::Parse(_) => false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment value could not be interpreted
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
