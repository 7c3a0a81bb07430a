//! Job Listing Extraction Pipeline
//!
//! Turns a job-posting URL into structured listing data through a
//! confidence-gated waterfall of strategies, cheapest and most reliable
//! first:
//!
//! 1. Public ATS APIs (Greenhouse, Lever, Ashby)
//! 2. Board-specific CSS selectors
//! 3. Access-limited host handling (LinkedIn, Indeed, Glassdoor, ...)
//! 4. Generic HTML (JSON-LD `JobPosting`, then heuristics)
//! 5. LLM extraction behind a hard timeout
//!
//! The first result with confidence ≥ 0.7 and a title, company and
//! description wins. Raw HTML is cached by content hash, every step is
//! recorded as an event, and each run is tracked as an attempt with a
//! forward-only status machine. A periodic sweep reclaims attempts left
//! in flight by crashed workers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_extraction::{MemoryStore, Orchestrator, PipelineConfig};
//! use listing_extraction::ingestors::HttpHtmlFetcher;
//!
//! let store = Arc::new(MemoryStore::new());
//! let fetcher = Arc::new(HttpHtmlFetcher::new(Duration::from_secs(30))?);
//! let orchestrator = Orchestrator::new(store, PipelineConfig::from_env()?, fetcher)
//!     .with_llm_providers(vec![Arc::new(OpenAiProvider::from_env()?)]);
//!
//! let report = orchestrator.run_extraction(listing_id).await?;
//! ```
//!
//! # Modules
//!
//! - [`board`] - URL normalization and board detection
//! - [`fetchers`] - ATS API fetchers and compensation backfill
//! - [`extractors`] - Selector tables, JSON-LD and heuristics
//! - [`ai`] - LLM extraction and provider chain
//! - [`cache`] - Content-addressable HTML cache
//! - [`lifecycle`] - Attempt state machine and stuck-attempt sweep
//! - [`pipeline`] - Step sequence and orchestrator
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Mock collaborators and fixtures

pub mod ai;
pub mod board;
pub mod cache;
pub mod confidence;
pub mod error;
pub mod events;
pub mod extractors;
pub mod fetchers;
pub mod ingestors;
pub mod lifecycle;
pub mod pipeline;
pub mod salary;
pub mod stores;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ConfigError, FetchError, PipelineError, Result};
pub use traits::{
    flags::{FeatureFlags, StaticFlags},
    html::{FetchedHtml, HtmlFetcher},
    llm::{LlmOptions, LlmProvider, LlmResponse},
    notify::{Alert, AlertKind, LogNotifier, Notifier},
    store::{
        AttemptStore, EventStore, HtmlCacheStore, ListingStore, PipelineStore, ScrapingLogStore,
    },
};
pub use types::{
    attempt::{Attempt, AttemptStatus, ExtractionMethod},
    board::{BoardInfo, BoardType},
    cache::{CachedHtmlEntry, FetchMode},
    config::{PipelineConfig, CONFIDENCE_THRESHOLD},
    event::{EventStatus, ExtractionEvent, FieldResult, HtmlScrapingLogEntry, ScrapingStatus},
    job::{JobData, JobField, RemoteType, SalaryRange},
    listing::{Listing, ListingUpdate},
    outcome::{Candidate, ExtractionOutcome, FailureKind, StepFailure, StepOutput, StepResult},
};

pub use ai::{AiExtractor, OpenAiProvider, ProviderChain};
pub use board::{detect_board, normalize_url};
pub use cache::HtmlCache;
pub use confidence::evaluate;
pub use events::EventRecorder;
pub use fetchers::{ApiFetchResult, ApiFetcher, FetcherRegistry};
pub use lifecycle::{AttemptLifecycle, ReclaimReport, StuckReclaimer};
pub use pipeline::{Orchestrator, PipelineStep, RunReport};
pub use salary::{SalaryValidation, MAX_ANNUAL, MIN_ANNUAL};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Re-export testing utilities
pub use testing::{MockLlmProvider, RecordingNotifier};
