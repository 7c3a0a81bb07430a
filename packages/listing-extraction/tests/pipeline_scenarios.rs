//! End-to-end runs of the extraction waterfall against in-memory storage.
//!
//! External collaborators are faked: ATS APIs with wiremock, HTML with
//! `MockHtmlFetcher`, LLMs with `MockLlmProvider`.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_extraction::fetchers::{ApiClient, GreenhouseFetcher};
use listing_extraction::ingestors::MockHtmlFetcher;
use listing_extraction::testing::fixtures::{ai_payload, BARE_PAGE, GREENHOUSE_PAGE};
use listing_extraction::{
    AttemptStatus, AttemptStore, EventStatus, EventStore, ExtractionMethod, FetchMode,
    FetcherRegistry, Listing, LlmProvider, MemoryStore, MockLlmProvider, Orchestrator,
    PipelineConfig, PipelineStep, StaticFlags,
};

const GREENHOUSE_URL: &str = "https://job-boards.greenhouse.io/acme/jobs/4012345?utm_source=x";
const GREENHOUSE_CANONICAL: &str = "https://boards.greenhouse.io/acme/jobs/4012345";
const CAREERS_URL: &str = "https://careers.example.org/openings/42";

/// Helper to seed a listing.
fn seed(store: &MemoryStore, url: &str) -> Uuid {
    let listing = Listing::new(url);
    let id = listing.id;
    store.add_listing(listing);
    id
}

/// Registry with no API fetchers, so runs go straight to HTML.
fn no_api() -> FetcherRegistry {
    FetcherRegistry::new(Arc::new(StaticFlags::all_enabled()))
}

fn greenhouse_api(server: &MockServer) -> FetcherRegistry {
    no_api().register(Arc::new(
        GreenhouseFetcher::new(ApiClient::new(Duration::from_secs(5))).with_base_url(server.uri()),
    ))
}

async fn mount_greenhouse_posting(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/boards/acme/jobs/4012345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4012345,
            "title": "Senior Backend Engineer",
            "company_name": "Acme",
            "location": {"name": "Remote - US"},
            "content": "&lt;p&gt;We build developer tools.&lt;/p&gt;&lt;h3&gt;Requirements&lt;/h3&gt;&lt;ul&gt;&lt;li&gt;Rust&lt;/li&gt;&lt;/ul&gt;",
            "pay_input_ranges": [
                {"min_cents": 15000000, "max_cents": 19000000, "currency_type": "USD", "title": "Annual base"}
            ]
        })))
        .mount(server)
        .await;
}

fn llm(provider: &MockLlmProvider) -> Vec<Arc<dyn LlmProvider>> {
    vec![Arc::new(provider.clone())]
}

#[tokio::test]
async fn test_greenhouse_api_result_short_circuits() {
    let server = MockServer::start().await;
    mount_greenhouse_posting(&server).await;

    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, GREENHOUSE_URL);
    let html = MockHtmlFetcher::new().with_page(GREENHOUSE_CANONICAL, GREENHOUSE_PAGE);
    let ai = MockLlmProvider::new("openai");

    let orchestrator = Orchestrator::new(
        store.clone(),
        PipelineConfig::default().with_backfill(false),
        Arc::new(html.clone()),
    )
    .with_fetchers(greenhouse_api(&server))
    .with_llm_providers(llm(&ai));

    let report = orchestrator.run_extraction(listing_id).await.unwrap();

    assert_eq!(report.status, AttemptStatus::Completed);
    assert_eq!(report.extraction_method, Some(ExtractionMethod::Api));
    assert_eq!(report.provider.as_deref(), Some("greenhouse"));
    assert_eq!(report.confidence, Some(0.9));
    assert_eq!(html.calls(), vec![GREENHOUSE_CANONICAL.to_string()]);
    assert_eq!(ai.call_count(), 0);

    assert_eq!(
        store.event_types(report.attempt_id),
        vec!["detect_board", "fetch_html", "api_extraction", "run_completed"]
    );

    let listing = store.listing(listing_id).unwrap();
    assert_eq!(listing.title.as_deref(), Some("Senior Backend Engineer"));
    assert_eq!(listing.company_name.as_deref(), Some("Acme"));
    assert_eq!(listing.salary_min, Some(150_000.0));
    assert_eq!(listing.salary_max, Some(190_000.0));
    assert_eq!(listing.salary_currency.as_deref(), Some("USD"));

    let attempt = store.get_attempt(report.attempt_id).await.unwrap().unwrap();
    assert!(attempt.finished_at.is_some());
    assert_eq!(attempt.http_status, Some(200));
}

#[tokio::test]
async fn test_api_failure_falls_through_to_selectors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, GREENHOUSE_URL);
    let html = MockHtmlFetcher::new().with_page(GREENHOUSE_CANONICAL, GREENHOUSE_PAGE);

    let orchestrator = Orchestrator::new(store.clone(), PipelineConfig::default(), Arc::new(html))
        .with_fetchers(greenhouse_api(&server));

    let report = orchestrator.run_extraction(listing_id).await.unwrap();

    assert_eq!(report.status, AttemptStatus::Completed);
    assert_eq!(report.extraction_method, Some(ExtractionMethod::Selector));
    assert_eq!(report.step_status(PipelineStep::ApiExtraction), Some(EventStatus::Failed));
    assert_eq!(report.step_status(PipelineStep::GenericHtmlExtraction), None);

    let events = store.events_for_attempt(report.attempt_id).await.unwrap();
    let api = events.iter().find(|e| e.event_type == "api_extraction").unwrap();
    assert_eq!(api.output_payload.as_ref().unwrap()["error_kind"], "permanent");
}

#[tokio::test(start_paused = true)]
async fn test_ai_timeout_fails_attempt_at_ai_step() {
    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, CAREERS_URL);
    let html = MockHtmlFetcher::new().with_page(CAREERS_URL, BARE_PAGE);
    let ai = MockLlmProvider::new("openai")
        .with_json_response(
            ai_payload(Some("Backend Engineer"), Some("Example"), Some("Too late to matter.")),
            Some(0.95),
        )
        .with_delay(Duration::from_secs(200));

    let orchestrator = Orchestrator::new(store.clone(), PipelineConfig::default(), Arc::new(html))
        .with_fetchers(no_api())
        .with_llm_providers(llm(&ai));

    let report = orchestrator.run_extraction(listing_id).await.unwrap();

    assert_eq!(report.status, AttemptStatus::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("ai_extraction"));
    assert!(report.error_message.as_deref().unwrap().contains("120s"));
    assert_eq!(ai.call_count(), 1);

    let events = store.events_for_attempt(report.attempt_id).await.unwrap();
    let ai_event = events.iter().find(|e| e.event_type == "ai_extraction").unwrap();
    assert_eq!(ai_event.status, EventStatus::Failed);
    assert_eq!(ai_event.output_payload.as_ref().unwrap()["error_kind"], "timeout");
    assert!(store
        .open_events_for_attempt(report.attempt_id)
        .await
        .unwrap()
        .is_empty());

    let listing = store.listing(listing_id).unwrap();
    assert_ne!(listing.title.as_deref(), Some("Backend Engineer"));
}

#[tokio::test]
async fn test_low_confidence_ai_result_is_partially_persisted() {
    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, CAREERS_URL);
    let html = MockHtmlFetcher::new().with_page(CAREERS_URL, BARE_PAGE);
    let ai = MockLlmProvider::new("openai")
        .with_json_response(ai_payload(Some("Backend Engineer"), Some("Example"), None), Some(0.3));

    let orchestrator = Orchestrator::new(store.clone(), PipelineConfig::default(), Arc::new(html))
        .with_fetchers(no_api())
        .with_llm_providers(llm(&ai));

    let report = orchestrator.run_extraction(listing_id).await.unwrap();

    assert_eq!(report.status, AttemptStatus::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("ai_extraction"));
    assert!(report.error_message.as_deref().unwrap().contains("below threshold"));
    assert_eq!(report.confidence, Some(0.3));
    assert!(report.written_fields.contains(&"title"));
    assert!(report.written_fields.contains(&"company_name"));

    let listing = store.listing(listing_id).unwrap();
    assert_eq!(listing.title.as_deref(), Some("Backend Engineer"));
    assert_eq!(listing.company_name.as_deref(), Some("Example"));
    assert!(listing.salary_min.is_none());

    let events = store.events_for_attempt(report.attempt_id).await.unwrap();
    let ai_event = events.iter().find(|e| e.event_type == "ai_extraction").unwrap();
    let output = ai_event.output_payload.as_ref().unwrap();
    assert_eq!(output["error_kind"], "low_confidence");
    assert_eq!(output["accepted"], false);
}

#[tokio::test]
async fn test_second_run_reads_cache() {
    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, CAREERS_URL);
    let html = MockHtmlFetcher::new().with_page(CAREERS_URL, BARE_PAGE);

    let orchestrator = Orchestrator::new(
        store.clone(),
        PipelineConfig::default(),
        Arc::new(html.clone()),
    )
    .with_fetchers(no_api());

    let first = orchestrator.run_extraction(listing_id).await.unwrap();
    let second = orchestrator.run_extraction(listing_id).await.unwrap();

    assert_eq!(first.fetch_mode, Some(FetchMode::Static));
    assert_eq!(second.fetch_mode, Some(FetchMode::Cached));
    assert_eq!(html.call_count(), 1);
    assert_eq!(store.cache_entry_count(), 1);
    assert_eq!(store.attempts_for_listing(listing_id).len(), 2);
}

#[tokio::test]
async fn test_retry_budget_ends_in_dead_letter() {
    let store = Arc::new(MemoryStore::new());
    let listing_id = seed(&store, CAREERS_URL);
    let html = MockHtmlFetcher::new().with_status_error(CAREERS_URL, 503);

    let orchestrator = Orchestrator::new(
        store.clone(),
        PipelineConfig::default().with_max_retries(2),
        Arc::new(html),
    )
    .with_fetchers(no_api());

    let first = orchestrator.run_extraction(listing_id).await.unwrap();
    assert_eq!(first.failed_step.as_deref(), Some("fetch_html"));
    let mut attempt = store.get_attempt(first.attempt_id).await.unwrap().unwrap();
    assert_eq!(attempt.http_status, Some(503));
    assert_eq!(
        orchestrator.schedule_retry(&mut attempt).await.unwrap(),
        AttemptStatus::Retrying
    );

    let second = orchestrator.run_extraction(listing_id).await.unwrap();
    let mut attempt = store.get_attempt(second.attempt_id).await.unwrap().unwrap();
    assert_eq!(attempt.retry_count, 2);
    assert_eq!(
        orchestrator.schedule_retry(&mut attempt).await.unwrap(),
        AttemptStatus::DeadLetter
    );
}

#[tokio::test]
async fn test_missing_listing_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator =
        Orchestrator::new(store, PipelineConfig::default(), Arc::new(MockHtmlFetcher::new()));

    let err = orchestrator.run_extraction(Uuid::new_v4()).await.unwrap_err();
    assert!(err.to_string().contains("listing not found"));
}
