//! Extraction events and selector scraping logs.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::board::BoardType;

/// Status of a single step event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Started,
    Success,
    Failed,
    Skipped,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Started => "started",
            EventStatus::Success => "success",
            EventStatus::Failed => "failed",
            EventStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Started, Self::Success, Self::Failed, Self::Skipped]
            .into_iter()
            .find(|status| status.as_str() == s)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step log entry owned by one attempt.
///
/// Written once when the step starts and finished exactly once
/// (`started` → `success | failed | skipped`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionEvent {
    pub id: Uuid,
    pub attempt_id: Uuid,
    /// Step name, or `run_completed` for the summary event
    pub event_type: String,
    pub status: EventStatus,
    pub input_payload: serde_json::Value,
    pub output_payload: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExtractionEvent {
    /// Create an open (`started`) event.
    pub fn started(
        attempt_id: Uuid,
        event_type: impl Into<String>,
        input_payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            attempt_id,
            event_type: event_type.into(),
            status: EventStatus::Started,
            input_payload,
            output_payload: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == EventStatus::Started
    }
}

/// Outcome of one field during selector extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResult {
    pub success: bool,
    /// Selector that produced the value
    pub selector: Option<String>,
}

/// Derived status of a scraping log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapingStatus {
    Success,
    Partial,
    Failed,
}

impl ScrapingStatus {
    /// Success at 80% or more of attempted fields, failed at zero.
    pub fn from_rate(rate: f32) -> Self {
        if rate >= 0.8 {
            ScrapingStatus::Success
        } else if rate > 0.0 {
            ScrapingStatus::Partial
        } else {
            ScrapingStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapingStatus::Success => "success",
            ScrapingStatus::Partial => "partial",
            ScrapingStatus::Failed => "failed",
        }
    }
}

/// Field-level record of one selector extraction, for per-domain analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlScrapingLogEntry {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub domain: String,
    pub board: BoardType,
    /// Field name → result, in extraction order
    pub field_results: IndexMap<String, FieldResult>,
    pub fields_attempted: usize,
    pub fields_extracted: usize,
    pub extraction_rate: f32,
    pub status: ScrapingStatus,
    pub created_at: DateTime<Utc>,
}

impl HtmlScrapingLogEntry {
    /// Build an entry, deriving counts, rate and status from `field_results`.
    pub fn new(
        attempt_id: Uuid,
        listing_id: Uuid,
        url: impl Into<String>,
        domain: impl Into<String>,
        board: BoardType,
        field_results: IndexMap<String, FieldResult>,
    ) -> Self {
        let fields_attempted = field_results.len();
        let fields_extracted = field_results.values().filter(|r| r.success).count();
        let extraction_rate = if fields_attempted == 0 {
            0.0
        } else {
            fields_extracted as f32 / fields_attempted as f32
        };

        Self {
            id: Uuid::now_v7(),
            attempt_id,
            listing_id,
            url: url.into(),
            domain: domain.into(),
            board,
            field_results,
            fields_attempted,
            fields_extracted,
            extraction_rate,
            status: ScrapingStatus::from_rate(extraction_rate),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool) -> FieldResult {
        FieldResult {
            success,
            selector: success.then(|| "h1".to_string()),
        }
    }

    #[test]
    fn test_scraping_log_derives_rate_and_status() {
        let mut fields = IndexMap::new();
        fields.insert("title".to_string(), result(true));
        fields.insert("company".to_string(), result(true));
        fields.insert("description".to_string(), result(false));
        fields.insert("location".to_string(), result(false));

        let entry = HtmlScrapingLogEntry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://jobs.lever.co/acme/1",
            "jobs.lever.co",
            BoardType::Lever,
            fields,
        );

        assert_eq!(entry.fields_attempted, 4);
        assert_eq!(entry.fields_extracted, 2);
        assert!((entry.extraction_rate - 0.5).abs() < f32::EPSILON);
        assert_eq!(entry.status, ScrapingStatus::Partial);
    }

    #[test]
    fn test_scraping_status_thresholds() {
        assert_eq!(ScrapingStatus::from_rate(1.0), ScrapingStatus::Success);
        assert_eq!(ScrapingStatus::from_rate(0.8), ScrapingStatus::Success);
        assert_eq!(ScrapingStatus::from_rate(0.1), ScrapingStatus::Partial);
        assert_eq!(ScrapingStatus::from_rate(0.0), ScrapingStatus::Failed);
    }
}
