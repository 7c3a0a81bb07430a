//! Attempt record - one row per extraction run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an attempt.
///
/// `pending → fetching → extracting → {completed | failed | manual}`, then
/// `failed → {retrying | dead_letter}` by the external scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[default]
    Pending,
    Fetching,
    Extracting,
    Completed,
    Failed,
    Retrying,
    DeadLetter,
    Manual,
}

impl AttemptStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [AttemptStatus; 8] = [
        AttemptStatus::Pending,
        AttemptStatus::Fetching,
        AttemptStatus::Extracting,
        AttemptStatus::Completed,
        AttemptStatus::Failed,
        AttemptStatus::Retrying,
        AttemptStatus::DeadLetter,
        AttemptStatus::Manual,
    ];

    /// Statuses a live worker passes through. An attempt sitting in one of
    /// these past the stuck threshold is presumed abandoned.
    pub const IN_FLIGHT: [AttemptStatus; 3] = [
        AttemptStatus::Pending,
        AttemptStatus::Fetching,
        AttemptStatus::Extracting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Fetching => "fetching",
            AttemptStatus::Extracting => "extracting",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Retrying => "retrying",
            AttemptStatus::DeadLetter => "dead_letter",
            AttemptStatus::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Completed
                | AttemptStatus::Retrying
                | AttemptStatus::DeadLetter
                | AttemptStatus::Manual
        )
    }

    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    /// Forward-only transition table.
    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        use AttemptStatus::*;

        match (self, next) {
            (Pending, Fetching | Extracting | Failed | Manual) => true,
            (Fetching, Extracting | Failed | Manual) => true,
            (Extracting, Completed | Failed | Manual) => true,
            (Failed, Retrying | DeadLetter | Manual) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an accepted result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Api,
    Selector,
    GenericHtml,
    Ai,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Api => "api",
            ExtractionMethod::Selector => "selector",
            ExtractionMethod::GenericHtml => "generic_html",
            ExtractionMethod::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Api, Self::Selector, Self::GenericHtml, Self::Ai]
            .into_iter()
            .find(|m| m.as_str() == s)
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction run against one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last time the lifecycle helper touched this row (staleness clock)
    pub updated_at: DateTime<Utc>,
    pub extraction_method: Option<ExtractionMethod>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub confidence_score: Option<f32>,
    pub http_status: Option<u16>,
    pub retry_count: i32,
    pub failed_step: Option<String>,
    pub error_message: Option<String>,
}

impl Attempt {
    /// Create a pending attempt for a listing.
    pub fn new(listing_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            listing_id,
            status: AttemptStatus::Pending,
            started_at: now,
            finished_at: None,
            updated_at: now,
            extraction_method: None,
            provider: None,
            model: None,
            confidence_score: None,
            http_status: None,
            retry_count: 0,
            failed_step: None,
            error_message: None,
        }
    }

    /// Carry the retry counter over from a previous attempt.
    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Override the start/update timestamps.
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self.updated_at = at;
        self
    }

    pub fn with_status(mut self, status: AttemptStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the attempt has been untouched for longer than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.status.is_in_flight() && now - self.updated_at > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_transitions() {
        use AttemptStatus::*;

        assert!(Pending.can_transition_to(Fetching));
        assert!(Fetching.can_transition_to(Extracting));
        assert!(Extracting.can_transition_to(Completed));
        assert!(Failed.can_transition_to(Retrying));
        assert!(Failed.can_transition_to(DeadLetter));

        assert!(!Extracting.can_transition_to(Fetching));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Manual.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in AttemptStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in AttemptStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in AttemptStatus::ALL {
            assert_eq!(AttemptStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let attempt = Attempt::new(Uuid::new_v4())
            .with_started_at(now - chrono::Duration::minutes(11))
            .with_status(AttemptStatus::Fetching);

        assert!(attempt.is_stale(now, chrono::Duration::minutes(10)));
        assert!(!attempt.is_stale(now, chrono::Duration::minutes(15)));

        let done = attempt.clone().with_status(AttemptStatus::Completed);
        assert!(!done.is_stale(now, chrono::Duration::minutes(10)));
    }
}
