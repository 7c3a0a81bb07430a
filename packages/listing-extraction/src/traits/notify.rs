//! Operational notification collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Kind of operational alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// An abandoned attempt was reclaimed by the sweep
    StuckAttempt,
    /// An error or panic escaped a step
    UnexpectedError,
}

/// Structured alert sent to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub attempt_id: Uuid,
    pub listing_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Receives alerts. Delivery failures are the notifier's problem; the
/// pipeline never waits on or reacts to them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: Alert);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: Alert) {
        tracing::warn!(
            kind = ?alert.kind,
            attempt_id = %alert.attempt_id,
            listing_id = %alert.listing_id,
            details = %alert.details,
            "{}",
            alert.message
        );
    }
}
