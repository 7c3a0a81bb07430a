//! Step and extraction result types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::attempt::ExtractionMethod;
use crate::types::job::JobData;

/// A result produced by one extraction strategy, before acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub data: JobData,
    pub confidence: f32,
    pub method: ExtractionMethod,
    /// API provider or LLM provider name
    pub provider: Option<String>,
    pub model: Option<String>,
}

impl Candidate {
    pub fn new(data: JobData, confidence: f32, method: ExtractionMethod) -> Self {
        Self {
            data,
            confidence,
            method,
            provider: None,
            model: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Acceptance verdict for a candidate.
///
/// Callers must handle partial results distinctly from full acceptance.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    /// Passed the threshold with all required fields
    Success { data: JobData, confidence: f32 },
    /// Below the threshold, but carries some useful fields
    PartialSuccess { data: JobData, confidence: f32 },
    /// Nothing usable
    Failure { reason: String },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    pub fn confidence(&self) -> f32 {
        match self {
            ExtractionOutcome::Success { confidence, .. }
            | ExtractionOutcome::PartialSuccess { confidence, .. } => *confidence,
            ExtractionOutcome::Failure { .. } => 0.0,
        }
    }
}

/// Classification of a step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network errors, rate limits, 5xx
    Transient,
    /// Bad input that retrying will not fix
    Permanent,
    /// A hard time bound elapsed
    Timeout,
    /// Confidence below the acceptance threshold
    LowConfidence,
    /// The host requires authentication
    AccessLimited,
    /// Error or panic that escaped a step
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
            FailureKind::Timeout => "timeout",
            FailureKind::LowConfidence => "low_confidence",
            FailureKind::AccessLimited => "access_limited",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// What a step reports back to the orchestrator.
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// The step did its work and the run should move on
    Proceed { detail: serde_json::Value },
    /// The step does not apply to this run
    Skipped { reason: String },
    /// The step produced a result that needs an acceptance verdict
    Candidate(Candidate),
    /// The step failed; `halt` stops the waterfall
    Failed { failure: StepFailure, halt: bool },
}

impl StepOutput {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutput::Skipped {
            reason: reason.into(),
        }
    }

    /// A failure the waterfall recovers from.
    pub fn soft_failure(kind: FailureKind, message: impl Into<String>) -> Self {
        StepOutput::Failed {
            failure: StepFailure::new(kind, message),
            halt: false,
        }
    }

    /// A failure that ends the run.
    pub fn hard_failure(kind: FailureKind, message: impl Into<String>) -> Self {
        StepOutput::Failed {
            failure: StepFailure::new(kind, message),
            halt: true,
        }
    }
}

/// Control-flow verdict of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Continue,
    StopSuccess,
    StopFailure(StepFailure),
}

impl StepResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepResult::Continue => "continue",
            StepResult::StopSuccess => "stop_success",
            StepResult::StopFailure(_) => "stop_failure",
        }
    }
}
