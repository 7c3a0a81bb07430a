//! Confidence scoring and the acceptance rule.
//!
//! Confidence is a fixed weighted sum over extracted fields. Results
//! missing any of title/company/description are capped just below the
//! acceptance threshold so the waterfall always moves on.

use crate::types::config::CONFIDENCE_THRESHOLD;
use crate::types::job::{JobData, JobField};
use crate::types::outcome::ExtractionOutcome;

/// Ceiling for results missing a required field.
pub const MISSING_REQUIRED_CAP: f32 = 0.69;

/// Weight of a field in the confidence sum. Weights add up to 1.0.
pub fn weight(field: JobField) -> f32 {
    match field {
        JobField::Title => 0.25,
        JobField::Company => 0.25,
        JobField::Description => 0.15,
        JobField::Location => 0.05,
        JobField::Requirements => 0.075,
        JobField::Responsibilities => 0.075,
        JobField::Benefits => 0.05,
        JobField::About => 0.05,
        JobField::Culture => 0.05,
    }
}

/// Round to four decimals so float noise never flips a threshold check.
pub fn round_confidence(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

/// Uncapped weighted sum over the fields present in `data`.
pub fn weighted_sum(data: &JobData) -> f32 {
    round_confidence(data.extracted_fields().into_iter().map(weight).sum())
}

/// Apply the missing-required-field cap to any confidence value.
pub fn cap_for_required(data: &JobData, confidence: f32) -> f32 {
    let confidence = round_confidence(confidence);
    if data.has_required_fields() {
        confidence
    } else {
        confidence.min(MISSING_REQUIRED_CAP)
    }
}

/// Selector-style score: weighted sum, capped when required fields are missing.
pub fn score(data: &JobData) -> f32 {
    cap_for_required(data, weighted_sum(data))
}

/// Score with a discount factor (heuristic-only extraction).
pub fn score_scaled(data: &JobData, factor: f32) -> f32 {
    cap_for_required(data, weighted_sum(data) * factor)
}

/// Acceptance verdict for a candidate result.
///
/// Accepted only when `confidence >= 0.7` and every required field is
/// present. Anything with at least one required field is a partial result.
pub fn evaluate(data: &JobData, confidence: f32) -> ExtractionOutcome {
    let confidence = round_confidence(confidence);

    if confidence >= CONFIDENCE_THRESHOLD && data.has_required_fields() {
        return ExtractionOutcome::Success {
            data: data.clone(),
            confidence,
        };
    }

    if data.has_any_required_field() {
        return ExtractionOutcome::PartialSuccess {
            data: data.clone(),
            confidence,
        };
    }

    ExtractionOutcome::Failure {
        reason: format!(
            "no required fields extracted (confidence {confidence:.2})"
        ),
    }
}
