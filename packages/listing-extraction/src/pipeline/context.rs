//! Per-run state threaded through the steps.

use crate::text::html_to_markdown;
use crate::types::attempt::Attempt;
use crate::types::board::{BoardInfo, BoardType};
use crate::types::cache::FetchMode;
use crate::types::config::CONFIDENCE_THRESHOLD;
use crate::types::job::JobData;
use crate::types::listing::Listing;
use crate::types::outcome::{Candidate, StepFailure};

use super::steps::PipelineStep;

/// Single-owner state of one extraction run.
///
/// Created once per run and passed by `&mut` through the fixed step
/// sequence; never shared between runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub listing: Listing,
    pub attempt: Attempt,
    pub board: Option<BoardInfo>,
    pub raw_html: Option<String>,
    pub cleaned_html: Option<String>,
    pub fetch_mode: Option<FetchMode>,
    /// Fixed acceptance threshold
    pub threshold: f32,
    /// Merged data of every rejected candidate
    pub partial: JobData,
    partial_confidence: Option<f32>,
    pub best_confidence: Option<f32>,
    pub accepted: Option<Candidate>,
    pub last_failure: Option<(PipelineStep, StepFailure)>,
    pub written_fields: Vec<&'static str>,
}

impl RunContext {
    pub fn new(listing: Listing, attempt: Attempt) -> Self {
        Self {
            listing,
            attempt,
            board: None,
            raw_html: None,
            cleaned_html: None,
            fetch_mode: None,
            threshold: CONFIDENCE_THRESHOLD,
            partial: JobData::default(),
            partial_confidence: None,
            best_confidence: None,
            accepted: None,
            last_failure: None,
            written_fields: Vec::new(),
        }
    }

    pub fn board_type(&self) -> BoardType {
        self.board.as_ref().map(|b| b.board).unwrap_or_default()
    }

    /// Normalized URL once the board is detected, the listing URL before.
    pub fn url(&self) -> &str {
        self.board
            .as_ref()
            .map(|b| b.normalized_url.as_str())
            .unwrap_or(&self.listing.url)
    }

    pub fn host(&self) -> &str {
        self.board.as_ref().map(|b| b.host.as_str()).unwrap_or_default()
    }

    pub fn has_html(&self) -> bool {
        self.raw_html.as_deref().is_some_and(|h| !h.trim().is_empty())
    }

    /// Markdown for the AI prompt: the cleaned variant when present.
    pub fn page_text(&self) -> String {
        match (&self.cleaned_html, &self.raw_html) {
            (Some(cleaned), _) => html_to_markdown(cleaned),
            (None, Some(raw)) => html_to_markdown(raw),
            (None, None) => String::new(),
        }
    }

    /// Fold a rejected candidate into [`RunContext::partial`]. Values from
    /// the more confident candidate win; the other only fills gaps.
    pub fn merge_partial(&mut self, data: &JobData, confidence: f32) {
        if self.partial_confidence.map_or(true, |best| confidence >= best) {
            let mut merged = data.clone();
            merged.fill_missing_from(&self.partial);
            self.partial = merged;
            self.partial_confidence = Some(confidence);
        } else {
            self.partial.fill_missing_from(data);
        }
    }

    /// Keep the highest confidence seen so far.
    pub fn observe_confidence(&mut self, confidence: f32) {
        if self.best_confidence.map_or(true, |best| confidence > best) {
            self.best_confidence = Some(confidence);
        }
    }
}
