//! Board classification types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed classification of the host serving a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    /// Greenhouse (boards.greenhouse.io, job-boards.greenhouse.io, `gh_jid` embeds)
    Greenhouse,
    /// Lever (jobs.lever.co)
    Lever,
    /// Ashby (jobs.ashbyhq.com)
    Ashby,
    /// Workday (*.myworkdayjobs.com) - structured, but no public posting API
    Workday,
    /// Hosts that gate postings behind a login (LinkedIn, Indeed, ...)
    AccessLimited,
    #[default]
    Unknown,
}

impl BoardType {
    pub const ALL: [BoardType; 6] = [
        BoardType::Greenhouse,
        BoardType::Lever,
        BoardType::Ashby,
        BoardType::Workday,
        BoardType::AccessLimited,
        BoardType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardType::Greenhouse => "greenhouse",
            BoardType::Lever => "lever",
            BoardType::Ashby => "ashby",
            BoardType::Workday => "workday",
            BoardType::AccessLimited => "access_limited",
            BoardType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }

    /// Applicant-tracking systems with a predictable page structure.
    pub fn is_structured_ats(&self) -> bool {
        matches!(
            self,
            BoardType::Greenhouse | BoardType::Lever | BoardType::Ashby | BoardType::Workday
        )
    }

    pub fn is_access_limited(&self) -> bool {
        matches!(self, BoardType::AccessLimited)
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub board: BoardType,
    /// Normalized (and, where known, canonical) URL
    pub normalized_url: String,
    /// Lowercased host of the normalized URL
    pub host: String,
    pub company_slug: Option<String>,
    pub posting_id: Option<String>,
}

impl BoardInfo {
    /// Whether both identifiers an API fetcher needs are present.
    pub fn has_identifiers(&self) -> bool {
        self.company_slug.is_some() && self.posting_id.is_some()
    }
}
