//! Board detection and canonical URL forms.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::normalize::{normalize_generic, query_value};
use crate::error::FetchResult;
use crate::types::board::{BoardInfo, BoardType};

fn lever_like_id() -> &'static Regex {
    static ID: OnceLock<Regex> = OnceLock::new();
    ID.get_or_init(|| Regex::new(r"^[0-9a-fA-F][0-9a-fA-F-]{7,}$").expect("static regex"))
}

fn trailing_digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"(\d{5,})$").expect("static regex"))
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Query-supplied slugs are only placed into a canonical path when they
/// need no escaping.
fn is_plain_slug(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Classification before canonicalization.
struct Detected {
    board: BoardType,
    company_slug: Option<String>,
    posting_id: Option<String>,
    canonical: Option<String>,
}

impl Detected {
    fn plain(board: BoardType) -> Self {
        Self {
            board,
            company_slug: None,
            posting_id: None,
            canonical: None,
        }
    }
}

fn is_access_limited_host(host: &str) -> bool {
    let bare = host.trim_start_matches("www.");
    bare == "linkedin.com"
        || bare.ends_with(".linkedin.com")
        || bare == "indeed.com"
        || bare.ends_with(".indeed.com")
        || bare.starts_with("glassdoor.")
        || bare.contains(".glassdoor.")
        || bare == "wellfound.com"
        || bare == "angel.co"
}

fn detect_greenhouse(url: &Url, host: &str) -> Option<Detected> {
    let canonical_host = if host.contains(".eu.") {
        "job-boards.eu.greenhouse.io"
    } else {
        "boards.greenhouse.io"
    };

    if host.ends_with("greenhouse.io") {
        let segs = segments(url);
        // /embed/job_app?for=slug&token=id
        if segs.first().map(String::as_str) == Some("embed") {
            let slug = query_value(url, "for").filter(|s| is_plain_slug(s));
            let id = query_value(url, "token").filter(|t| is_numeric(t));
            let canonical = match (&slug, &id) {
                (Some(s), Some(i)) => Some(format!("https://{canonical_host}/{s}/jobs/{i}")),
                _ => None,
            };
            return Some(Detected {
                board: BoardType::Greenhouse,
                company_slug: slug,
                posting_id: id,
                canonical,
            });
        }

        let slug = segs.first().cloned();
        let id = match segs.as_slice() {
            [_, jobs, id, ..] if jobs == "jobs" && is_numeric(id) => Some(id.clone()),
            _ => query_value(url, "gh_jid").filter(|t| is_numeric(t)),
        };
        let canonical = match (&slug, &id) {
            (Some(s), Some(i)) => Some(format!("https://{canonical_host}/{s}/jobs/{i}")),
            _ => None,
        };
        return Some(Detected {
            board: BoardType::Greenhouse,
            company_slug: slug,
            posting_id: id,
            canonical,
        });
    }

    // Greenhouse embedded on a company careers page
    query_value(url, "gh_jid")
        .filter(|t| is_numeric(t))
        .map(|id| Detected {
            board: BoardType::Greenhouse,
            company_slug: None,
            posting_id: Some(id),
            canonical: None,
        })
}

/// Lever and Ashby share the `/{slug}/{uuid}[/apply]` shape.
fn detect_slug_uuid(url: &Url, host: &str, board: BoardType, suffixes: &[&str]) -> Detected {
    let segs = segments(url);
    let slug = segs.first().cloned();
    let id = segs
        .get(1)
        .filter(|id| lever_like_id().is_match(id))
        .cloned();

    let extra_ok = match segs.get(2) {
        None => true,
        Some(s) => suffixes.contains(&s.as_str()) && segs.len() == 3,
    };

    let canonical = match (&slug, &id) {
        (Some(s), Some(i)) if extra_ok => Some(format!("https://{host}/{s}/{i}")),
        _ => None,
    };

    Detected {
        board,
        company_slug: slug,
        posting_id: id,
        canonical,
    }
}

fn detect_workday(url: &Url, host: &str) -> Detected {
    let slug = host.split('.').next().map(str::to_string);
    let id = segments(url)
        .last()
        .and_then(|last| last.rsplit('_').next().map(str::to_string))
        .filter(|id| id.chars().any(|c| c.is_ascii_digit()));

    Detected {
        board: BoardType::Workday,
        company_slug: slug,
        posting_id: id,
        canonical: None,
    }
}

fn detect_access_limited(url: &Url, host: &str) -> Detected {
    let bare = host.trim_start_matches("www.");

    if bare == "linkedin.com" || bare.ends_with(".linkedin.com") {
        let segs = segments(url);
        let from_path = match segs.as_slice() {
            [jobs, view, slug, ..] if jobs == "jobs" && view == "view" => trailing_digits()
                .captures(slug)
                .map(|c| c[1].to_string()),
            _ => None,
        };
        let id = from_path.or_else(|| query_value(url, "currentJobId").filter(|v| is_numeric(v)));
        let canonical = id
            .as_ref()
            .map(|i| format!("https://www.linkedin.com/jobs/view/{i}"));
        return Detected {
            board: BoardType::AccessLimited,
            company_slug: None,
            posting_id: id,
            canonical,
        };
    }

    if bare == "indeed.com" || bare.ends_with(".indeed.com") {
        let id = query_value(url, "jk").or_else(|| query_value(url, "vjk"));
        let canonical = id.as_ref().and_then(|i| {
            let mut canonical = Url::parse(&format!("https://{host}/viewjob")).ok()?;
            canonical.query_pairs_mut().append_pair("jk", i);
            Some(canonical.to_string())
        });
        return Detected {
            board: BoardType::AccessLimited,
            company_slug: None,
            posting_id: id,
            canonical,
        };
    }

    Detected::plain(BoardType::AccessLimited)
}

fn classify(url: &Url) -> Detected {
    let host = url.host_str().unwrap_or_default().to_string();

    if let Some(detected) = detect_greenhouse(url, &host) {
        return detected;
    }
    if host == "jobs.lever.co" || host == "jobs.eu.lever.co" {
        return detect_slug_uuid(url, &host, BoardType::Lever, &["apply"]);
    }
    if host == "jobs.ashbyhq.com" {
        return detect_slug_uuid(url, &host, BoardType::Ashby, &["application"]);
    }
    if let Some(id) = query_value(url, "ashby_jid") {
        return Detected {
            board: BoardType::Ashby,
            company_slug: None,
            posting_id: Some(id),
            canonical: None,
        };
    }
    if host.ends_with(".myworkdayjobs.com") || host.ends_with(".myworkdaysite.com") {
        return detect_workday(url, &host);
    }
    if is_access_limited_host(&host) {
        return detect_access_limited(url, &host);
    }

    Detected::plain(BoardType::Unknown)
}

/// Classify a URL and compute its normalized form.
///
/// Missing slug or posting id is not an error; it only limits what the
/// API step can do.
pub fn detect_board(raw: &str) -> FetchResult<BoardInfo> {
    let generic = normalize_generic(raw)?;
    let detected = classify(&generic);

    let normalized_url = match detected.canonical {
        Some(canonical) => normalize_generic(&canonical)?.to_string(),
        None => generic.to_string(),
    };
    let host = generic.host_str().unwrap_or_default().to_string();

    Ok(BoardInfo {
        board: detected.board,
        normalized_url,
        host,
        company_slug: detected.company_slug,
        posting_id: detected.posting_id,
    })
}

/// Normalized (canonical where known) form of a URL.
///
/// Idempotent: `normalize_url(normalize_url(u)) == normalize_url(u)`.
pub fn normalize_url(raw: &str) -> FetchResult<String> {
    detect_board(raw).map(|info| info.normalized_url)
}
