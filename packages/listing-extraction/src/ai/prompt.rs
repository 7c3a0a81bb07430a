//! Prompts for AI extraction and backfill.

/// Page text beyond this many characters is dropped from the prompt.
pub const MAX_PAGE_CHARS: usize = 24_000;

pub const EXTRACT_SYSTEM: &str = r#"You extract structured data from job postings.

Return only what the page states. Leave a field null rather than guessing.

- title: the job title, without company or location
- company_name: the hiring company, not the job board
- description: the full posting text, keeping paragraph breaks
- requirements / responsibilities / benefits / about / culture: the matching sections, verbatim
- remote_type: one of remote, hybrid, on_site, unspecified
- salary_min / salary_max / salary_currency: only if an explicit figure is shown; currency as a 3-letter code
- salary_period: the pay period exactly as written near the figure (e.g. "per year", "per hour")
- confidence: 0.0-1.0, how sure you are this page is a single job posting and the fields are correct"#;

pub const BACKFILL_SYSTEM: &str = r#"You read a job description and pull out two things the structured data is missing.

- requirements: the candidate requirements or qualifications section, verbatim, or null
- salary_min / salary_max / salary_currency / salary_period: only if an explicit figure is written in the text, otherwise null

Never invent values."#;

/// Truncate to `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// User prompt for full extraction.
pub fn format_extract_prompt(url: &str, page_text: &str) -> String {
    format!(
        "URL: {url}\n\nPage content:\n{}",
        truncate_chars(page_text, MAX_PAGE_CHARS)
    )
}

/// User prompt for backfilling an API result.
pub fn format_backfill_prompt(title: Option<&str>, description: &str) -> String {
    format!(
        "Job title: {}\n\nDescription:\n{}",
        title.unwrap_or("(unknown)"),
        truncate_chars(description, MAX_PAGE_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_extract_prompt_contains_url() {
        let prompt = format_extract_prompt("https://acme.com/jobs/1", "Engineer");
        assert!(prompt.starts_with("URL: https://acme.com/jobs/1"));
        assert!(prompt.ends_with("Engineer"));
    }
}
