//! Board-aware HTML cleaning.
//!
//! Picks the posting container for the board when one is known, then
//! strips boilerplate. The cleaned variant feeds the AI prompt; selector
//! and JSON-LD extraction keep working on the raw document.

use scraper::{Html, Selector};

use crate::types::board::BoardType;

/// Posting containers, most specific first.
fn containers(board: BoardType) -> &'static [&'static str] {
    match board {
        BoardType::Greenhouse => &["#app_body", ".job__description", "#content"],
        BoardType::Lever => &[".posting-page", ".content"],
        BoardType::Ashby => &["main", "#root"],
        BoardType::Workday => &[
            "[data-automation-id='jobPostingPage']",
            "[data-automation-id='job-posting-details']",
        ],
        BoardType::AccessLimited => &[
            ".jobs-description",
            ".description__text",
            "#jobDescriptionText",
            ".jobsearch-JobComponent",
        ],
        BoardType::Unknown => &[],
    }
}

/// Content areas worth keeping on any page.
const MAIN_CONTENT: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".job-description",
    ".posting",
];

const BOILERPLATE: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "svg",
    "nav",
    "footer",
    "aside",
    "form",
    ".nav",
    ".navbar",
    ".footer",
    ".sidebar",
    ".menu",
    ".cookie-banner",
    "#cookie-consent",
    ".advertisement",
];

fn select_first_html(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document.select(&selector).next().map(|el| el.html())
    })
}

fn remove_boilerplate(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().html();

    for selector_str in BOILERPLATE {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in fragment.select(&selector) {
                result = result.replace(&element.html(), "");
            }
        }
    }

    result
}

fn has_text(html: &str) -> bool {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .any(|t| !t.trim().is_empty())
}

/// Cleaned variant of `raw_html`, or `None` when cleaning leaves nothing.
pub fn clean_html(board: BoardType, raw_html: &str) -> Option<String> {
    let document = Html::parse_document(raw_html);

    let container = select_first_html(&document, containers(board))
        .or_else(|| select_first_html(&document, MAIN_CONTENT))
        .or_else(|| select_first_html(&document, &["body"]))?;

    let cleaned = remove_boilerplate(&container);
    has_text(&cleaned).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVER_PAGE: &str = r#"
        <html><head><title>Acme - Engineer</title><script>track()</script></head>
        <body>
          <nav>Jobs at Acme</nav>
          <div class="posting-page">
            <div class="posting-headline"><h2>Backend Engineer</h2></div>
            <div class="content"><p>Build things.</p><script>x()</script></div>
          </div>
          <footer>Powered by Lever</footer>
        </body></html>
    "#;

    #[test]
    fn test_board_container_is_preferred() {
        let cleaned = clean_html(BoardType::Lever, LEVER_PAGE).unwrap();
        assert!(cleaned.contains("Backend Engineer"));
        assert!(cleaned.contains("Build things."));
        assert!(!cleaned.contains("Powered by Lever"));
        assert!(!cleaned.contains("Jobs at Acme"));
        assert!(!cleaned.contains("x()"));
    }

    #[test]
    fn test_unknown_board_falls_back_to_body_without_boilerplate() {
        let html = "<html><body><nav>Menu</nav><h1>Data Analyst</h1><footer>(c) Corp</footer></body></html>";
        let cleaned = clean_html(BoardType::Unknown, html).unwrap();
        assert!(cleaned.contains("Data Analyst"));
        assert!(!cleaned.contains("Menu"));
        assert!(!cleaned.contains("(c) Corp"));
    }

    #[test]
    fn test_empty_page_has_no_cleaned_variant() {
        assert!(clean_html(BoardType::Unknown, "<html><body><script>x()</script></body></html>").is_none());
    }
}
