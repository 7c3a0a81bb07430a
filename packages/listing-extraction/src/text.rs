//! Text helpers shared by the extraction strategies.

use scraper::{ElementRef, Html, Node};
use std::borrow::Cow;
use tracing::debug;

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCKS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "section", "article", "tr",
    "table", "header", "footer", "blockquote", "pre", "dt", "dd",
];

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `Some(collapsed)` unless the text is blank.
pub fn clean_value(text: &str) -> Option<String> {
    let collapsed = collapse_whitespace(text);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Text content of an HTML snippet with entities decoded and markup dropped.
pub fn decode_html(text: &str) -> String {
    Html::parse_fragment(text).root_element().text().collect()
}

/// Markup that arrives entity-escaped (`&lt;p&gt;`) is unescaped once;
/// anything else is returned as is.
pub fn unescape_markup(raw: &str) -> Cow<'_, str> {
    if raw.contains("&lt;") {
        Cow::Owned(decode_html(raw))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Convert HTML to plain text, one block element per line.
///
/// Headings become their own lines, list items are prefixed with "- ".
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    write_children(fragment.root_element(), &mut out);
    tidy_lines(&out)
}

/// Markdown rendering of a page for LLM prompts.
pub fn html_to_markdown(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .build();
    match converter.convert(html) {
        Ok(markdown) => tidy_lines(&markdown),
        Err(e) => {
            debug!(error = %e, "Markdown conversion failed, using plain text");
            html_to_text(html)
        }
    }
}

/// Collapse each line and drop blank ones and bare list markers.
pub(crate) fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty() && l != "-")
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    write_element(el, out);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCKS.contains(&name);
    if block {
        out.push('\n');
    }
    if name == "li" {
        out.push_str("- ");
    }
    write_children(element, out);
    if block {
        out.push('\n');
    }
}
