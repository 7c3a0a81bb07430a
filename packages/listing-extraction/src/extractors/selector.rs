//! Base selector algorithm shared by every board.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};

use super::boards::SelectorTable;
use crate::confidence;
use crate::fetchers::sections::split_sections;
use crate::text::{clean_value, html_to_text};
use crate::types::event::FieldResult;
use crate::types::job::{JobData, JobField, RemoteType};

/// Attributes that carry a cleaner value than the node text.
const VALUE_ATTRIBUTES: &[&str] = &["content", "alt", "aria-label", "title"];

/// Output of a selector pass.
#[derive(Debug, Clone)]
pub struct SelectorExtraction {
    pub data: JobData,
    pub confidence: f32,
    /// Per-field outcome, in table order
    pub field_results: IndexMap<String, FieldResult>,
}

fn is_long_form(field: JobField) -> bool {
    !matches!(
        field,
        JobField::Title | JobField::Company | JobField::Location
    )
}

/// Value of one node: attribute first, then text.
fn node_value(element: ElementRef<'_>, long_form: bool) -> Option<String> {
    for attr in VALUE_ATTRIBUTES {
        if let Some(value) = element.value().attr(attr).and_then(clean_value) {
            return Some(value);
        }
    }

    if long_form {
        let text = html_to_text(&element.inner_html());
        (!text.trim().is_empty()).then_some(text)
    } else {
        clean_value(&element.text().collect::<Vec<_>>().join(" "))
    }
}

/// Walk `selectors` in order; the first matching node with a non-empty
/// value wins. Returns the value and the selector that produced it.
pub fn extract_field(
    document: &Html,
    selectors: &[&'static str],
    long_form: bool,
) -> Option<(String, &'static str)> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        let element = document.select(&selector).next()?;
        node_value(element, long_form).map(|v| (v, *s))
    })
}

/// First matching node's inner HTML, for section splitting.
fn first_inner_html(document: &Html, selectors: &[&'static str]) -> Option<String> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document.select(&selector).next().map(|el| el.inner_html())
    })
}

/// "at Acme" / "Acme logo" → "Acme".
fn tidy_company(value: String) -> String {
    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_prefix("at ")
        .or_else(|| trimmed.strip_prefix("At "))
        .unwrap_or(trimmed);
    let trimmed = trimmed
        .strip_suffix(" logo")
        .or_else(|| trimmed.strip_suffix(" Logo"))
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Run a selector table against an HTML document.
pub fn run_table(table: &SelectorTable, html: &str) -> SelectorExtraction {
    let document = Html::parse_document(html);
    let mut data = JobData::new();
    let mut field_results = IndexMap::new();

    for (field, selectors) in table.fields {
        let found = extract_field(&document, selectors, is_long_form(*field));
        let value = found.as_ref().map(|(v, _)| match field {
            JobField::Company => tidy_company(v.clone()),
            _ => v.clone(),
        });
        data.set_field(*field, value);

        // Fields with no candidates on this board are not attempted
        if !selectors.is_empty() || data.has(*field) {
            field_results.insert(
                field.as_str().to_string(),
                FieldResult {
                    success: data.has(*field),
                    selector: found.map(|(_, s)| s.to_string()),
                },
            );
        }
    }

    data.employment_type = extract_field(&document, table.employment_type, false).map(|(v, _)| v);

    // Long descriptions usually embed requirements/benefits under headings
    if let Some(description_html) = first_inner_html(&document, table.selectors(JobField::Description)) {
        let sections = split_sections(&description_html);
        for field in sections.fields() {
            if !data.has(field) {
                field_results.insert(
                    field.as_str().to_string(),
                    FieldResult {
                        success: true,
                        selector: Some("description section".to_string()),
                    },
                );
            }
        }
        sections.apply_to(&mut data);
    }

    data.remote_type = RemoteType::infer(&[data.location.as_deref(), data.title.as_deref()]);

    let confidence = confidence::score(&data);
    SelectorExtraction {
        data,
        confidence,
        field_results,
    }
}
