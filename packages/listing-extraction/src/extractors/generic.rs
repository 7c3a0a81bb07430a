//! Board-agnostic extraction: JSON-LD `JobPosting` first, page heuristics
//! for whatever is still missing.
//!
//! Results built only from heuristics are discounted to 0.8 of the
//! weighted sum.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

use crate::cache::clean_html;
use crate::confidence;
use crate::fetchers::sections::split_sections;
use crate::salary::{self, SalaryInput};
use crate::text::{clean_value, decode_html, html_to_text, unescape_markup};
use crate::types::board::BoardType;
use crate::types::job::{JobData, RemoteType};

/// Discount for results without structured data.
pub const HEURISTIC_FACTOR: f32 = 0.8;

/// Minimum length for page text to count as a description.
const MIN_DESCRIPTION_CHARS: usize = 120;

/// Where the generic result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericSource {
    JsonLd,
    Heuristic,
}

impl GenericSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenericSource::JsonLd => "json_ld",
            GenericSource::Heuristic => "heuristic",
        }
    }
}

/// Output of the generic extractor.
#[derive(Debug, Clone)]
pub struct GenericExtraction {
    pub data: JobData,
    pub confidence: f32,
    pub source: GenericSource,
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

// ============================================================================
// JSON-LD
// ============================================================================

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

/// Find the first `JobPosting` object, descending into arrays and `@graph`.
fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(map) => {
            if is_job_posting(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_job_posting)
        }
        _ => None,
    }
}

fn json_ld_posting(document: &Html) -> Option<Value> {
    let script = selector("script[type='application/ld+json']")?;
    document.select(&script).find_map(|el| {
        let raw = el.text().collect::<String>();
        let parsed: Value = serde_json::from_str(raw.trim()).ok()?;
        find_job_posting(&parsed).cloned()
    })
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => clean_value(&decode_html(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| text_of(Some(v))).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) => text_of(map.get("name")),
        _ => None,
    }
}

/// Long-form text that may be HTML (descriptions often are, entity-escaped).
fn rich_text_of(value: Option<&Value>) -> Option<String> {
    let raw = value?.as_str()?;
    let text = html_to_text(&unescape_markup(raw));
    (!text.trim().is_empty()).then_some(text)
}

fn location_of(value: Option<&Value>) -> Option<String> {
    let places: Vec<&Value> = match value? {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let parts: Vec<String> = places
        .into_iter()
        .filter_map(|place| {
            let address = place.get("address").unwrap_or(place);
            if let Some(s) = address.as_str() {
                return clean_value(s);
            }
            let components: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .filter_map(|k| text_of(address.get(*k)))
                .collect();
            (!components.is_empty()).then(|| components.join(", "))
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join("; "))
}

fn salary_input(value: Option<&Value>) -> Option<SalaryInput<'_>> {
    match value? {
        Value::Number(n) => n.as_f64().map(SalaryInput::Number),
        Value::String(s) => Some(SalaryInput::Text(s.as_str())),
        _ => None,
    }
}

fn apply_base_salary(posting: &Value, data: &mut JobData) {
    let Some(base) = posting.get("baseSalary") else {
        return;
    };
    let currency = base.get("currency").and_then(Value::as_str);
    let value = base.get("value").unwrap_or(base);

    let (min, max) = match value {
        Value::Object(_) => {
            let exact = salary_input(value.get("value"));
            (
                salary_input(value.get("minValue")).or(exact),
                salary_input(value.get("maxValue")).or(exact),
            )
        }
        other => {
            let exact = salary_input(Some(other));
            (exact, exact)
        }
    };
    let unit = value
        .get("unitText")
        .or_else(|| base.get("unitText"))
        .and_then(Value::as_str);

    let validation = salary::normalize(min, max, currency, unit);
    if !validation.valid {
        tracing::debug!(reason = ?validation.reason, "Discarded JSON-LD salary");
    }
    data.salary = validation.into_range();
}

fn from_json_ld(posting: &Value) -> JobData {
    let mut data = JobData::new();

    data.title = text_of(posting.get("title"));
    data.company_name = text_of(posting.get("hiringOrganization"));
    data.description = rich_text_of(posting.get("description"));
    data.location = location_of(posting.get("jobLocation"));
    data.employment_type = text_of(posting.get("employmentType"));
    data.responsibilities = rich_text_of(posting.get("responsibilities"));
    data.requirements = rich_text_of(posting.get("qualifications"))
        .or_else(|| rich_text_of(posting.get("skills")))
        .or_else(|| rich_text_of(posting.get("experienceRequirements")));
    data.benefits = rich_text_of(posting.get("jobBenefits"));
    data.apply_url = text_of(posting.get("url"));

    if let Some(html) = posting.get("description").and_then(Value::as_str) {
        split_sections(&unescape_markup(html)).apply_to(&mut data);
    }

    let location_type = text_of(posting.get("jobLocationType"));
    data.remote_type = if location_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("TELECOMMUTE"))
    {
        RemoteType::Remote
    } else {
        RemoteType::infer(&[data.location.as_deref(), data.title.as_deref()])
    };

    apply_base_salary(posting, &mut data);
    data
}

// ============================================================================
// Heuristics
// ============================================================================

fn title_split_regex() -> &'static Regex {
    static SPLIT: OnceLock<Regex> = OnceLock::new();
    SPLIT.get_or_init(|| {
        Regex::new(r"(?i)^(?:job application for\s+)?(.+?)\s+(?:at|@)\s+(.+)$").expect("static regex")
    })
}

/// Split a page title into (job title, company).
///
/// Handles "Job Application for X at Y", "X at Y", "X - Y" and "X | Y".
pub fn split_page_title(title: &str) -> (Option<String>, Option<String>) {
    let title = title.trim();
    if let Some(caps) = title_split_regex().captures(title) {
        return (clean_value(&caps[1]), clean_value(&caps[2]));
    }
    for sep in [" | ", " - ", " – ", " — "] {
        if let Some((left, right)) = title.split_once(sep) {
            return (clean_value(left), clean_value(right));
        }
    }
    (clean_value(title), None)
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .find_map(|el| el.value().attr("content").and_then(clean_value))
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .find_map(|el| clean_value(&el.text().collect::<Vec<_>>().join(" ")))
}

fn from_heuristics(document: &Html, html: &str) -> JobData {
    let mut data = JobData::new();

    let page_title = first_text(document, "title").map(|t| split_page_title(&t));
    let og_title = meta_content(document, "meta[property='og:title']").map(|t| split_page_title(&t));

    data.title = first_text(document, "h1")
        .or_else(|| og_title.as_ref().and_then(|(t, _)| t.clone()))
        .or_else(|| page_title.as_ref().and_then(|(t, _)| t.clone()));

    data.company_name = meta_content(document, "meta[property='og:site_name']")
        .or_else(|| og_title.as_ref().and_then(|(_, c)| c.clone()))
        .or_else(|| page_title.as_ref().and_then(|(_, c)| c.clone()));

    let main_text = clean_html(BoardType::Unknown, html)
        .map(|cleaned| html_to_text(&cleaned))
        .filter(|text| text.chars().count() >= MIN_DESCRIPTION_CHARS);
    data.description = main_text.or_else(|| {
        meta_content(document, "meta[name='description']")
            .or_else(|| meta_content(document, "meta[property='og:description']"))
            .filter(|d| d.chars().count() >= MIN_DESCRIPTION_CHARS)
    });

    if let Some(sel) = selector("main, article, [role='main'], body") {
        if let Some(el) = document.select(&sel).next() {
            split_sections(&el.inner_html()).apply_to(&mut data);
        }
    }

    data.remote_type = RemoteType::infer(&[data.title.as_deref(), data.description.as_deref()]);
    data
}

/// Extract from arbitrary HTML. `None` when nothing usable was found.
pub fn extract_generic(html: &str) -> Option<GenericExtraction> {
    let document = Html::parse_document(html);
    let heuristic = from_heuristics(&document, html);

    let result = match json_ld_posting(&document) {
        Some(posting) => {
            let mut data = from_json_ld(&posting);
            data.fill_missing_from(&heuristic);
            GenericExtraction {
                confidence: confidence::score(&data),
                data,
                source: GenericSource::JsonLd,
            }
        }
        None => GenericExtraction {
            confidence: confidence::score_scaled(&heuristic, HEURISTIC_FACTOR),
            data: heuristic,
            source: GenericSource::Heuristic,
        },
    };

    if result.data.extracted_fields().is_empty() {
        return None;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_LD_PAGE: &str = r#"
        <html><head>
          <title>Careers</title>
          <script type="application/ld+json">
          {
            "@context": "https://schema.org",
            "@graph": [
              {"@type": "Organization", "name": "Acme"},
              {
                "@type": "JobPosting",
                "title": "Staff Engineer",
                "description": "&lt;p&gt;Lead the platform team.&lt;/p&gt;&lt;h3&gt;Benefits&lt;/h3&gt;&lt;ul&gt;&lt;li&gt;Equity&lt;/li&gt;&lt;/ul&gt;",
                "hiringOrganization": {"@type": "Organization", "name": "Acme"},
                "jobLocation": {"@type": "Place", "address": {"addressLocality": "Denver", "addressRegion": "CO"}},
                "jobLocationType": "TELECOMMUTE",
                "employmentType": ["FULL_TIME"],
                "baseSalary": {
                  "@type": "MonetaryAmount",
                  "currency": "USD",
                  "value": {"@type": "QuantitativeValue", "minValue": 180000, "maxValue": 220000, "unitText": "YEAR"}
                }
              }
            ]
          }
          </script>
        </head><body><p>Apply now</p></body></html>
    "#;

    #[test]
    fn test_json_ld_graph() {
        let result = extract_generic(JSON_LD_PAGE).unwrap();
        assert_eq!(result.source, GenericSource::JsonLd);
        assert_eq!(result.data.title.as_deref(), Some("Staff Engineer"));
        assert_eq!(result.data.company_name.as_deref(), Some("Acme"));
        assert_eq!(result.data.location.as_deref(), Some("Denver, CO"));
        assert_eq!(result.data.remote_type, RemoteType::Remote);
        assert_eq!(result.data.employment_type.as_deref(), Some("FULL_TIME"));
        assert_eq!(result.data.benefits.as_deref(), Some("- Equity"));
        assert!(result
            .data
            .description
            .as_deref()
            .unwrap()
            .starts_with("Lead the platform team."));

        let salary = result.data.salary.unwrap();
        assert_eq!(salary.min, Some(180_000.0));
        assert_eq!(salary.max, Some(220_000.0));
        assert_eq!(salary.currency, "USD");

        // .25 + .25 + .15 + .05 + .05
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn test_hourly_json_ld_salary_is_dropped() {
        let html = r#"<script type="application/ld+json">
            {"@type": "JobPosting", "title": "Barista", "baseSalary": {"currency": "USD",
             "value": {"minValue": 18, "maxValue": 22, "unitText": "HOUR"}}}
            </script>"#;
        let result = extract_generic(html).unwrap();
        assert!(result.data.salary.is_none());
    }

    #[test]
    fn test_heuristics_are_discounted() {
        let description = "We are hiring a support specialist to help customers succeed. ".repeat(4);
        let html = format!(
            r#"<html><head><title>Support Specialist at Globex</title></head>
               <body><main><h1>Support Specialist</h1><p>{description}</p></main></body></html>"#
        );
        let result = extract_generic(&html).unwrap();

        assert_eq!(result.source, GenericSource::Heuristic);
        assert_eq!(result.data.title.as_deref(), Some("Support Specialist"));
        assert_eq!(result.data.company_name.as_deref(), Some("Globex"));
        assert!(result.data.description.is_some());
        // (.25 + .25 + .15) * 0.8
        assert_eq!(result.confidence, 0.52);
    }

    #[test]
    fn test_split_page_title() {
        assert_eq!(
            split_page_title("Job Application for Product Designer at Initech"),
            (Some("Product Designer".into()), Some("Initech".into()))
        );
        assert_eq!(
            split_page_title("Product Designer - Initech"),
            (Some("Product Designer".into()), Some("Initech".into()))
        );
        assert_eq!(split_page_title("Careers"), (Some("Careers".into()), None));
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        assert!(extract_generic("<html><body></body></html>").is_none());
    }
}
