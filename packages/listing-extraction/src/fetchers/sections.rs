//! Content-section heuristics.
//!
//! Job descriptions are a sequence of headed sections ("What you'll do",
//! "Requirements", "Benefits", ...). Headings are classified by keyword and
//! the section bodies are mapped onto the normalized fields; anything that
//! does not match becomes a custom section.

use scraper::{ElementRef, Html, Node};

use crate::text::{clean_value, collapse_whitespace, tidy_lines, write_element};
use crate::types::job::{CustomSection, JobData, JobField};

/// Longer bold runs are emphasis, not headings.
const MAX_HEADING_CHARS: usize = 120;

/// What a section heading maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Requirements,
    Responsibilities,
    Benefits,
    About,
    Culture,
    Custom,
}

impl SectionKind {
    fn field(&self) -> Option<JobField> {
        match self {
            SectionKind::Requirements => Some(JobField::Requirements),
            SectionKind::Responsibilities => Some(JobField::Responsibilities),
            SectionKind::Benefits => Some(JobField::Benefits),
            SectionKind::About => Some(JobField::About),
            SectionKind::Culture => Some(JobField::Culture),
            SectionKind::Custom => None,
        }
    }
}

// Checked in order; responsibilities first so "about the role" is not "about us".
const RESPONSIBILITIES: &[&str] = &[
    "responsibilit",
    "what you'll do",
    "what you will do",
    "what you’ll do",
    "the role",
    "your role",
    "in this role",
    "day to day",
    "day-to-day",
    "duties",
    "your impact",
    "your mission",
];
const REQUIREMENTS: &[&str] = &[
    "requirement",
    "qualification",
    "what you bring",
    "what you'll bring",
    "what you’ll bring",
    "what you'll need",
    "what we're looking for",
    "what we’re looking for",
    "who you are",
    "must have",
    "nice to have",
    "skills",
    "experience",
    "about you",
];
const BENEFITS: &[&str] = &[
    "benefit",
    "perks",
    "what we offer",
    "we offer",
    "compensation",
    "why join",
    "why you'll love",
    "salary",
];
const CULTURE: &[&str] = &[
    "culture",
    "our values",
    "values",
    "how we work",
    "life at",
    "diversity",
];
const ABOUT: &[&str] = &["about us", "about the company", "who we are", "company overview", "our mission", "about "];

/// Classify a section heading.
pub fn classify_heading(heading: &str) -> SectionKind {
    let heading = heading.to_lowercase().replace('\u{2019}', "'");
    let matches = |keywords: &[&str]| keywords.iter().any(|k| heading.contains(k));

    if matches(RESPONSIBILITIES) {
        SectionKind::Responsibilities
    } else if matches(REQUIREMENTS) {
        SectionKind::Requirements
    } else if matches(BENEFITS) {
        SectionKind::Benefits
    } else if matches(CULTURE) {
        SectionKind::Culture
    } else if matches(ABOUT) {
        SectionKind::About
    } else {
        SectionKind::Custom
    }
}

/// Sections found in a description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentSections {
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub about: Option<String>,
    pub culture: Option<String>,
    pub custom: Vec<CustomSection>,
}

impl ContentSections {
    /// Add a section body under a heading. Repeated kinds are concatenated.
    pub fn push(&mut self, heading: &str, body: &str) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }

        let slot = match classify_heading(heading) {
            SectionKind::Requirements => &mut self.requirements,
            SectionKind::Responsibilities => &mut self.responsibilities,
            SectionKind::Benefits => &mut self.benefits,
            SectionKind::About => &mut self.about,
            SectionKind::Culture => &mut self.culture,
            SectionKind::Custom => {
                self.custom.push(CustomSection {
                    heading: collapse_whitespace(heading),
                    body: body.to_string(),
                });
                return;
            }
        };

        match slot {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(body);
            }
            None => *slot = Some(body.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields this set of sections can provide.
    pub fn fields(&self) -> Vec<JobField> {
        [
            (JobField::Requirements, &self.requirements),
            (JobField::Responsibilities, &self.responsibilities),
            (JobField::Benefits, &self.benefits),
            (JobField::About, &self.about),
            (JobField::Culture, &self.culture),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_some())
        .map(|(f, _)| f)
        .collect()
    }

    /// Fill empty fields on `data` without overwriting.
    pub fn apply_to(&self, data: &mut JobData) {
        for (kind, value) in [
            (SectionKind::Requirements, &self.requirements),
            (SectionKind::Responsibilities, &self.responsibilities),
            (SectionKind::Benefits, &self.benefits),
            (SectionKind::About, &self.about),
            (SectionKind::Culture, &self.culture),
        ] {
            if let (Some(field), Some(value)) = (kind.field(), value) {
                if !data.has(field) {
                    data.set_field(field, Some(value.clone()));
                }
            }
        }
        for section in &self.custom {
            if !data.custom_sections.iter().any(|s| s.heading == section.heading) {
                data.custom_sections.push(section.clone());
            }
        }
    }
}

/// Heading text when the element starts a section: an `<h*>` or a
/// paragraph whose only content is one short bold run.
fn heading_text(element: ElementRef<'_>) -> Option<String> {
    match element.value().name() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            clean_value(&element.text().collect::<String>())
        }
        "p" | "div" => bold_heading(element),
        _ => None,
    }
}

fn bold_heading(element: ElementRef<'_>) -> Option<String> {
    let mut bold = None;
    for child in element.children() {
        match child.value() {
            Node::Text(text) if matches!(text.trim(), "" | ":") => {}
            Node::Element(el) if matches!(el.name(), "strong" | "b") && bold.is_none() => {
                bold = ElementRef::wrap(child).map(|b| b.text().collect::<String>());
            }
            _ => return None,
        }
    }
    let text = collapse_whitespace(&bold?);
    let text = text.trim_end_matches(':').trim_end();
    (!text.is_empty() && text.chars().count() <= MAX_HEADING_CHARS).then(|| text.to_string())
}

fn contains_heading(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| heading_text(el).is_some())
}

/// Accumulates the text under the current heading while walking the tree.
#[derive(Default)]
struct Splitter {
    heading: Option<String>,
    body: String,
    sections: ContentSections,
}

impl Splitter {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.body.push_str(text),
                Node::Element(_) => {
                    let Some(el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if let Some(heading) = heading_text(el) {
                        self.flush();
                        self.heading = Some(heading);
                    } else if contains_heading(el) {
                        self.walk(el);
                    } else {
                        write_element(el, &mut self.body);
                    }
                }
                _ => {}
            }
        }
    }

    /// Text before the first heading is dropped.
    fn flush(&mut self) {
        if let Some(heading) = self.heading.take() {
            self.sections.push(&heading, &tidy_lines(&self.body));
        }
        self.body.clear();
    }
}

/// Split description HTML on headings (`<h*>` or a paragraph that is
/// entirely bold) and classify each section.
pub fn split_sections(html: &str) -> ContentSections {
    let fragment = Html::parse_fragment(html);
    let mut splitter = Splitter::default();
    splitter.walk(fragment.root_element());
    splitter.flush();
    splitter.sections
}
