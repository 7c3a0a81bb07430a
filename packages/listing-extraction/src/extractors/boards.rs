//! Per-board selector tables.
//!
//! Candidates are tried in order for each field; the first non-empty
//! match wins. Meta tags come last so visible page content is preferred.

use crate::types::board::BoardType;
use crate::types::job::JobField;

/// Ordered selector candidates for one board.
#[derive(Debug)]
pub struct SelectorTable {
    pub fields: &'static [(JobField, &'static [&'static str])],
    pub employment_type: &'static [&'static str],
}

impl SelectorTable {
    pub fn selectors(&self, field: JobField) -> &'static [&'static str] {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, s)| *s)
            .unwrap_or(&[])
    }
}

pub static GREENHOUSE: SelectorTable = SelectorTable {
    fields: &[
        (
            JobField::Title,
            &[
                "h1.app-title",
                ".app-title",
                ".job__title h1",
                "h1.section-header",
                "meta[property='og:title']",
            ],
        ),
        (
            JobField::Company,
            &[
                ".company-name",
                ".job__header .company",
                "#logo img",
                "meta[property='og:site_name']",
            ],
        ),
        (JobField::Location, &[".location", ".job__location", "[class*='location']"]),
        (JobField::Description, &["#content", ".job__description", ".job-post-content"]),
        (JobField::Requirements, &[]),
        (JobField::Responsibilities, &[]),
        (JobField::Benefits, &[]),
        (JobField::About, &[]),
        (JobField::Culture, &[]),
    ],
    employment_type: &[],
};

pub static LEVER: SelectorTable = SelectorTable {
    fields: &[
        (JobField::Title, &[".posting-headline h2", "meta[property='og:title']"]),
        (
            JobField::Company,
            &[".main-header-logo img", "meta[property='og:site_name']"],
        ),
        (
            JobField::Location,
            &[
                ".posting-categories .location",
                ".posting-categories .sort-by-location",
                ".location",
            ],
        ),
        (
            JobField::Description,
            &[
                "[data-qa='job-description']",
                ".section-wrapper.page-full-width",
                ".posting-page .content",
            ],
        ),
        (JobField::Requirements, &[]),
        (JobField::Responsibilities, &[]),
        (JobField::Benefits, &[]),
        (JobField::About, &["[data-qa='closing-description']"]),
        (JobField::Culture, &[]),
    ],
    employment_type: &[
        ".posting-categories .commitment",
        ".posting-categories .sort-by-commitment",
    ],
};

pub static ASHBY: SelectorTable = SelectorTable {
    fields: &[
        (
            JobField::Title,
            &["h1.ashby-job-posting-heading", "h1", "meta[property='og:title']"],
        ),
        (
            JobField::Company,
            &[
                "meta[property='og:site_name']",
                "img.ashby-job-board-logo",
                "[class*='_navLogo'] img",
            ],
        ),
        (
            JobField::Location,
            &[
                "[class*='_section'] [class*='_location']",
                ".ashby-job-posting-left-pane [class*='location']",
            ],
        ),
        (
            JobField::Description,
            &[
                ".ashby-job-posting-description",
                "[class*='_descriptionText']",
                "[class*='_description']",
            ],
        ),
        (JobField::Requirements, &[]),
        (JobField::Responsibilities, &[]),
        (JobField::Benefits, &[]),
        (JobField::About, &[]),
        (JobField::Culture, &[]),
    ],
    employment_type: &["[class*='_employmentType']"],
};

pub static WORKDAY: SelectorTable = SelectorTable {
    fields: &[
        (
            JobField::Title,
            &[
                "[data-automation-id='jobPostingHeader']",
                "h2[data-automation-id='jobPostingHeader']",
                "meta[property='og:title']",
            ],
        ),
        (
            JobField::Company,
            &["meta[property='og:site_name']", "[data-automation-id='company']"],
        ),
        (
            JobField::Location,
            &[
                "[data-automation-id='locations'] dd",
                "[data-automation-id='locations']",
            ],
        ),
        (
            JobField::Description,
            &[
                "[data-automation-id='jobPostingDescription']",
                "[data-automation-id='job-posting-details']",
            ],
        ),
        (JobField::Requirements, &[]),
        (JobField::Responsibilities, &[]),
        (JobField::Benefits, &[]),
        (JobField::About, &[]),
        (JobField::Culture, &[]),
    ],
    employment_type: &["[data-automation-id='time'] dd", "[data-automation-id='time']"],
};

pub static ACCESS_LIMITED: SelectorTable = SelectorTable {
    fields: &[
        (
            JobField::Title,
            &[
                "h1.top-card-layout__title",
                "h1.topcard__title",
                "h1.jobsearch-JobInfoHeader-title",
                "[data-testid='jobsearch-JobInfoHeader-title']",
            ],
        ),
        (
            JobField::Company,
            &[
                "a.topcard__org-name-link",
                ".topcard__org-name-link",
                "[data-testid='inlineHeader-companyName']",
                "[data-company-name]",
            ],
        ),
        (
            JobField::Location,
            &[
                ".topcard__flavor--bullet",
                "[data-testid='inlineHeader-companyLocation']",
                "[data-testid='job-location']",
            ],
        ),
        (
            JobField::Description,
            &[
                ".show-more-less-html__markup",
                ".description__text",
                "#jobDescriptionText",
            ],
        ),
        (JobField::Requirements, &[]),
        (JobField::Responsibilities, &[]),
        (JobField::Benefits, &[]),
        (JobField::About, &[]),
        (JobField::Culture, &[]),
    ],
    employment_type: &[
        ".description__job-criteria-item:nth-child(2) .description__job-criteria-text",
        "[data-testid='jobsearch-JobMetadataHeader-item']",
    ],
};

/// Defaults for unrecognized hosts: schema.org microdata and common class names.
pub static UNKNOWN: SelectorTable = SelectorTable {
    fields: &[
        (
            JobField::Title,
            &[
                "[itemprop='title']",
                "h1.job-title",
                ".job-title",
                ".posting-title",
                "h1",
                "meta[property='og:title']",
            ],
        ),
        (
            JobField::Company,
            &[
                "[itemprop='hiringOrganization'] [itemprop='name']",
                ".company-name",
                ".job-company",
                "meta[property='og:site_name']",
            ],
        ),
        (
            JobField::Location,
            &["[itemprop='jobLocation']", ".job-location", ".location"],
        ),
        (
            JobField::Description,
            &[
                "[itemprop='description']",
                ".job-description",
                "#job-description",
                ".description",
            ],
        ),
        (
            JobField::Requirements,
            &[".requirements", "#requirements", ".qualifications"],
        ),
        (
            JobField::Responsibilities,
            &[".responsibilities", "#responsibilities"],
        ),
        (JobField::Benefits, &[".benefits", "#benefits"]),
        (JobField::About, &[".about-company", ".about-us", "#about"]),
        (JobField::Culture, &[".culture", "#culture", ".values"]),
    ],
    employment_type: &["[itemprop='employmentType']", ".employment-type", ".job-type"],
};

/// Selector table for a board.
pub fn table_for(board: BoardType) -> &'static SelectorTable {
    match board {
        BoardType::Greenhouse => &GREENHOUSE,
        BoardType::Lever => &LEVER,
        BoardType::Ashby => &ASHBY,
        BoardType::Workday => &WORKDAY,
        BoardType::AccessLimited => &ACCESS_LIMITED,
        BoardType::Unknown => &UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_every_selector_parses() {
        for board in BoardType::ALL {
            let table = table_for(board);
            for (field, selectors) in table.fields {
                for s in selectors.iter().chain(table.employment_type) {
                    assert!(
                        Selector::parse(s).is_ok(),
                        "{board}/{field}: invalid selector {s}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_every_table_covers_all_fields() {
        for board in BoardType::ALL {
            let table = table_for(board);
            for field in JobField::ALL {
                assert!(
                    table.fields.iter().any(|(f, _)| *f == field),
                    "{board} has no entry for {field}"
                );
            }
        }
    }
}
