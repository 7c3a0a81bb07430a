//! Normalized job data produced by every extraction strategy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote-work arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteType {
    Remote,
    Hybrid,
    OnSite,
    #[default]
    Unspecified,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Remote => "remote",
            RemoteType::Hybrid => "hybrid",
            RemoteType::OnSite => "on_site",
            RemoteType::Unspecified => "unspecified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Remote, Self::Hybrid, Self::OnSite, Self::Unspecified]
            .into_iter()
            .find(|r| r.as_str() == s)
    }

    /// Infer from free text (location, title, workplace hints).
    ///
    /// Hybrid wins over remote because "hybrid remote" postings are hybrid.
    pub fn infer(texts: &[Option<&str>]) -> Self {
        let haystack = texts
            .iter()
            .flatten()
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        if haystack.contains("hybrid") {
            RemoteType::Hybrid
        } else if haystack.contains("remote") || haystack.contains("telecommute") {
            RemoteType::Remote
        } else if haystack.contains("on-site")
            || haystack.contains("onsite")
            || haystack.contains("on site")
            || haystack.contains("in office")
            || haystack.contains("in-office")
        {
            RemoteType::OnSite
        } else {
            RemoteType::Unspecified
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated annual salary range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: String,
}

/// A titled section that does not map to a known field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSection {
    pub heading: String,
    pub body: String,
}

/// Fields scored by the confidence model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobField {
    Title,
    Company,
    Description,
    Location,
    Requirements,
    Responsibilities,
    Benefits,
    About,
    Culture,
}

impl JobField {
    pub const ALL: [JobField; 9] = [
        JobField::Title,
        JobField::Company,
        JobField::Description,
        JobField::Location,
        JobField::Requirements,
        JobField::Responsibilities,
        JobField::Benefits,
        JobField::About,
        JobField::Culture,
    ];

    /// Fields that must all be present before a result can be accepted.
    pub const REQUIRED: [JobField; 3] = [JobField::Title, JobField::Company, JobField::Description];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobField::Title => "title",
            JobField::Company => "company",
            JobField::Description => "description",
            JobField::Location => "location",
            JobField::Requirements => "requirements",
            JobField::Responsibilities => "responsibilities",
            JobField::Benefits => "benefits",
            JobField::About => "about",
            JobField::Culture => "culture",
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common normalized schema for a job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub remote_type: RemoteType,
    pub employment_type: Option<String>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub about: Option<String>,
    pub culture: Option<String>,
    pub salary: Option<SalaryRange>,
    #[serde(default)]
    pub custom_sections: Vec<CustomSection>,
    pub apply_url: Option<String>,
}

impl JobData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a scored field.
    pub fn field(&self, field: JobField) -> Option<&str> {
        let value = match field {
            JobField::Title => &self.title,
            JobField::Company => &self.company_name,
            JobField::Description => &self.description,
            JobField::Location => &self.location,
            JobField::Requirements => &self.requirements,
            JobField::Responsibilities => &self.responsibilities,
            JobField::Benefits => &self.benefits,
            JobField::About => &self.about,
            JobField::Culture => &self.culture,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Set a scored field; blank values clear it.
    pub fn set_field(&mut self, field: JobField, value: Option<String>) {
        let value = value.filter(|v| !v.trim().is_empty());
        let slot = match field {
            JobField::Title => &mut self.title,
            JobField::Company => &mut self.company_name,
            JobField::Description => &mut self.description,
            JobField::Location => &mut self.location,
            JobField::Requirements => &mut self.requirements,
            JobField::Responsibilities => &mut self.responsibilities,
            JobField::Benefits => &mut self.benefits,
            JobField::About => &mut self.about,
            JobField::Culture => &mut self.culture,
        };
        *slot = value;
    }

    pub fn has(&self, field: JobField) -> bool {
        self.field(field).is_some()
    }

    pub fn extracted_fields(&self) -> Vec<JobField> {
        JobField::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }

    pub fn missing_fields(&self) -> Vec<JobField> {
        JobField::ALL.into_iter().filter(|f| !self.has(*f)).collect()
    }

    pub fn has_required_fields(&self) -> bool {
        JobField::REQUIRED.iter().all(|f| self.has(*f))
    }

    /// Whether at least one of title/company/description is present.
    pub fn has_any_required_field(&self) -> bool {
        JobField::REQUIRED.iter().any(|f| self.has(*f))
    }

    /// Fill empty fields from `other` without overwriting.
    pub fn fill_missing_from(&mut self, other: &JobData) {
        for field in JobField::ALL {
            if !self.has(field) {
                if let Some(value) = other.field(field) {
                    self.set_field(field, Some(value.to_string()));
                }
            }
        }
        if self.salary.is_none() {
            self.salary = other.salary.clone();
        }
        if self.remote_type == RemoteType::Unspecified {
            self.remote_type = other.remote_type;
        }
        if self.employment_type.is_none() {
            self.employment_type = other.employment_type.clone();
        }
    }
}
