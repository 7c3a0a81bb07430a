//! Listing - the application-owned entity this pipeline fills in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::job::{JobData, RemoteType};

/// A job listing as seen by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub employment_type: Option<String>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Create an empty listing for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            url: url.into(),
            title: None,
            company_name: None,
            description: None,
            location: None,
            remote_type: None,
            employment_type: None,
            requirements: None,
            responsibilities: None,
            benefits: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply an update; `None` fields leave the listing untouched.
    pub fn apply(&mut self, update: &ListingUpdate) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut self.title, &update.title);
        set(&mut self.company_name, &update.company_name);
        set(&mut self.description, &update.description);
        set(&mut self.location, &update.location);
        set(&mut self.remote_type, &update.remote_type);
        set(&mut self.employment_type, &update.employment_type);
        set(&mut self.requirements, &update.requirements);
        set(&mut self.responsibilities, &update.responsibilities);
        set(&mut self.benefits, &update.benefits);
        set(&mut self.salary_min, &update.salary_min);
        set(&mut self.salary_max, &update.salary_max);
        set(&mut self.salary_currency, &update.salary_currency);
        self.updated_at = Utc::now();
    }
}

/// Fields to write onto a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub employment_type: Option<String>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl ListingUpdate {
    /// Everything an accepted result carries.
    pub fn from_accepted(data: &JobData) -> Self {
        let salary = data.salary.as_ref();
        Self {
            title: non_blank(&data.title),
            company_name: non_blank(&data.company_name),
            description: non_blank(&data.description),
            location: non_blank(&data.location),
            remote_type: (data.remote_type != RemoteType::Unspecified).then_some(data.remote_type),
            employment_type: non_blank(&data.employment_type),
            requirements: non_blank(&data.requirements),
            responsibilities: non_blank(&data.responsibilities),
            benefits: non_blank(&data.benefits),
            salary_min: salary.and_then(|s| s.min),
            salary_max: salary.and_then(|s| s.max),
            salary_currency: salary.map(|s| s.currency.clone()),
        }
    }

    /// Only the non-empty subset of title/company/description.
    pub fn partial(data: &JobData) -> Self {
        Self {
            title: non_blank(&data.title),
            company_name: non_blank(&data.company_name),
            description: non_blank(&data.description),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields this update writes.
    pub fn written_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.company_name.is_some() {
            fields.push("company_name");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.location.is_some() {
            fields.push("location");
        }
        if self.remote_type.is_some() {
            fields.push("remote_type");
        }
        if self.employment_type.is_some() {
            fields.push("employment_type");
        }
        if self.requirements.is_some() {
            fields.push("requirements");
        }
        if self.responsibilities.is_some() {
            fields.push("responsibilities");
        }
        if self.benefits.is_some() {
            fields.push("benefits");
        }
        if self.salary_min.is_some() || self.salary_max.is_some() {
            fields.push("salary");
        }
        fields
    }
}
