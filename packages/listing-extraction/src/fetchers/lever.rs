//! Lever postings API.

use async_trait::async_trait;
use serde::Deserialize;

use super::sections::{split_sections, ContentSections};
use super::{humanize_slug, ApiClient, ApiFetcher, FetchedPosting};
use crate::error::FetchResult;
use crate::salary::{self, SalaryInput};
use crate::text::{clean_value, html_to_text};
use crate::types::board::BoardType;
use crate::types::job::{JobData, JobField, RemoteType};

const DEFAULT_BASE_URL: &str = "https://api.lever.co";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    text: Option<String>,
    #[serde(default)]
    categories: LeverCategories,
    description: Option<String>,
    #[serde(default)]
    lists: Vec<LeverList>,
    additional: Option<String>,
    hosted_url: Option<String>,
    apply_url: Option<String>,
    workplace_type: Option<String>,
    salary_range: Option<LeverSalary>,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    location: Option<String>,
    commitment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeverList {
    text: String,
    /// `<li>` items without the enclosing list
    content: String,
}

#[derive(Debug, Deserialize)]
struct LeverSalary {
    min: Option<f64>,
    max: Option<f64>,
    currency: Option<String>,
    /// e.g. "per-year-salary", "per-hour-wage"
    interval: Option<String>,
}

pub struct LeverFetcher {
    client: ApiClient,
    base_url: String,
}

impl LeverFetcher {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn workplace_type(value: Option<&str>) -> RemoteType {
    match value {
        Some("remote") => RemoteType::Remote,
        Some("hybrid") => RemoteType::Hybrid,
        Some("onsite") | Some("on-site") => RemoteType::OnSite,
        _ => RemoteType::Unspecified,
    }
}

fn to_job_data(posting: LeverPosting, company_slug: &str) -> JobData {
    let description_html = posting.description.unwrap_or_default();
    let additional_html = posting.additional.unwrap_or_default();

    // Lists carry the structured sections; headings in the body are a fallback
    let mut sections = ContentSections::default();
    for list in &posting.lists {
        sections.push(&list.text, &html_to_text(&format!("<ul>{}</ul>", list.content)));
    }
    let body_sections = split_sections(&format!("{description_html}{additional_html}"));

    let mut data = JobData::new();
    data.title = posting.text.as_deref().and_then(clean_value);
    data.company_name = Some(humanize_slug(company_slug));
    data.set_field(JobField::Description, Some(html_to_text(&description_html)));
    data.location = posting.categories.location.as_deref().and_then(clean_value);
    data.employment_type = posting.categories.commitment.as_deref().and_then(clean_value);
    data.apply_url = posting.apply_url.or(posting.hosted_url);

    sections.apply_to(&mut data);
    body_sections.apply_to(&mut data);

    if let Some(range) = posting.salary_range {
        data.salary = salary::normalize(
            range.min.map(SalaryInput::Number),
            range.max.map(SalaryInput::Number),
            range.currency.as_deref(),
            range.interval.map(|i| i.replace('-', " ")).as_deref(),
        )
        .into_range();
    }

    data.remote_type = match workplace_type(posting.workplace_type.as_deref()) {
        RemoteType::Unspecified => {
            RemoteType::infer(&[data.location.as_deref(), data.title.as_deref()])
        }
        known => known,
    };
    data
}

#[async_trait]
impl ApiFetcher for LeverFetcher {
    fn board(&self) -> BoardType {
        BoardType::Lever
    }

    fn provider(&self) -> &'static str {
        "lever"
    }

    async fn fetch_posting(&self, company_slug: &str, job_id: &str) -> FetchResult<FetchedPosting> {
        let url = format!("{}/v0/postings/{}/{}", self.base_url, company_slug, job_id);
        let (posting, http_status) = self.client.get_json::<LeverPosting>(&url).await?;
        Ok(FetchedPosting {
            data: to_job_data(posting, company_slug),
            http_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ID: &str = "0c7a1d52-8f3e-4b8e-9a0e-1f2d3c4b5a69";

    #[tokio::test]
    async fn test_fetch_maps_lists_and_salary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v0/postings/acme/{ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": ID,
                "text": "Data Engineer",
                "categories": {"location": "Berlin", "commitment": "Full-time"},
                "description": "<div>We move data.</div>",
                "lists": [
                    {"text": "What you'll do", "content": "<li>Build pipelines</li>"},
                    {"text": "Requirements", "content": "<li>SQL</li><li>Rust</li>"}
                ],
                "additional": "<div>Visa support available.</div>",
                "hostedUrl": format!("https://jobs.lever.co/acme/{ID}"),
                "workplaceType": "hybrid",
                "salaryRange": {"min": 70000, "max": 90000, "currency": "EUR", "interval": "per-year-salary"}
            })))
            .mount(&server)
            .await;

        let fetcher = LeverFetcher::new(ApiClient::new(Duration::from_secs(5)))
            .with_base_url(server.uri());
        let result = fetcher
            .fetch(&format!("https://jobs.lever.co/acme/{ID}"), None, None)
            .await;

        assert_eq!(result.confidence, 0.9);
        let data = result.data.unwrap();
        assert_eq!(data.title.as_deref(), Some("Data Engineer"));
        assert_eq!(data.company_name.as_deref(), Some("Acme"));
        assert_eq!(data.responsibilities.as_deref(), Some("- Build pipelines"));
        assert_eq!(data.requirements.as_deref(), Some("- SQL\n- Rust"));
        assert_eq!(data.remote_type, RemoteType::Hybrid);
        assert_eq!(data.employment_type.as_deref(), Some("Full-time"));
        assert_eq!(data.salary.unwrap().currency, "EUR");
    }

    #[test]
    fn test_hourly_wage_is_dropped() {
        let posting: LeverPosting = serde_json::from_value(serde_json::json!({
            "text": "Barista",
            "description": "<p>Coffee.</p>",
            "salaryRange": {"min": 18, "max": 22, "currency": "USD", "interval": "per-hour-wage"}
        }))
        .unwrap();
        assert!(to_job_data(posting, "cafe").salary.is_none());
    }
}
