//! Ashby posting API.
//!
//! Ashby only exposes the whole board, so the posting is picked out of
//! the job list by id.

use async_trait::async_trait;
use serde::Deserialize;

use super::sections::split_sections;
use super::{humanize_slug, ApiClient, ApiFetcher, FetchedPosting};
use crate::error::{FetchError, FetchResult};
use crate::salary::{self, SalaryInput};
use crate::text::{clean_value, html_to_text};
use crate::types::board::BoardType;
use crate::types::job::{JobData, JobField, RemoteType};

const DEFAULT_BASE_URL: &str = "https://api.ashbyhq.com";

#[derive(Debug, Deserialize)]
struct AshbyBoard {
    #[serde(default)]
    jobs: Vec<AshbyJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AshbyJob {
    id: String,
    title: Option<String>,
    location: Option<String>,
    employment_type: Option<String>,
    #[serde(default)]
    is_remote: bool,
    workplace_type: Option<String>,
    description_html: Option<String>,
    job_url: Option<String>,
    apply_url: Option<String>,
    compensation: Option<AshbyCompensation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AshbyCompensation {
    #[serde(default)]
    summary_components: Vec<CompensationComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompensationComponent {
    compensation_type: Option<String>,
    /// e.g. "1 YEAR", "1 HOUR"
    interval: Option<String>,
    currency_code: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
}

pub struct AshbyFetcher {
    client: ApiClient,
    base_url: String,
}

impl AshbyFetcher {
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

fn remote_type(job: &AshbyJob) -> RemoteType {
    match job.workplace_type.as_deref() {
        Some("Remote") => RemoteType::Remote,
        Some("Hybrid") => RemoteType::Hybrid,
        Some("OnSite") => RemoteType::OnSite,
        _ if job.is_remote => RemoteType::Remote,
        _ => RemoteType::infer(&[job.location.as_deref(), job.title.as_deref()]),
    }
}

fn to_job_data(job: AshbyJob, company_slug: &str) -> JobData {
    let description_html = job.description_html.clone().unwrap_or_default();

    let mut data = JobData::new();
    data.title = job.title.as_deref().and_then(clean_value);
    data.company_name = Some(humanize_slug(company_slug));
    data.set_field(JobField::Description, Some(html_to_text(&description_html)));
    data.location = job.location.as_deref().and_then(clean_value);
    data.employment_type = job.employment_type.as_deref().and_then(clean_value);
    data.remote_type = remote_type(&job);
    data.apply_url = job.apply_url.or(job.job_url);

    let salary = job
        .compensation
        .iter()
        .flat_map(|c| c.summary_components.iter())
        .find(|c| c.compensation_type.as_deref() == Some("Salary"));
    if let Some(component) = salary {
        data.salary = salary::normalize(
            component.min_value.map(SalaryInput::Number),
            component.max_value.map(SalaryInput::Number),
            component.currency_code.as_deref(),
            component.interval.as_deref().map(|i| i.to_lowercase()).as_deref(),
        )
        .into_range();
    }

    split_sections(&description_html).apply_to(&mut data);
    data
}

#[async_trait]
impl ApiFetcher for AshbyFetcher {
    fn board(&self) -> BoardType {
        BoardType::Ashby
    }

    fn provider(&self) -> &'static str {
        "ashby"
    }

    async fn fetch_posting(&self, company_slug: &str, job_id: &str) -> FetchResult<FetchedPosting> {
        let url = format!(
            "{}/posting-api/job-board/{}?includeCompensation=true",
            self.base_url, company_slug
        );
        let (board, http_status) = self.client.get_json::<AshbyBoard>(&url).await?;

        let job = board
            .jobs
            .into_iter()
            .find(|j| j.id.eq_ignore_ascii_case(job_id))
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: format!("{url}#{job_id}"),
            })?;

        Ok(FetchedPosting {
            data: to_job_data(job, company_slug),
            http_status,
        })
    }
}
