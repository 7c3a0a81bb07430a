//! Greenhouse job board API.

use async_trait::async_trait;
use serde::Deserialize;

use super::sections::split_sections;
use super::{humanize_slug, ApiClient, ApiFetcher, FetchedPosting};
use crate::error::FetchResult;
use crate::salary::{self, SalaryInput};
use crate::text::{clean_value, html_to_text, unescape_markup};
use crate::types::board::BoardType;
use crate::types::job::{JobData, JobField, RemoteType};

const DEFAULT_BASE_URL: &str = "https://boards-api.greenhouse.io";

#[derive(Debug, Deserialize)]
struct GreenhouseJob {
    title: Option<String>,
    /// Entity-escaped HTML
    content: Option<String>,
    location: Option<GreenhouseLocation>,
    absolute_url: Option<String>,
    company_name: Option<String>,
    #[serde(default)]
    pay_input_ranges: Vec<PayRange>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseLocation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayRange {
    min_cents: Option<i64>,
    max_cents: Option<i64>,
    currency_type: Option<String>,
    title: Option<String>,
}

pub struct GreenhouseFetcher {
    client: ApiClient,
    base_url: String,
}

impl GreenhouseFetcher {
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

fn to_job_data(job: GreenhouseJob, company_slug: &str) -> JobData {
    let content_html = job
        .content
        .as_deref()
        .map(|c| unescape_markup(c).into_owned())
        .unwrap_or_default();

    let mut data = JobData::new();
    data.title = job.title.as_deref().and_then(clean_value);
    data.company_name = job
        .company_name
        .as_deref()
        .and_then(clean_value)
        .or_else(|| Some(humanize_slug(company_slug)));
    data.set_field(JobField::Description, Some(html_to_text(&content_html)));
    data.location = job
        .location
        .and_then(|l| l.name)
        .as_deref()
        .and_then(clean_value);
    data.apply_url = job.absolute_url;

    if let Some(range) = job.pay_input_ranges.first() {
        data.salary = salary::normalize(
            range.min_cents.map(|c| SalaryInput::Number(c as f64 / 100.0)),
            range.max_cents.map(|c| SalaryInput::Number(c as f64 / 100.0)),
            range.currency_type.as_deref(),
            range.title.as_deref(),
        )
        .into_range();
    }

    split_sections(&content_html).apply_to(&mut data);
    data.remote_type = RemoteType::infer(&[data.location.as_deref(), data.title.as_deref()]);
    data
}

#[async_trait]
impl ApiFetcher for GreenhouseFetcher {
    fn board(&self) -> BoardType {
        BoardType::Greenhouse
    }

    fn provider(&self) -> &'static str {
        "greenhouse"
    }

    async fn fetch_posting(&self, company_slug: &str, job_id: &str) -> FetchResult<FetchedPosting> {
        let url = format!(
            "{}/v1/boards/{}/jobs/{}?pay_transparency=true",
            self.base_url, company_slug, job_id
        );
        let (job, http_status) = self.client.get_json::<GreenhouseJob>(&url).await?;
        Ok(FetchedPosting {
            data: to_job_data(job, company_slug),
            http_status,
        })
    }
}
