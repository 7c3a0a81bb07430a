//! AI backfill for API results.
//!
//! Structured APIs often leave compensation and requirements inside the
//! description body. When the description hints that they are there, an
//! LLM is asked for those sections only. Any failure returns the original
//! data untouched.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ai::{prompt, ProviderChain};
use crate::salary::{self, SalaryInput};
use crate::traits::llm::LlmOptions;
use crate::types::job::{JobData, JobField};

const SALARY_HINTS: &[&str] = &[
    "salary",
    "compensation",
    "pay range",
    "base pay",
    "$",
    "€",
    "£",
];

const REQUIREMENT_HINTS: &[&str] = &[
    "requirements",
    "qualifications",
    "you have",
    "you bring",
    "must have",
    "experience with",
];

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct BackfillPayload {
    requirements: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_currency: Option<String>,
    salary_period: Option<String>,
}

/// What a backfill pass should look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackfillNeeds {
    pub salary: bool,
    pub requirements: bool,
}

impl BackfillNeeds {
    pub fn any(&self) -> bool {
        self.salary || self.requirements
    }
}

/// Sections missing from `data` that its description appears to contain.
pub fn backfill_needs(data: &JobData) -> BackfillNeeds {
    let Some(description) = data.field(JobField::Description) else {
        return BackfillNeeds::default();
    };
    let lower = description.to_lowercase();
    let mentions = |hints: &[&str]| hints.iter().any(|h| lower.contains(h));

    BackfillNeeds {
        salary: data.salary.is_none() && mentions(SALARY_HINTS),
        requirements: !data.has(JobField::Requirements) && mentions(REQUIREMENT_HINTS),
    }
}

/// Runs the backfill prompt through a provider chain.
#[derive(Clone)]
pub struct Backfiller {
    chain: ProviderChain,
}

impl Backfiller {
    pub fn new(chain: ProviderChain) -> Self {
        Self { chain }
    }

    /// Backfill missing sections. Returns `data` unchanged when nothing is
    /// needed or every provider fails.
    pub async fn backfill(&self, data: JobData) -> JobData {
        let needs = backfill_needs(&data);
        if !needs.any() || self.chain.is_empty() {
            return data;
        }
        let Some(description) = data.field(JobField::Description) else {
            return data;
        };

        let prompt = prompt::format_backfill_prompt(data.field(JobField::Title), description);
        let mut options = LlmOptions::default().with_system(prompt::BACKFILL_SYSTEM);
        if let Ok(schema) = serde_json::to_value(schemars::schema_for!(BackfillPayload)) {
            options = options.with_schema(schema);
        }

        for provider in self.chain.iter() {
            let response = provider.run(&prompt, &options).await;
            if let Some(error) = response.error {
                warn!(provider = provider.name(), error = %error, "Backfill provider failed");
                continue;
            }
            match serde_json::from_str::<BackfillPayload>(response.content.trim()) {
                Ok(payload) => {
                    debug!(provider = provider.name(), "Backfill response received");
                    return apply(data, payload, needs);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Backfill response unparseable");
                }
            }
        }
        data
    }
}

fn apply(mut data: JobData, payload: BackfillPayload, needs: BackfillNeeds) -> JobData {
    if needs.requirements {
        data.set_field(JobField::Requirements, payload.requirements);
    }
    if needs.salary {
        data.salary = salary::normalize(
            payload.salary_min.map(SalaryInput::Number),
            payload.salary_max.map(SalaryInput::Number),
            payload.salary_currency.as_deref(),
            payload.salary_period.as_deref(),
        )
        .into_range();
    }
    data
}
