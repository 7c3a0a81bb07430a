//! Salary range validation.
//!
//! Reporting "no salary" is preferred over a false positive, so anything
//! ambiguous (non-annual units, implausible bounds) is rejected rather
//! than converted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::types::job::SalaryRange;

/// Smallest plausible annual salary.
pub const MIN_ANNUAL: f64 = 10_000.0;
/// Largest plausible annual salary.
pub const MAX_ANNUAL: f64 = 2_000_000.0;

/// A raw salary bound as found in a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SalaryInput<'a> {
    Number(f64),
    Text(&'a str),
}

impl From<f64> for SalaryInput<'_> {
    fn from(n: f64) -> Self {
        SalaryInput::Number(n)
    }
}

impl From<i64> for SalaryInput<'_> {
    fn from(n: i64) -> Self {
        SalaryInput::Number(n as f64)
    }
}

impl<'a> From<&'a str> for SalaryInput<'a> {
    fn from(s: &'a str) -> Self {
        SalaryInput::Text(s)
    }
}

impl SalaryInput<'_> {
    fn value(&self) -> Option<f64> {
        match self {
            SalaryInput::Number(n) if n.is_finite() => Some(*n),
            SalaryInput::Number(_) => None,
            SalaryInput::Text(s) => parse_amount(s),
        }
    }
}

/// Why a salary was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryRejection {
    MissingSalary,
    MissingCurrency,
    InvertedRange,
    NonAnnualUnit,
    MinOutOfBounds,
    MaxOutOfBounds,
}

impl SalaryRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryRejection::MissingSalary => "missing_salary",
            SalaryRejection::MissingCurrency => "missing_currency",
            SalaryRejection::InvertedRange => "inverted_range",
            SalaryRejection::NonAnnualUnit => "non_annual_unit",
            SalaryRejection::MinOutOfBounds => "min_out_of_bounds",
            SalaryRejection::MaxOutOfBounds => "max_out_of_bounds",
        }
    }
}

impl fmt::Display for SalaryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of [`normalize`].
///
/// Parsed bounds are kept on rejection for diagnostics; use
/// [`SalaryValidation::into_range`] to get something safe to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryValidation {
    pub valid: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub reason: Option<SalaryRejection>,
}

impl SalaryValidation {
    fn rejected(
        reason: SalaryRejection,
        min: Option<f64>,
        max: Option<f64>,
        currency: Option<String>,
    ) -> Self {
        Self {
            valid: false,
            min,
            max,
            currency,
            reason: Some(reason),
        }
    }

    pub fn reason_str(&self) -> Option<&'static str> {
        self.reason.map(|r| r.as_str())
    }

    /// The validated range, or `None` when rejected.
    pub fn into_range(self) -> Option<SalaryRange> {
        if !self.valid {
            return None;
        }
        Some(SalaryRange {
            min: self.min,
            max: self.max,
            currency: self.currency?,
        })
    }
}

fn non_annual() -> &'static Regex {
    static UNIT: OnceLock<Regex> = OnceLock::new();
    UNIT.get_or_init(|| {
        Regex::new(
            r"(?i)\b(per|an|a|each|every)\s+(hour|month|week|day)\b|\b(hourly|monthly|weekly|daily|biweekly)\b|/\s*(hr|hour|h|mo|month|wk|week|day)\b|^\s*(hour|month|week|day)\s*$",
        )
        .expect("static regex")
    })
}

/// Parse "120,000", "120.000", "2,5k", "$1.2M", "95000.50" and the like.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut text: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£' | '¥' | '+' | '_'))
        .collect();
    text = text.trim_start_matches(|c: char| c.is_ascii_alphabetic()).to_string();

    let multiplier = match text.chars().last() {
        Some('k' | 'K') => 1_000.0,
        Some('m' | 'M') => 1_000_000.0,
        _ => 1.0,
    };
    if multiplier > 1.0 {
        text.pop();
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let commas = text.matches(',').count();
    let dots = text.matches('.').count();
    let has_suffix = multiplier > 1.0;

    let canonical = match (commas, dots) {
        (0, 0) => text,
        (_, _) if commas > 0 && dots > 0 => {
            // The later separator is the decimal point
            let last_comma = text.rfind(',')?;
            let last_dot = text.rfind('.')?;
            if last_dot > last_comma {
                text.replace(',', "")
            } else {
                text.replace('.', "").replace(',', ".")
            }
        }
        (c, 0) => canonical_single(&text, ',', c, has_suffix),
        (0, d) => canonical_single(&text, '.', d, has_suffix),
        _ => return None,
    };

    canonical.parse::<f64>().ok().map(|v| v * multiplier)
}

/// One kind of separator: thousands when repeated or followed by exactly
/// three digits (and no k/m suffix), decimal otherwise.
fn canonical_single(text: &str, sep: char, count: usize, has_suffix: bool) -> String {
    let digits_after = text.rsplit(sep).next().map(str::len).unwrap_or(0);
    let is_thousands = count > 1 || (digits_after == 3 && !has_suffix);
    if is_thousands {
        text.replace(sep, "")
    } else {
        text.replace(sep, ".")
    }
}

/// Validate a salary range.
///
/// Rules apply in order: missing bounds, missing currency, inverted range,
/// non-annual unit in `context`, then plausibility bounds.
pub fn normalize<'a>(
    min: Option<SalaryInput<'a>>,
    max: Option<SalaryInput<'a>>,
    currency: Option<&str>,
    context: Option<&str>,
) -> SalaryValidation {
    let min = min.and_then(|m| m.value());
    let max = max.and_then(|m| m.value());

    if min.is_none() && max.is_none() {
        return SalaryValidation::rejected(SalaryRejection::MissingSalary, None, None, None);
    }

    let currency = currency
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()));
    let Some(currency) = currency else {
        return SalaryValidation::rejected(SalaryRejection::MissingCurrency, min, max, None);
    };

    if let (Some(lo), Some(hi)) = (min, max) {
        if hi < lo {
            return SalaryValidation::rejected(
                SalaryRejection::InvertedRange,
                min,
                max,
                Some(currency),
            );
        }
    }

    if context.is_some_and(|text| non_annual().is_match(text)) {
        return SalaryValidation::rejected(
            SalaryRejection::NonAnnualUnit,
            min,
            max,
            Some(currency),
        );
    }

    let in_bounds = |v: f64| (MIN_ANNUAL..=MAX_ANNUAL).contains(&v);
    if min.is_some_and(|v| !in_bounds(v)) {
        return SalaryValidation::rejected(
            SalaryRejection::MinOutOfBounds,
            min,
            max,
            Some(currency),
        );
    }
    if max.is_some_and(|v| !in_bounds(v)) {
        return SalaryValidation::rejected(
            SalaryRejection::MaxOutOfBounds,
            min,
            max,
            Some(currency),
        );
    }

    SalaryValidation {
        valid: true,
        min,
        max,
        currency: Some(currency),
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range() {
        let result = normalize(
            Some(120_000_i64.into()),
            Some(80_000_i64.into()),
            Some("USD"),
            None,
        );
        assert!(!result.valid);
        assert_eq!(result.reason_str(), Some("inverted_range"));
    }

    #[test]
    fn test_hourly_context_is_rejected() {
        let result = normalize(
            Some("2.5k".into()),
            Some("3k".into()),
            Some("USD"),
            Some("per hour"),
        );
        assert!(!result.valid);
        assert_eq!(result.reason_str(), Some("non_annual_unit"));
        assert_eq!(result.min, Some(2_500.0));
        assert_eq!(result.max, Some(3_000.0));
    }

    #[test]
    fn test_valid_annual_range() {
        let result = normalize(
            Some(120_000_i64.into()),
            Some(150_000_i64.into()),
            Some("USD"),
            None,
        );
        assert!(result.valid);
        assert_eq!(result.min, Some(120_000.0));
        assert_eq!(result.max, Some(150_000.0));
        assert_eq!(result.currency.as_deref(), Some("USD"));

        let range = result.into_range().unwrap();
        assert_eq!(range.currency, "USD");
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            normalize(None, None, None, Some("hourly")).reason_str(),
            Some("missing_salary")
        );
        assert_eq!(
            normalize(Some(90_000_i64.into()), None, Some("dollars"), None).reason_str(),
            Some("missing_currency")
        );
        assert_eq!(
            normalize(Some(90_000_i64.into()), None, Some(" "), None).reason_str(),
            Some("missing_currency")
        );
        assert_eq!(
            normalize(Some(5_000_i64.into()), Some(9_000_i64.into()), Some("eur"), None)
                .reason_str(),
            Some("min_out_of_bounds")
        );
        assert_eq!(
            normalize(Some(50_000_i64.into()), Some(5_000_000_i64.into()), Some("EUR"), None)
                .reason_str(),
            Some("max_out_of_bounds")
        );
    }

    #[test]
    fn test_single_bound_is_enough() {
        let result = normalize(None, Some("95k".into()), Some("gbp"), Some("per year"));
        assert!(result.valid);
        assert_eq!(result.max, Some(95_000.0));
        assert_eq!(result.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_parse_amount_conventions() {
        assert_eq!(parse_amount("120,000"), Some(120_000.0));
        assert_eq!(parse_amount("120.000"), Some(120_000.0));
        assert_eq!(parse_amount("$1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_amount("1.234,56"), Some(1_234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1_234.56));
        assert_eq!(parse_amount("2,5k"), Some(2_500.0));
        assert_eq!(parse_amount("85K"), Some(85_000.0));
        assert_eq!(parse_amount("1.2M"), Some(1_200_000.0));
        assert_eq!(parse_amount("USD 90000"), Some(90_000.0));
        assert_eq!(parse_amount("competitive"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_unit_detection() {
        for context in ["$40/hr", "Hourly", "paid monthly", "per week", "HOUR", "$500 a day"] {
            let result = normalize(
                Some(40_000_i64.into()),
                Some(50_000_i64.into()),
                Some("USD"),
                Some(context),
            );
            assert_eq!(result.reason_str(), Some("non_annual_unit"), "{context}");
        }
        let yearly = normalize(
            Some(40_000_i64.into()),
            Some(50_000_i64.into()),
            Some("USD"),
            Some("per year"),
        );
        assert!(yearly.valid);
    }
}
