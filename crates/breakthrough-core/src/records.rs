use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One scrape run's target: a location, a product type, and a page budget.
///
/// Fields are private so a request cannot change once the pipeline has
/// started; construct through [`ScrapeRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeRequest {
    location: String,
    product_type: String,
    max_pages: u32,
}

impl ScrapeRequest {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_pages` is zero or either
    /// string is blank.
    pub fn new(
        location: impl Into<String>,
        product_type: impl Into<String>,
        max_pages: u32,
    ) -> Result<Self, ConfigError> {
        let location = location.into().trim().to_string();
        let product_type = product_type.into().trim().to_string();

        if location.is_empty() {
            return Err(ConfigError::Validation(
                "location must be non-empty".to_string(),
            ));
        }
        if product_type.is_empty() {
            return Err(ConfigError::Validation(
                "product_type must be non-empty".to_string(),
            ));
        }
        if max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            location,
            product_type,
            max_pages,
        })
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    #[must_use]
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

/// A listing normalized into the shape every downstream consumer relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Source listing identifier. Expected non-empty and unique per run;
    /// the validator flags records that break either expectation.
    pub id: String,
    pub name: String,
    /// Lowercased category, e.g. `"flower"`.
    pub category: String,
    /// Non-negative price with currency formatting stripped, e.g. `"$12.50"` → `12.50`.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub location: String,
    /// Stamped when the item was normalized, not when its page was fetched.
    pub scraped_at: DateTime<Utc>,
    /// 1-based page index the listing came from.
    pub source_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Identifiers of every rule the record violated, in rule order.
    pub violations: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn from_violations(violations: Vec<String>) -> Self {
        let status = if violations.is_empty() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        };
        Self { status, violations }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    /// Adds a violation, flipping the status to invalid. Repeated ids are ignored.
    pub fn add_violation(&mut self, rule: &str) {
        if !self.violations.iter().any(|v| v == rule) {
            self.violations.push(rule.to_string());
        }
        self.status = ValidationStatus::Invalid;
    }
}

/// A canonical record paired with its validation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub record: CanonicalRecord,
    pub validation: ValidationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Done,
    Partial,
    Failed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Done => write!(f, "done"),
            RunOutcome::Partial => write!(f, "partial"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Per-run report handed to the persistence layer alongside the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub location: String,
    pub product_type: String,
    pub pages_fetched: u32,
    pub items_dropped_malformed: u32,
    pub records_total: usize,
    pub records_invalid: usize,
    pub outcome: RunOutcome,
    /// Rendered cause chain for `partial` and `failed` outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Number of records that passed every validation rule.
    #[must_use]
    pub fn records_valid(&self) -> usize {
        self.records_total.saturating_sub(self.records_invalid)
    }
}
