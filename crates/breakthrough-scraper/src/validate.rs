//! Rule-based validation of canonical records.
//!
//! Every rule runs against every record; a record's verdict lists all the
//! rules it broke, in rule order. Invalid records are kept and flagged, never
//! dropped. Duplicate ids can only be seen across a batch, so
//! [`Validator::validate_batch`] adds `duplicate_id` to every record sharing
//! a non-empty id with another record in the same batch.

use std::collections::{HashMap, HashSet};

use breakthrough_core::{CanonicalRecord, ValidatedRecord, ValidationConfig, ValidationResult};

pub const EMPTY_ID: &str = "empty_id";
pub const DUPLICATE_ID: &str = "duplicate_id";
pub const EMPTY_NAME: &str = "empty_name";
pub const CATEGORY_NOT_ALLOWED: &str = "category_not_allowed";
pub const NEGATIVE_PRICE: &str = "negative_price";

/// A single per-record check.
pub trait RecordRule: Send + Sync {
    /// Identifier reported in [`ValidationResult::violations`].
    fn id(&self) -> &str;

    /// Returns `true` if the record satisfies the rule.
    fn check(&self, record: &CanonicalRecord) -> bool;
}

struct NonEmptyId;

impl RecordRule for NonEmptyId {
    fn id(&self) -> &str {
        EMPTY_ID
    }

    fn check(&self, record: &CanonicalRecord) -> bool {
        !record.id.trim().is_empty()
    }
}

struct NonEmptyName;

impl RecordRule for NonEmptyName {
    fn id(&self) -> &str {
        EMPTY_NAME
    }

    fn check(&self, record: &CanonicalRecord) -> bool {
        !record.name.trim().is_empty()
    }
}

/// Category must be in the configured allow-list.
struct CategoryAllowed {
    allowed: HashSet<String>,
}

impl RecordRule for CategoryAllowed {
    fn id(&self) -> &str {
        CATEGORY_NOT_ALLOWED
    }

    fn check(&self, record: &CanonicalRecord) -> bool {
        self.allowed.contains(&record.category)
    }
}

struct NonNegativePrice;

impl RecordRule for NonNegativePrice {
    fn id(&self) -> &str {
        NEGATIVE_PRICE
    }

    fn check(&self, record: &CanonicalRecord) -> bool {
        !record.price.is_sign_negative() || record.price.is_zero()
    }
}

pub struct Validator {
    rules: Vec<Box<dyn RecordRule>>,
}

impl Validator {
    /// Builds the standard rule set: `empty_id`, `empty_name`,
    /// `category_not_allowed`, `negative_price`.
    #[must_use]
    pub fn from_config(config: &ValidationConfig) -> Self {
        let allowed = config
            .allowed_categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            rules: vec![
                Box::new(NonEmptyId),
                Box::new(NonEmptyName),
                Box::new(CategoryAllowed { allowed }),
                Box::new(NonNegativePrice),
            ],
        }
    }

    /// Appends a rule that runs after the standard ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl RecordRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Applies every rule to one record.
    #[must_use]
    pub fn validate(&self, record: &CanonicalRecord) -> ValidationResult {
        let violations = self
            .rules
            .iter()
            .filter(|rule| !rule.check(record))
            .map(|rule| rule.id().to_string())
            .collect();
        ValidationResult::from_violations(violations)
    }

    /// Validates a batch, preserving input order, and flags duplicate ids.
    #[must_use]
    pub fn validate_batch(&self, records: Vec<CanonicalRecord>) -> Vec<ValidatedRecord> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for record in &records {
            if !record.id.is_empty() {
                *seen.entry(record.id.clone()).or_default() += 1;
            }
        }

        records
            .into_iter()
            .map(|record| {
                let mut validation = self.validate(&record);
                if seen.get(&record.id).is_some_and(|count| *count > 1) {
                    validation.add_violation(DUPLICATE_ID);
                }
                ValidatedRecord { record, validation }
            })
            .collect()
    }
}
