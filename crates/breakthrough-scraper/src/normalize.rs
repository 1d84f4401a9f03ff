//! Normalization from raw listing items to [`breakthrough_core::CanonicalRecord`].
//!
//! Source payloads disagree on field names, so each canonical field is looked
//! up through a short alias list, first hit wins. `id`, `name` and `price`
//! are required; a missing or unusable value makes the whole item
//! [`ScraperError::MalformedItem`]. Blank ids and names pass through here and
//! are left to the validator.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use breakthrough_core::CanonicalRecord;
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::ScraperError;
use crate::parse::RawItem;
use crate::time::{Clock, SystemClock};

const ID_KEYS: &[&str] = &["id", "listing_id", "_id"];
const NAME_KEYS: &[&str] = &["name", "title"];
const CATEGORY_KEYS: &[&str] = &["category", "product_type", "category_name"];
const PRICE_KEYS: &[&str] = &["price", "price_text", "prices.price"];

/// Optional currency marker, then a decimal whose commas, if any, separate
/// three-digit groups. Whitespace is stripped before matching.
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:usd|us\$|\$|€|£)?(-?(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d*\.?\d+))(?:usd)?$")
        .expect("valid regex")
});

/// Stamps each normalized record with the time it was produced.
pub struct Normalizer {
    clock: Arc<dyn Clock>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Normalizer {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current time according to this normalizer's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Normalizes one raw item scraped for `location` from page `source_page`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MalformedItem`] if a required field is missing
    /// or its value cannot be interpreted.
    pub fn normalize(
        &self,
        item: &RawItem,
        location: &str,
        source_page: u32,
    ) -> Result<CanonicalRecord, ScraperError> {
        normalize_item(item, location, source_page, self.clock.now())
    }
}

/// Pure normalization with an explicit timestamp.
///
/// # Errors
///
/// See [`Normalizer::normalize`].
pub fn normalize_item(
    item: &RawItem,
    location: &str,
    source_page: u32,
    scraped_at: DateTime<Utc>,
) -> Result<CanonicalRecord, ScraperError> {
    if !item.0.is_object() {
        return Err(malformed("item is not a JSON object"));
    }

    let id = match lookup(item, ID_KEYS) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => return Err(malformed(format!("unusable id {other}"))),
        None => return Err(malformed("missing id")),
    };

    let name = match lookup(item, NAME_KEYS) {
        Some(Value::String(s)) => collapse_whitespace(s),
        Some(other) => return Err(malformed(format!("unusable name {other} for id {id:?}"))),
        None => return Err(malformed(format!("missing name for id {id:?}"))),
    };

    let price = match lookup(item, PRICE_KEYS) {
        Some(value) => price_value(value)
            .map_err(|reason| malformed(format!("{reason} for id {id:?}")))?,
        None => return Err(malformed(format!("missing price for id {id:?}"))),
    };

    Ok(CanonicalRecord {
        id,
        name,
        category: category(item),
        price,
        location: location.trim().to_string(),
        scraped_at,
        source_page,
    })
}

/// Parses a display price such as `"$12.50"`, `"1,250 USD"` or `"7"`.
///
/// # Errors
///
/// Returns [`ScraperError::MalformedItem`] for text that is not a
/// non-negative decimal amount.
pub fn parse_price(raw: &str) -> Result<Decimal, ScraperError> {
    parse_price_text(raw).map_err(malformed)
}

fn parse_price_text(raw: &str) -> Result<Decimal, String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = PRICE_RE
        .captures(&compact)
        .ok_or_else(|| format!("unparsable price {raw:?}"))?;

    let mut digits = caps[1].replace(',', "");
    if let Some(rest) = digits.strip_prefix("-.") {
        digits = format!("-0.{rest}");
    } else if digits.starts_with('.') {
        digits.insert(0, '0');
    }

    let price =
        Decimal::from_str(&digits).map_err(|e| format!("unparsable price {raw:?}: {e}"))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("negative price {raw:?}"));
    }
    Ok(price.abs())
}

fn price_value(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::String(s) => parse_price_text(s),
        Value::Number(n) => parse_price_text(&n.to_string()),
        // Some listings nest the amount, e.g. {"price": {"amount": 25}}.
        Value::Object(map) => map
            .get("amount")
            .or_else(|| map.get("price"))
            .ok_or_else(|| "price object has no amount".to_string())
            .and_then(price_value),
        other => Err(format!("unusable price {other}")),
    }
}

fn category(item: &RawItem) -> String {
    match lookup(item, CATEGORY_KEYS) {
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(Value::Object(map)) => map
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// First non-null value among `keys`.
fn lookup<'a>(item: &'a RawItem, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(key))
        .find(|value| !value.is_null())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(reason: impl Into<String>) -> ScraperError {
    ScraperError::MalformedItem {
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
