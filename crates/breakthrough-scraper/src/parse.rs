//! Turning a fetched page body into raw listing items.
//!
//! The target catalog's markup is not fixed, so parsing sits behind the
//! [`PageParser`] trait. [`JsonPageParser`] handles JSON listing endpoints
//! where the items array and the "more pages" flag live at configurable
//! JSON pointers, e.g.
//!
//! ```text
//! { "data": { "listings": [ {...}, {...} ] }, "meta": { "has_next_page": true } }
//! ```

use breakthrough_core::ScraperConfig;
use serde_json::Value;

use crate::client::RawResponse;
use crate::error::ScraperError;

/// One listing exactly as the source returned it. Shape is source-dependent
/// and may be missing fields; the normalizer decides what is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem(pub Value);

impl RawItem {
    /// Looks up a field by key, or by a dotted path such as `"prices.price"`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.0, |value, key| value.as_object()?.get(key))
    }
}

impl From<Value> for RawItem {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Items parsed from one catalog page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// 1-based page index this result came from.
    pub page_index: u32,
    pub items: Vec<RawItem>,
    pub has_next_page: bool,
}

pub trait PageParser: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] or [`ScraperError::PageShape`]
    /// when the body cannot be interpreted as a listings page.
    fn parse(&self, page_index: u32, response: &RawResponse) -> Result<PageResult, ScraperError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPageParser {
    items_pointer: String,
    has_next_pointer: String,
}

impl JsonPageParser {
    /// An empty `items_pointer` means the body itself is the items array; an
    /// empty `has_next_pointer` means the body carries no pagination flag.
    #[must_use]
    pub fn new(items_pointer: impl Into<String>, has_next_pointer: impl Into<String>) -> Self {
        Self {
            items_pointer: items_pointer.into(),
            has_next_pointer: has_next_pointer.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(&config.items_pointer, &config.has_next_pointer)
    }
}

impl PageParser for JsonPageParser {
    fn parse(&self, page_index: u32, response: &RawResponse) -> Result<PageResult, ScraperError> {
        let context = format!("page {page_index} from {}", response.url);
        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| ScraperError::Deserialize {
                context: context.clone(),
                source: e,
            })?;

        let items = match body.pointer(&self.items_pointer) {
            Some(Value::Array(items)) => items.iter().cloned().map(RawItem).collect(),
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(ScraperError::PageShape {
                    context,
                    reason: format!(
                        "expected an array at '{}', found {}",
                        self.items_pointer,
                        json_kind(other)
                    ),
                })
            }
            None => {
                return Err(ScraperError::PageShape {
                    context,
                    reason: format!("no listings at '{}'", self.items_pointer),
                })
            }
        };

        // Without an explicit flag, keep paging until an empty page or the
        // page budget ends the run.
        let has_next_page = if self.has_next_pointer.is_empty() {
            true
        } else {
            match body.pointer(&self.has_next_pointer) {
                Some(Value::Bool(flag)) => *flag,
                _ => true,
            }
        };

        Ok(PageResult {
            page_index,
            items,
            has_next_page,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
