use std::collections::BTreeMap;

use crate::value::Value;

/// An untyped row as it comes off a source: CSV row, scraped table row, or
/// API JSON object. Keys are the extractor's normalized field names; values
/// are whatever JSON shape the source produced.
pub type RawRecord = BTreeMap<String, serde_json::Value>;

/// A row that passed schema validation. Every declared field is present and
/// typed, string fields are already trimmed and case-normalized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedRecord {
    fields: BTreeMap<String, Value>,
}

impl ValidatedRecord {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn f64_field(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    pub fn i64_field(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    /// Set a field, replacing any prior value. Used for derived columns
    /// computed after validation.
    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
