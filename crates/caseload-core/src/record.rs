//! Raw records as produced by the extraction layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

static NULL: Value = Value::Null;

/// One row of extractor output.
///
/// Only `country` and `date` are structural; every other column lands in
/// `fields` and is picked up by name during normalization. Columns the
/// normalizer does not know are carried along and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  pub country: String,
  /// Date-like text; see [`crate::normalize::coerce_date`] for the accepted
  /// shapes.
  pub date:    String,
  #[serde(flatten)]
  pub fields:  BTreeMap<String, Value>,
}

impl RawRecord {
  pub fn new(country: impl Into<String>, date: impl Into<String>) -> Self {
    Self {
      country: country.into(),
      date:    date.into(),
      fields:  BTreeMap::new(),
    }
  }

  /// Builder-style setter, mostly for tests and adapters.
  pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.fields.insert(column.to_owned(), value.into());
    self
  }

  /// The cell for `column`, or [`Value::Null`] if the column is absent.
  pub fn field(&self, column: &str) -> &Value {
    self.fields.get(column).unwrap_or(&NULL)
  }
}
