//! Tabular cell values.
//!
//! Raw records arrive with whatever the extractor produced (numbers from JSON,
//! strings from CSV uploads). Fact rows are encoded into the same shape before
//! they reach a store, so one enum serves both directions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of a tabular batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  #[default]
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("NULL"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Real(r) => write!(f, "{r}"),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self { Self::Real(v) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[test]
  fn json_cells_pick_the_narrowest_variant() {
    let cells: BTreeMap<String, Value> = serde_json::from_str(
      r#"{"a": null, "b": 12, "c": 1.5, "d": "7", "e": 18446744073709551615}"#,
    )
    .unwrap();

    assert_eq!(cells["a"], Value::Null);
    assert_eq!(cells["b"], Value::Integer(12));
    assert_eq!(cells["c"], Value::Real(1.5));
    assert_eq!(cells["d"], Value::Text("7".into()));
    assert!(matches!(cells["e"], Value::Real(_)));
  }

  #[test]
  fn option_none_becomes_null() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some(3_i64)), Value::Integer(3));
  }
}
