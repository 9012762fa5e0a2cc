//! Conversions between core types and SQLite values, plus the small amount of
//! SQL text generated per fact table.

use caseload_core::{country::Country, fact::FactTable, value::Value};
use rusqlite::{ErrorCode, Row, types::Value as SqlValue};

// ─── Cells ───────────────────────────────────────────────────────────────────

pub fn to_sql(v: Value) -> SqlValue {
  match v {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(i),
    Value::Real(f) => SqlValue::Real(f),
    Value::Text(s) => SqlValue::Text(s),
  }
}

// ─── Countries ───────────────────────────────────────────────────────────────

pub const COUNTRY_COLUMNS: &str = "country_id, country_name, country_code, continent, population";

pub fn decode_country(row: &Row<'_>) -> rusqlite::Result<Country> {
  Ok(Country {
    country_id: row.get(0)?,
    name:       row.get(1)?,
    code:       row.get(2)?,
    continent:  row.get(3)?,
    population: row.get(4)?,
  })
}

/// `true` for a `UNIQUE` constraint failure, as opposed to any other
/// constraint or error.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == ErrorCode::ConstraintViolation
        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Fact tables ─────────────────────────────────────────────────────────────

/// SQLite's default bound-parameter ceiling.
const MAX_PARAMS: usize = 32_766;

/// Rows per multi-row `INSERT` statement for `table`.
pub fn rows_per_statement(table: FactTable) -> usize {
  (MAX_PARAMS / table.columns().len()).max(1)
}

fn column_list(table: FactTable) -> String {
  table
    .columns()
    .iter()
    .map(|c| c.name)
    .collect::<Vec<_>>()
    .join(", ")
}

/// `INSERT INTO t (cols) VALUES (?, …), (?, …)` for `rows` rows.
pub fn insert_sql(table: FactTable, rows: usize) -> String {
  let width = table.columns().len();
  let tuple = format!("({})", vec!["?"; width].join(", "));
  let values = vec![tuple.as_str(); rows].join(", ");
  format!("INSERT INTO {} ({}) VALUES {values}", table.name(), column_list(table))
}

// ─── Session settings ────────────────────────────────────────────────────────

/// A bare identifier: ASCII letters, digits and `_`, not starting with a
/// digit.
pub fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A pragma value: an identifier or an optionally signed integer.
pub fn is_setting_value(s: &str) -> bool {
  let digits = s.strip_prefix('-').unwrap_or(s);
  is_identifier(s) || (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
