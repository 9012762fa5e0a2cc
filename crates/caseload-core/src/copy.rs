//! Delimited-text codec for the bulk-copy path.
//!
//! The format is PostgreSQL's text `COPY` format: one row per line, cells
//! separated by a tab, `\N` for NULL, and backslash escapes for backslash,
//! tab, newline and carriage return inside text cells. Decoding is typed by
//! the target table's [`Column`] layout, so a malformed cell fails the line.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  fact::{Column, ColumnKind},
  value::Value,
};

const NULL_MARKER: &str = "\\N";

// ─── Encode ──────────────────────────────────────────────────────────────────

/// Escape one text cell.
pub fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\t' => out.push_str("\\t"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      other => out.push(other),
    }
  }
  out
}

fn encode_cell(value: &Value, out: &mut String) {
  match value {
    Value::Null => out.push_str(NULL_MARKER),
    Value::Integer(i) => out.push_str(&i.to_string()),
    Value::Real(r) => out.push_str(&r.to_string()),
    Value::Text(s) => out.push_str(&escape(s)),
  }
}

/// Encode rows into copy text, newline-terminated.
pub fn encode_rows(rows: &[Vec<Value>]) -> String {
  let mut out = String::with_capacity(rows.len() * 128);
  for row in rows {
    for (i, value) in row.iter().enumerate() {
      if i > 0 {
        out.push('\t');
      }
      encode_cell(value, &mut out);
    }
    out.push('\n');
  }
  out
}

// ─── Decode ──────────────────────────────────────────────────────────────────

fn unescape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('t') => out.push('\t'),
      Some('n') => out.push('\n'),
      Some('r') => out.push('\r'),
      Some(other) => out.push(other),
      None => out.push('\\'),
    }
  }
  out
}

/// Decode one line of copy text (without its terminator) against `columns`.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn decode_line(line: &str, line_no: usize, columns: &[Column]) -> Result<Vec<Value>> {
  let cells: Vec<&str> = line.split('\t').collect();
  if cells.len() != columns.len() {
    return Err(Error::Copy {
      line:   line_no,
      reason: format!("expected {} cells, found {}", columns.len(), cells.len()),
    });
  }

  cells
    .into_iter()
    .zip(columns)
    .map(|(cell, column)| decode_cell(cell, column, line_no))
    .collect()
}

fn decode_cell(cell: &str, column: &Column, line_no: usize) -> Result<Value> {
  if cell == NULL_MARKER {
    return Ok(Value::Null);
  }
  let text = unescape(cell);
  let bad = |what: &str| Error::Copy {
    line:   line_no,
    reason: format!("{} is not {what}: {text:?}", column.name),
  };

  match column.kind {
    ColumnKind::Integer => text.parse().map(Value::Integer).map_err(|_| bad("an integer")),
    ColumnKind::Real => text.parse().map(Value::Real).map_err(|_| bad("a number")),
    ColumnKind::Date => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
      .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
      .map_err(|_| bad("a date")),
    ColumnKind::Text => Ok(Value::Text(text)),
  }
}
