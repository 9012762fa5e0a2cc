//! Error types for `caseload-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot coerce {value:?} in column {column} to {target}")]
  Coerce {
    column: String,
    value:  String,
    target: &'static str,
  },

  #[error("unrecognised date: {0:?}")]
  InvalidDate(String),

  /// A line of bulk-copy text could not be decoded against the table layout.
  #[error("copy data line {line}: {reason}")]
  Copy { line: usize, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
