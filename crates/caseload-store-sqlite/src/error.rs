//! Error type for `caseload-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] caseload_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A session parameter or table name that is not a plain SQL token.
  #[error("invalid setting: {0:?}")]
  InvalidSetting(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
