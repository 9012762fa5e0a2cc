//! Error type for `caseload-pipeline`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Any backend failure. Boxed because the pipeline is generic over
  /// [`CaseStore`](caseload_core::store::CaseStore).
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self { Self::Store(Box::new(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
