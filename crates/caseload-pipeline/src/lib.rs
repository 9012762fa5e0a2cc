//! The caseload loading pipeline.
//!
//! Raw records flow through the dimension [`resolver`], the record normalizer
//! (in `caseload-core`, optionally fanned out by the [`partition`] module),
//! and the [`loader`], all inside a [`tuning`] window. [`Pipeline`] ties the
//! stages together and is generic over any
//! [`CaseStore`](caseload_core::store::CaseStore).

pub mod config;
pub mod error;
pub mod loader;
pub mod partition;
pub mod pipeline;
pub mod resolver;
pub mod tuning;

pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use pipeline::{LoadMode, Pipeline};

#[cfg(test)]
mod tests;
