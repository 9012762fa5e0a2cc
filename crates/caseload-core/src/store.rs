//! The `CaseStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `caseload-store-sqlite`). The pipeline depends on this abstraction, not on
//! any concrete backend.

use std::{future::Future, sync::Arc};

use crate::{
  country::{Country, CountryInsert, CountryMap, NewCountry},
  fact::FactTable,
  value::Value,
};

/// Abstraction over a relational store holding the country dimension and the
/// fact tables.
///
/// Fact writes are append-only. Dimension rows are inserted, never updated.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks on a multi-threaded runtime.
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Round-trip a trivial query.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Country dimension ─────────────────────────────────────────────────

  /// Read the full name → id mapping.
  fn country_map(&self) -> impl Future<Output = Result<CountryMap, Self::Error>> + Send + '_;

  fn list_countries(&self) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  /// Insert each country in its own statement inside one transaction.
  ///
  /// A uniqueness violation on a name means another writer created it
  /// first. It is reported in [`CountryInsert::already_present`] rather
  /// than as an error, and the remaining rows are still inserted.
  fn insert_countries(
    &self,
    countries: Vec<NewCountry>,
  ) -> impl Future<Output = Result<CountryInsert, Self::Error>> + Send + '_;

  // ── Fact writes ───────────────────────────────────────────────────────

  /// Stream delimited text (see [`crate::copy`]) into `table` in a single
  /// transaction. All or nothing: on error, nothing is committed.
  fn copy_in(
    &self,
    table: FactTable,
    data: String,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Insert `rows` with one multi-row parameterized statement in its own
  /// transaction. Cells are in [`FactTable::columns`] order.
  ///
  /// The rows are shared so a caller can split and retry a failed batch
  /// without having copied it up front.
  fn insert_batch(
    &self,
    table: FactTable,
    rows: Arc<Vec<Vec<Value>>>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn count_rows(&self, table: FactTable) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Session ───────────────────────────────────────────────────────────

  /// Set a transient, connection-scoped performance parameter.
  fn set_session_parameter(
    &self,
    name: String,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Refresh planner statistics for `table`.
  fn refresh_statistics(
    &self,
    table: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
