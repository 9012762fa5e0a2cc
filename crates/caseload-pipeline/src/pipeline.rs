//! Pipeline entry points.
//!
//! `raw records → resolve countries → normalize (sequential or partitioned)
//! → bulk load (inside a tuned session window) → committed row count`.
//!
//! The loading entry points never return an error. Any failure is logged and
//! reported as zero rows, which callers treat as "nothing usable was loaded".

use std::sync::Arc;

use caseload_core::{
  country::{Country, CountryMap, NewCountry},
  fact::{FactRow, FactTable},
  normalize::{Normalized, Normalizer},
  record::RawRecord,
  store::CaseStore,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{Instrument as _, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  config::LoaderConfig,
  loader::BulkLoader,
  partition::Partitioner,
  resolver::Resolver,
  tuning::with_session_tuning,
};

/// How case rows are normalized before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
  /// One pass on the calling task; missing metrics stay NULL.
  Sequential,
  /// Chunked across workers; missing metrics are zero-filled.
  #[default]
  Parallel,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Pipeline<S> {
  store:  S,
  config: LoaderConfig,
}

impl<S> Pipeline<S>
where
  S: CaseStore + Clone + 'static,
{
  pub fn new(store: S, config: LoaderConfig) -> Self { Self { store, config } }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &LoaderConfig { &self.config }

  /// Check that the store is reachable.
  pub async fn check(&self) -> Result<()> { self.store.ping().await.map_err(Error::store) }

  /// Register country descriptors and return the refreshed mapping.
  pub async fn register_countries(&self, countries: Vec<NewCountry>) -> Result<CountryMap> {
    Resolver::new(&self.store).register(countries).await
  }

  pub async fn countries(&self) -> Result<Vec<Country>> {
    self.store.list_countries().await.map_err(Error::store)
  }

  /// Load raw case records into `covid_cases`, returning the number of rows
  /// committed.
  pub async fn load_cases(&self, rows: Vec<RawRecord>, source: &str, mode: LoadMode) -> usize {
    let span = info_span!("load", run_id = %Uuid::new_v4(), table = FactTable::Cases.name());
    async {
      info!(rows = rows.len(), ?mode, source, "loading cases");
      self
        .try_load_cases(rows, source, mode)
        .await
        .unwrap_or_else(|e| {
          error!(error = %e, "case load failed");
          0
        })
    }
    .instrument(span)
    .await
  }

  /// Load raw vaccination records into `vaccinations`. Always sequential and
  /// null-preserving.
  pub async fn load_vaccinations(&self, rows: Vec<RawRecord>, source: &str) -> usize {
    let span = info_span!(
      "load",
      run_id = %Uuid::new_v4(),
      table = FactTable::Vaccinations.name(),
    );
    async {
      info!(rows = rows.len(), source, "loading vaccinations");
      self
        .try_load_vaccinations(rows, source)
        .await
        .unwrap_or_else(|e| {
          error!(error = %e, "vaccination load failed");
          0
        })
    }
    .instrument(span)
    .await
  }

  async fn try_load_cases(&self, rows: Vec<RawRecord>, source: &str, mode: LoadMode) -> Result<usize> {
    if rows.is_empty() {
      warn!("no rows to load");
      return Ok(0);
    }

    let countries = self.resolve(&rows).await?;
    let stamp = today();
    let normalized = match mode {
      LoadMode::Sequential => Normalizer::new(&countries, source).stamped(stamp).cases(&rows),
      LoadMode::Parallel => {
        Partitioner::from_config(&self.config.parallel)
          .cases(rows, Arc::new(countries), Arc::from(source), stamp)
          .await
      }
    };

    Ok(self.load_normalized(normalized).await)
  }

  async fn try_load_vaccinations(&self, rows: Vec<RawRecord>, source: &str) -> Result<usize> {
    if rows.is_empty() {
      warn!("no rows to load");
      return Ok(0);
    }

    let countries = self.resolve(&rows).await?;
    let normalized = Normalizer::new(&countries, source)
      .stamped(today())
      .vaccinations(&rows);

    Ok(self.load_normalized(normalized).await)
  }

  /// Read the mapping fresh from the store, then resolve every referenced
  /// name against it.
  async fn resolve(&self, rows: &[RawRecord]) -> Result<CountryMap> {
    let current = self.store.country_map().await.map_err(Error::store)?;
    Resolver::new(&self.store)
      .resolve(rows.iter().map(|r| r.country.as_str()), &current)
      .await
  }

  async fn load_normalized<R: FactRow>(&self, normalized: Normalized<R>) -> usize {
    if !normalized.skipped.is_empty() {
      warn!(
        rows = normalized.skipped.rows,
        countries = %normalized.skipped.summary(),
        "skipped rows with unresolved countries",
      );
    }
    if !normalized.rejected.is_empty() {
      warn!(
        rows = normalized.rejected.rows,
        problems = %normalized.rejected.summary(),
        "dropped rows that could not be coerced",
      );
    }
    if normalized.capped > 0 {
      warn!(capped = normalized.capped, "counts capped at the 64-bit range");
    }
    info!(rows = normalized.len(), fill = ?normalized.fill, "rows normalized");
    if normalized.is_empty() {
      return 0;
    }

    let loader = BulkLoader::new(&self.store, &self.config.batch);
    let loaded =
      with_session_tuning(&self.store, &self.config.tuning, loader.load(&normalized.rows)).await;
    info!(rows = loaded, "load finished");
    loaded
  }
}

fn today() -> NaiveDate { Local::now().date_naive() }
