//! Shared fixtures and a fault-injecting store wrapper.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use caseload_core::{
  country::{Country, CountryInsert, CountryMap, NewCountry},
  fact::FactTable,
  record::RawRecord,
  store::CaseStore,
  value::Value,
};
use caseload_store_sqlite::{Error, Result, SqliteStore};
use chrono::NaiveDate;

use crate::config::{BatchConfig, LoaderConfig, ParallelConfig};

pub async fn sqlite() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A file-backed store; the directory lives as long as the returned guard.
pub async fn sqlite_file() -> (tempfile::TempDir, SqliteStore) {
  let dir = tempfile::tempdir().expect("temp dir");
  let store = SqliteStore::open(dir.path().join("cases.db"))
    .await
    .expect("file store");
  (dir, store)
}

pub fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2021, 3, d).unwrap() }

/// A raw case row in disease.sh shape.
pub fn case(country: &str, d: u32, total: i64, new: i64, deaths: i64) -> RawRecord {
  RawRecord::new(country, format!("3/{d}/21"))
    .with("total_cases", total)
    .with("new_cases", new)
    .with("total_deaths", deaths)
}

/// Small batches and chunks so short inputs exercise splitting.
pub fn small_config() -> LoaderConfig {
  LoaderConfig {
    batch: BatchConfig {
      batch_size: 4,
      ..Default::default()
    },
    parallel: ParallelConfig {
      max_workers:    4,
      min_chunk_rows: 2,
    },
    ..Default::default()
  }
}

// ─── FlakyStore ──────────────────────────────────────────────────────────────

/// Failure switches and call records shared by every clone of a
/// [`FlakyStore`].
#[derive(Default)]
pub struct Faults {
  pub fail_copy:     AtomicBool,
  /// Every call fails, as if the database were unreachable.
  pub offline:       AtomicBool,
  /// Session parameters the store refuses to set.
  pub denied:        Mutex<HashSet<String>>,
  pub copy_calls:    AtomicUsize,
  pub batch_sizes:   Mutex<Vec<usize>>,
  pub session_calls: Mutex<Vec<(String, String)>>,
  pub analyzed:      Mutex<Vec<String>>,
}

#[derive(Clone)]
pub struct FlakyStore {
  pub inner:  SqliteStore,
  pub faults: Arc<Faults>,
}

impl FlakyStore {
  pub fn new(inner: SqliteStore) -> Self {
    Self {
      inner,
      faults: Arc::default(),
    }
  }

  pub fn batch_sizes(&self) -> Vec<usize> { self.faults.batch_sizes.lock().unwrap().clone() }

  pub fn session_calls(&self) -> Vec<(String, String)> {
    self.faults.session_calls.lock().unwrap().clone()
  }

  pub fn analyzed(&self) -> Vec<String> { self.faults.analyzed.lock().unwrap().clone() }

  fn check_online(&self) -> Result<()> {
    if self.faults.offline.load(Ordering::SeqCst) {
      return Err(Error::InvalidSetting("injected: store offline".into()));
    }
    Ok(())
  }
}

impl CaseStore for FlakyStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self.check_online()?;
    self.inner.ping().await
  }

  async fn country_map(&self) -> Result<CountryMap> {
    self.check_online()?;
    self.inner.country_map().await
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    self.check_online()?;
    self.inner.list_countries().await
  }

  async fn insert_countries(&self, countries: Vec<NewCountry>) -> Result<CountryInsert> {
    self.check_online()?;
    self.inner.insert_countries(countries).await
  }

  async fn copy_in(&self, table: FactTable, data: String) -> Result<usize> {
    self.check_online()?;
    self.faults.copy_calls.fetch_add(1, Ordering::SeqCst);
    if self.faults.fail_copy.load(Ordering::SeqCst) {
      return Err(Error::InvalidSetting("injected: copy refused".into()));
    }
    self.inner.copy_in(table, data).await
  }

  async fn insert_batch(&self, table: FactTable, rows: Arc<Vec<Vec<Value>>>) -> Result<usize> {
    self.check_online()?;
    self.faults.batch_sizes.lock().unwrap().push(rows.len());
    self.inner.insert_batch(table, rows).await
  }

  async fn count_rows(&self, table: FactTable) -> Result<usize> {
    self.check_online()?;
    self.inner.count_rows(table).await
  }

  async fn set_session_parameter(&self, name: String, value: String) -> Result<()> {
    self.check_online()?;
    self
      .faults
      .session_calls
      .lock()
      .unwrap()
      .push((name.clone(), value.clone()));
    if self.faults.denied.lock().unwrap().contains(&name) {
      return Err(Error::InvalidSetting(format!("injected: permission denied for {name}")));
    }
    self.inner.set_session_parameter(name, value).await
  }

  async fn refresh_statistics(&self, table: String) -> Result<()> {
    self.check_online()?;
    self.faults.analyzed.lock().unwrap().push(table.clone());
    self.inner.refresh_statistics(table).await
  }
}
