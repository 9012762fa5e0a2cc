//! Loader configuration.
//!
//! Every field has a default, so an empty config file (or none at all) yields
//! a working loader. The binary layers a TOML file under `CASELOAD__*`
//! environment variables; library callers build these directly.

use std::thread;

use serde::{Deserialize, Serialize};

/// Upper bound on parallel normalization workers, whatever the config says.
pub const MAX_WORKERS: usize = 4;

// ─── Batched inserts ─────────────────────────────────────────────────────────

/// Sizing of the batched-insert fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
  /// Rows per batch on the first attempt.
  pub batch_size:     usize,
  /// A failed batch is retried as sub-batches this many times smaller.
  pub shrink_factor:  usize,
  /// Batches of this size or smaller are not retried; their failure is
  /// reported and the rows are dropped. Zero behaves as one.
  pub min_batch_size: usize,
}

impl Default for BatchConfig {
  fn default() -> Self {
    Self {
      batch_size:     1000,
      shrink_factor:  5,
      min_batch_size: 1,
    }
  }
}

impl BatchConfig {
  /// Size of the sub-batches a failed batch of `len` rows is split into.
  pub fn shrunk(&self, len: usize) -> usize { (len / self.shrink_factor.max(2)).max(1) }

  /// The effective retry floor. A single row cannot be split further.
  pub fn floor(&self) -> usize { self.min_batch_size.max(1) }
}

// ─── Parallel normalization ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
  /// Requested worker count; capped by [`MAX_WORKERS`] and the number of
  /// available cores.
  pub max_workers:    usize,
  /// Lower bound on rows per chunk.
  pub min_chunk_rows: usize,
}

impl Default for ParallelConfig {
  fn default() -> Self {
    Self {
      max_workers:    MAX_WORKERS,
      min_chunk_rows: 1000,
    }
  }
}

impl ParallelConfig {
  /// Effective worker count, always at least one.
  pub fn workers(&self) -> usize {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    self.max_workers.clamp(1, MAX_WORKERS).min(cores)
  }
}

// ─── Session tuning ──────────────────────────────────────────────────────────

/// One session parameter: the value applied for the load window and the value
/// restored after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSetting {
  pub name:    String,
  pub tuned:   String,
  pub restore: String,
}

impl SessionSetting {
  pub fn new(name: &str, tuned: &str, restore: &str) -> Self {
    Self {
      name:    name.to_owned(),
      tuned:   tuned.to_owned(),
      restore: restore.to_owned(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
  pub enabled:        bool,
  pub settings:       Vec<SessionSetting>,
  /// Tables whose statistics are refreshed after the load window.
  pub analyze_tables: Vec<String>,
}

impl Default for TuningConfig {
  fn default() -> Self {
    Self {
      enabled:        true,
      settings:       vec![
        SessionSetting::new("cache_size", "-65536", "-2000"),
        SessionSetting::new("mmap_size", "134217728", "0"),
      ],
      analyze_tables: vec!["countries".into(), "covid_cases".into()],
    }
  }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
  /// Provenance label stamped on every loaded row unless overridden per load.
  pub source:   String,
  pub batch:    BatchConfig,
  pub parallel: ParallelConfig,
  pub tuning:   TuningConfig,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      source:   "disease.sh".into(),
      batch:    BatchConfig::default(),
      parallel: ParallelConfig::default(),
      tuning:   TuningConfig::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_remaining_defaults() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        "source = \"upload.csv\"\n[batch]\nbatch_size = 50\n",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: LoaderConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.source, "upload.csv");
    assert_eq!(cfg.batch.batch_size, 50);
    assert_eq!(cfg.batch.shrink_factor, 5);
    assert_eq!(cfg.parallel, ParallelConfig::default());
    assert!(cfg.tuning.enabled);
  }

  #[test]
  fn workers_are_capped() {
    let many = ParallelConfig { max_workers: 64, ..Default::default() };
    let none = ParallelConfig { max_workers: 0, ..Default::default() };
    assert!(many.workers() <= MAX_WORKERS);
    assert_eq!(none.workers(), 1);
  }

  #[test]
  fn shrinking_reaches_single_rows() {
    let batch = BatchConfig::default();
    assert_eq!(batch.shrunk(1000), 200);
    assert_eq!(batch.shrunk(8), 1);
    assert_eq!(batch.shrunk(1), 1);
  }

  #[test]
  fn a_zero_floor_is_treated_as_one() {
    let zero = BatchConfig { min_batch_size: 0, ..Default::default() };
    assert_eq!(zero.floor(), 1);
    assert_eq!(BatchConfig { min_batch_size: 5, ..Default::default() }.floor(), 5);
  }
}
