//! Fork-join normalization across a small pool of blocking workers.
//!
//! The dispatcher owns the input and the resolved country mapping. Each worker
//! is a pure function of (chunk, mapping, source) and runs on the blocking
//! pool; nothing mutable is shared. The join waits for every chunk, then
//! sorts by chunk index, so the merged output is in input order regardless of
//! completion order.

use std::sync::Arc;

use caseload_core::{
  country::CountryMap,
  fact::CaseRecord,
  normalize::{FillPolicy, Normalized, Normalizer},
  record::RawRecord,
};
use chrono::NaiveDate;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info};

use crate::config::ParallelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
  workers:        usize,
  min_chunk_rows: usize,
}

impl Partitioner {
  pub fn new(workers: usize, min_chunk_rows: usize) -> Self {
    Self {
      workers:        workers.max(1),
      min_chunk_rows: min_chunk_rows.max(1),
    }
  }

  pub fn from_config(config: &ParallelConfig) -> Self {
    Self::new(config.workers(), config.min_chunk_rows)
  }

  pub fn workers(&self) -> usize { self.workers }

  /// Rows per chunk for an input of `rows` rows: two chunks per worker, but
  /// never fewer than `min_chunk_rows` rows each.
  pub fn chunk_size(&self, rows: usize) -> usize {
    (rows / (self.workers * 2)).max(self.min_chunk_rows)
  }

  /// Contiguous, order-preserving chunks.
  pub fn split(&self, rows: Vec<RawRecord>) -> Vec<Vec<RawRecord>> {
    let size = self.chunk_size(rows.len());
    let mut chunks = Vec::with_capacity(rows.len().div_ceil(size));
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
      chunks.push(rows.by_ref().take(size).collect());
    }
    chunks
  }

  /// Normalize case rows in parallel with zero-filled metrics.
  ///
  /// Rows that cannot be coerced are rejected one by one inside their chunk.
  /// A chunk whose worker panics is logged and contributes no rows; the
  /// others are unaffected.
  pub async fn cases(
    &self,
    rows: Vec<RawRecord>,
    countries: Arc<CountryMap>,
    source: Arc<str>,
    stamp: NaiveDate,
  ) -> Normalized<CaseRecord> {
    let total = rows.len();
    let chunks = self.split(rows);
    let expected = chunks.len();
    info!(rows = total, chunks = expected, workers = self.workers, "normalizing in parallel");

    let permits = Arc::new(Semaphore::new(self.workers));
    let mut set = JoinSet::new();

    for (index, chunk) in chunks.into_iter().enumerate() {
      let permits = permits.clone();
      let countries = countries.clone();
      let source = source.clone();
      set.spawn(async move {
        // The semaphore is never closed.
        let _permit = permits.acquire_owned().await.ok();
        let len = chunk.len();
        let result = tokio::task::spawn_blocking(move || {
          Normalizer::new(&countries, &source)
            .with_fill(FillPolicy::ZeroFill)
            .stamped(stamp)
            .cases(&chunk)
        })
        .await;
        (index, len, result)
      });
    }

    let mut done = Vec::with_capacity(expected);
    while let Some(joined) = set.join_next().await {
      match joined {
        Ok((index, _, Ok(normalized))) => {
          debug!(
            chunk = index,
            rows = normalized.len(),
            rejected = normalized.rejected.rows,
            "chunk normalized"
          );
          done.push((index, normalized));
        }
        Ok((index, len, Err(e))) => {
          error!(chunk = index, rows = len, error = %e, "chunk worker panicked; dropping chunk");
        }
        Err(e) => error!(error = %e, "chunk task failed"),
      }
    }

    done.sort_by_key(|(index, _)| *index);
    let mut merged = Normalized::empty(FillPolicy::ZeroFill);
    for (_, normalized) in done {
      merged.append(normalized);
    }
    merged
  }
}
