//! The bulk loader.
//!
//! A normalized batch is first streamed through the store's bulk-copy path in
//! a single transaction. If that fails for any reason, nothing from it is
//! committed and the batch is re-sent through parameterized multi-row inserts,
//! one transaction per batch. A failing insert batch is split into smaller
//! sub-batches and retried until the configured floor; rows in a batch that
//! still fails at the floor are reported and dropped.

use std::{collections::VecDeque, sync::Arc};

use caseload_core::{
  copy::encode_rows,
  fact::{FactRow, FactTable},
  store::CaseStore,
  value::Value,
};
use tracing::{debug, error, info, warn};

use crate::{Error, Result, config::BatchConfig};

type Batch = Vec<Vec<Value>>;

pub struct BulkLoader<'s, S> {
  store:  &'s S,
  config: &'s BatchConfig,
}

impl<'s, S: CaseStore> BulkLoader<'s, S> {
  pub fn new(store: &'s S, config: &'s BatchConfig) -> Self { Self { store, config } }

  /// Insert `rows` and return how many were committed.
  ///
  /// Never fails: every error is contained and logged, and the count reflects
  /// exactly what was committed.
  pub async fn load<R: FactRow>(&self, rows: &[R]) -> usize {
    if rows.is_empty() {
      return 0;
    }
    let table = R::TABLE;
    let values: Vec<_> = rows.iter().map(FactRow::to_values).collect();

    match self.copy(table, &values).await {
      Ok(copied) => {
        info!(rows = copied, table = table.name(), "bulk copy committed");
        return copied;
      }
      Err(e) => warn!(error = %e, "bulk copy failed; falling back to batched inserts"),
    }

    let inserted = self.insert_batched(table, values).await;
    info!(rows = inserted, table = table.name(), "batched inserts committed");
    inserted
  }

  async fn copy(&self, table: FactTable, values: &[Vec<Value>]) -> Result<usize> {
    let data = encode_rows(values);
    self.store.copy_in(table, data).await.map_err(Error::store)
  }

  /// The fallback path: fixed-size batches with shrink-and-retry on failure.
  pub async fn insert_batched(&self, table: FactTable, values: Batch) -> usize {
    let floor = self.config.floor();
    let mut pending = split(values, self.config.batch_size.max(1));
    let mut committed = 0;
    let mut dropped = 0;

    while let Some(batch) = pending.pop_front() {
      let len = batch.len();
      let batch = Arc::new(batch);
      match self.store.insert_batch(table, batch.clone()).await {
        Ok(n) => committed += n,
        Err(e) if len > floor => {
          let size = self.config.shrunk(len);
          debug!(rows = len, retry_size = size, error = %e, "batch failed; retrying smaller");
          // The store has released its handle by now, so this takes the rows
          // back without copying them.
          let batch = Arc::unwrap_or_clone(batch);
          // Sub-batches go to the front, in order, so they run before the
          // rest of the queue.
          for sub in split(batch, size).into_iter().rev() {
            pending.push_front(sub);
          }
        }
        Err(e) => {
          error!(rows = len, error = %e, "batch failed at minimum size; rows dropped");
          dropped += len;
        }
      }
    }

    if dropped > 0 {
      warn!(dropped, committed, "some rows could not be inserted");
    }
    committed
  }
}

/// Contiguous, order-preserving batches of at most `size` rows.
fn split(values: Batch, size: usize) -> VecDeque<Batch> {
  let mut batches = VecDeque::with_capacity(values.len().div_ceil(size));
  let mut rows = values.into_iter().peekable();
  while rows.peek().is_some() {
    batches.push_back(rows.by_ref().take(size).collect());
  }
  batches
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn split_preserves_order_and_remainder() {
    let rows: Batch = (0..7).map(|i| vec![Value::Integer(i)]).collect();
    let batches = split(rows, 3);
    let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(batches[2][0], vec![Value::Integer(6)]);
  }
}
