use std::{sync::atomic::Ordering, time::Duration};

use caseload_core::{
  country::{CountryMap, NewCountry},
  fact::{CaseRecord, FactTable},
  normalize::Normalizer,
  store::CaseStore,
};

use super::support::{FlakyStore, case, day, sqlite};
use crate::{config::BatchConfig, loader::BulkLoader};

/// `n` normalized rows for a freshly inserted country.
async fn rows(store: &FlakyStore, n: u32) -> (CountryMap, Vec<CaseRecord>) {
  store
    .insert_countries(vec![NewCountry::named("Peru")])
    .await
    .unwrap();
  let map = store.country_map().await.unwrap();
  let raw: Vec<_> = (1..=n).map(|d| case("Peru", d, 10 * d as i64, 10, 0)).collect();
  let rows = Normalizer::new(&map, "test")
    .stamped(day(28))
    .cases(&raw)
    .rows;
  (map, rows)
}

fn orphan(mut row: CaseRecord) -> CaseRecord {
  row.country_id += 1_000;
  row
}

#[tokio::test]
async fn clean_batches_take_the_copy_path() {
  let store = FlakyStore::new(sqlite().await);
  let (_, rows) = rows(&store, 12).await;
  let config = BatchConfig::default();

  let loaded = BulkLoader::new(&store, &config).load(&rows).await;

  assert_eq!(loaded, 12);
  assert_eq!(store.faults.copy_calls.load(Ordering::SeqCst), 1);
  assert!(store.batch_sizes().is_empty());
}

#[tokio::test]
async fn forced_copy_failure_falls_back_to_batches() {
  let store = FlakyStore::new(sqlite().await);
  store.faults.fail_copy.store(true, Ordering::SeqCst);
  let (_, rows) = rows(&store, 10).await;
  let config = BatchConfig {
    batch_size: 4,
    ..Default::default()
  };

  let loaded = BulkLoader::new(&store, &config).load(&rows).await;

  assert_eq!(loaded, 10);
  assert_eq!(store.batch_sizes(), vec![4, 4, 2]);
  assert_eq!(store.count_rows(FactTable::Cases).await.unwrap(), 10);
}

#[tokio::test]
async fn fallback_loads_every_row_that_does_not_violate_a_constraint() {
  let store = FlakyStore::new(sqlite().await);
  let (_, mut rows) = rows(&store, 10).await;
  rows[7] = orphan(rows[7].clone());
  let config = BatchConfig {
    batch_size: 10,
    ..Default::default()
  };

  let loaded = BulkLoader::new(&store, &config).load(&rows).await;

  // The copy rolled back entirely; the fallback shrank 10 → 2 → 1 around
  // the single bad row.
  assert_eq!(loaded, 9);
  assert_eq!(store.count_rows(FactTable::Cases).await.unwrap(), 9);
  assert_eq!(store.batch_sizes(), vec![10, 2, 2, 2, 2, 1, 1, 2]);
}

#[tokio::test]
async fn failures_at_the_floor_are_reported_not_retried() {
  let store = FlakyStore::new(sqlite().await);
  let (_, mut rows) = rows(&store, 10).await;
  rows[0] = orphan(rows[0].clone());
  let config = BatchConfig {
    batch_size:     10,
    shrink_factor:  5,
    min_batch_size: 5,
  };

  let loaded = BulkLoader::new(&store, &config).load(&rows).await;

  // The first sub-batch of two holds the bad row and is at the floor, so
  // its good neighbour is lost with it.
  assert_eq!(loaded, 8);
  assert_eq!(store.batch_sizes(), vec![10, 2, 2, 2, 2, 2]);
}

#[tokio::test]
async fn a_zero_floor_still_terminates() {
  let store = FlakyStore::new(sqlite().await);
  let (_, mut rows) = rows(&store, 3).await;
  rows[1] = orphan(rows[1].clone());
  let config = BatchConfig {
    batch_size:     3,
    shrink_factor:  5,
    min_batch_size: 0,
  };

  let loader = BulkLoader::new(&store, &config);
  let load = loader.load(&rows);
  let loaded = tokio::time::timeout(Duration::from_secs(5), load)
    .await
    .expect("retry loop terminates");

  assert_eq!(loaded, 2);
  assert_eq!(store.batch_sizes(), vec![3, 1, 1, 1]);
}

#[tokio::test]
async fn earlier_batches_stay_committed_when_a_later_one_fails() {
  let store = FlakyStore::new(sqlite().await);
  store.faults.fail_copy.store(true, Ordering::SeqCst);
  let (_, mut rows) = rows(&store, 6).await;
  rows[5] = orphan(rows[5].clone());
  let config = BatchConfig {
    batch_size:     3,
    shrink_factor:  5,
    min_batch_size: 3,
  };

  let loaded = BulkLoader::new(&store, &config).load(&rows).await;

  assert_eq!(loaded, 3);
  assert_eq!(store.count_rows(FactTable::Cases).await.unwrap(), 3);
}

#[tokio::test]
async fn nothing_to_load_touches_nothing() {
  let store = FlakyStore::new(sqlite().await);
  let config = BatchConfig::default();

  let loaded = BulkLoader::new(&store, &config).load::<CaseRecord>(&[]).await;

  assert_eq!(loaded, 0);
  assert_eq!(store.faults.copy_calls.load(Ordering::SeqCst), 0);
}
