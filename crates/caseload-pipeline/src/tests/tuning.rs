use std::time::Duration;

use super::support::{FlakyStore, sqlite, sqlite_file};
use crate::{
  config::{SessionSetting, TuningConfig},
  tuning::with_session_tuning,
};

fn calls(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
  pairs
    .iter()
    .map(|(n, v)| (n.to_string(), v.to_string()))
    .collect()
}

#[tokio::test]
async fn parameters_are_applied_then_restored_around_the_load() {
  let (_dir, inner) = sqlite_file().await;
  let store = FlakyStore::new(inner);
  let config = TuningConfig::default();

  let inside = with_session_tuning(&store, &config, async {
    let cache = store.inner.pragma("cache_size").await.unwrap();
    let mmap = store.inner.pragma("mmap_size").await.unwrap();
    (cache, mmap)
  })
  .await;

  assert_eq!(inside, (Some(-65536), Some(134_217_728)));
  assert_eq!(store.inner.pragma("cache_size").await.unwrap(), Some(-2000));
  assert_eq!(store.inner.pragma("mmap_size").await.unwrap(), Some(0));
  assert_eq!(
    store.session_calls(),
    calls(&[
      ("cache_size", "-65536"),
      ("mmap_size", "134217728"),
      ("cache_size", "-2000"),
      ("mmap_size", "0"),
    ])
  );
  assert_eq!(store.analyzed(), vec!["countries", "covid_cases"]);
}

#[tokio::test]
async fn a_refused_parameter_does_not_block_the_others_or_the_load() {
  let (_dir, inner) = sqlite_file().await;
  let store = FlakyStore::new(inner);
  store
    .faults
    .denied
    .lock()
    .unwrap()
    .insert("cache_size".to_string());
  let config = TuningConfig::default();

  let out = with_session_tuning(&store, &config, async { 42 }).await;

  assert_eq!(out, 42);
  assert_eq!(store.session_calls().len(), 4);
  assert_eq!(store.inner.pragma("mmap_size").await.unwrap(), Some(0));
  assert_eq!(store.analyzed().len(), 2);
}

#[tokio::test]
async fn unknown_statistics_table_is_logged_and_ignored() {
  let store = FlakyStore::new(sqlite().await);
  let config = TuningConfig {
    analyze_tables: vec!["missing_table".into(), "covid_cases".into()],
    ..Default::default()
  };

  with_session_tuning(&store, &config, async {}).await;

  assert_eq!(store.analyzed(), vec!["missing_table", "covid_cases"]);
}

#[tokio::test]
async fn disabled_tuning_runs_the_load_untouched() {
  let store = FlakyStore::new(sqlite().await);
  let config = TuningConfig {
    enabled: false,
    ..Default::default()
  };

  let out = with_session_tuning(&store, &config, async { "loaded" }).await;

  assert_eq!(out, "loaded");
  assert!(store.session_calls().is_empty());
  assert!(store.analyzed().is_empty());
}

#[tokio::test]
async fn restoration_still_runs_when_the_load_panics() {
  let store = FlakyStore::new(sqlite().await);
  let config = TuningConfig {
    settings: vec![SessionSetting::new("cache_size", "-4096", "-1000")],
    ..Default::default()
  };

  let task_store = store.clone();
  let joined = tokio::spawn(async move {
    with_session_tuning(&task_store, &config, async { panic!("load blew up") }).await
  })
  .await;
  assert!(joined.is_err());

  // The restore is spawned from the guard's drop; give it a moment.
  for _ in 0..100 {
    if store.analyzed().len() == 2 {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(store.inner.pragma("cache_size").await.unwrap(), Some(-1000));
  assert_eq!(store.analyzed().len(), 2);
}
