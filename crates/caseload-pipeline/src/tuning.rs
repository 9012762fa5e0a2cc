//! Transient session tuning around a bulk-load window.
//!
//! [`with_session_tuning`] applies every configured parameter, runs the load,
//! then restores every parameter and refreshes table statistics. Each step is
//! best-effort: a parameter the store refuses is logged and skipped.
//!
//! Restoration also runs if the load panics or the surrounding future is
//! dropped mid-load: a guard armed for the window spawns the restore onto the
//! current runtime from its `Drop`.

use std::future::Future;

use caseload_core::store::CaseStore;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::TuningConfig;

/// Run `load` inside a tuned session window and return its output.
pub async fn with_session_tuning<S, F, T>(store: &S, config: &TuningConfig, load: F) -> T
where
  S: CaseStore + Clone + 'static,
  F: Future<Output = T>,
{
  if !config.enabled {
    return load.await;
  }

  apply(store, config).await;
  let mut guard = RestoreGuard {
    armed: Some((store.clone(), config.clone())),
  };

  let out = load.await;
  restore(store, config).await;
  guard.disarm();
  out
}

async fn apply<S: CaseStore>(store: &S, config: &TuningConfig) {
  for setting in &config.settings {
    match store
      .set_session_parameter(setting.name.clone(), setting.tuned.clone())
      .await
    {
      Ok(()) => debug!(name = %setting.name, value = %setting.tuned, "session parameter set"),
      Err(e) => warn!(name = %setting.name, error = %e, "could not set session parameter"),
    }
  }
}

async fn restore<S: CaseStore>(store: &S, config: &TuningConfig) {
  for setting in &config.settings {
    if let Err(e) = store
      .set_session_parameter(setting.name.clone(), setting.restore.clone())
      .await
    {
      warn!(name = %setting.name, error = %e, "could not restore session parameter");
    }
  }
  for table in &config.analyze_tables {
    if let Err(e) = store.refresh_statistics(table.clone()).await {
      warn!(table = %table, error = %e, "could not refresh statistics");
    }
  }
  debug!("session parameters restored");
}

struct RestoreGuard<S: CaseStore + 'static> {
  armed: Option<(S, TuningConfig)>,
}

impl<S: CaseStore + 'static> RestoreGuard<S> {
  fn disarm(&mut self) { self.armed = None; }
}

impl<S: CaseStore + 'static> Drop for RestoreGuard<S> {
  fn drop(&mut self) {
    let Some((store, config)) = self.armed.take() else {
      return;
    };
    match Handle::try_current() {
      Ok(handle) => {
        warn!("load window ended abnormally; restoring session parameters");
        handle.spawn(async move { restore(&store, &config).await });
      }
      Err(_) => warn!("no runtime available; session parameters left tuned"),
    }
  }
}
