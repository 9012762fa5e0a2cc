//! `caseload`: load COVID-19 country and case data into the store.
//!
//! # Usage
//!
//! ```
//! caseload check
//! caseload countries countries.json
//! caseload cases cases.json --source disease.sh
//! caseload cases upload.json --sequential --source upload.csv
//! caseload vaccinations vaccinations.json
//! ```
//!
//! Settings come from `caseload.toml` (or `--config`), overridden by
//! `CASELOAD__*` environment variables, e.g. `CASELOAD__LOADER__BATCH__BATCH_SIZE=500`.

use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use caseload_core::{country::NewCountry, record::RawRecord};
use caseload_pipeline::{LoadMode, LoaderConfig, Pipeline};
use caseload_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "COVID-19 case loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "caseload.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Check that the store is reachable.
  Check,
  /// Register countries from a JSON array of country descriptors.
  Countries { file: PathBuf },
  /// Load a JSON array of raw case records.
  Cases {
    file:       PathBuf,
    /// Normalize on a single task, preserving NULL metrics.
    #[arg(long)]
    sequential: bool,
    /// Provenance label for every loaded row.
    #[arg(long)]
    source:     Option<String>,
  },
  /// Load a JSON array of raw vaccination records.
  Vaccinations {
    file:   PathBuf,
    #[arg(long)]
    source: Option<String>,
  },
}

/// Shape of `caseload.toml`.
#[derive(Deserialize)]
#[serde(default)]
struct AppConfig {
  store_path: PathBuf,
  loader:     LoaderConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("caseload.db"),
      loader:     LoaderConfig::default(),
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CASELOAD").separator("__"))
    .build()
    .context("failed to read config file")?;

  let app_cfg: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise AppConfig")?;

  let store = SqliteStore::open(&app_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", app_cfg.store_path))?;
  let default_source = app_cfg.loader.source.clone();
  let pipeline = Pipeline::new(store, app_cfg.loader);

  match cli.command {
    Command::Check => {
      pipeline.check().await.context("store is unreachable")?;
      println!("ok");
    }
    Command::Countries { file } => {
      let countries: Vec<NewCountry> = read_json(&file)?;
      let map = pipeline
        .register_countries(countries)
        .await
        .context("failed to register countries")?;
      println!("{} countries", map.len());
    }
    Command::Cases {
      file,
      sequential,
      source,
    } => {
      let rows: Vec<RawRecord> = read_json(&file)?;
      let mode = if sequential {
        LoadMode::Sequential
      } else {
        LoadMode::Parallel
      };
      let source = source.unwrap_or(default_source);
      let loaded = pipeline.load_cases(rows, &source, mode).await;
      report(loaded)?;
    }
    Command::Vaccinations { file, source } => {
      let rows: Vec<RawRecord> = read_json(&file)?;
      let source = source.unwrap_or(default_source);
      let loaded = pipeline.load_vaccinations(rows, &source).await;
      report(loaded)?;
    }
  }

  Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
  let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Zero rows is a pipeline-level failure; downstream steps must not run.
fn report(loaded: usize) -> anyhow::Result<()> {
  if loaded == 0 {
    bail!("no rows were loaded");
  }
  println!("{loaded} rows loaded");
  Ok(())
}
