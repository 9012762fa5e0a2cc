//! The SQLite implementation of [`CaseStore`].

use std::{path::Path, sync::Arc};

use caseload_core::{
  copy::decode_line,
  country::{Country, CountryInsert, CountryMap, NewCountry},
  fact::FactTable,
  store::CaseStore,
  value::Value,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    COUNTRY_COLUMNS, decode_country, insert_sql, is_identifier, is_setting_value,
    is_unique_violation, rows_per_statement, to_sql,
  },
  schema::{BUSY_TIMEOUT, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A caseload store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Clones share
/// one connection, so session parameters set through one clone apply to all.
/// Separate [`SqliteStore::open`] calls on the same file get separate
/// connections and serialize their writes through SQLite's file lock.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read the current integer value of a pragma on this connection.
  ///
  /// `None` when the pragma yields no row, as `mmap_size` does on an
  /// in-memory database.
  pub async fn pragma(&self, name: &str) -> Result<Option<i64>> {
    if !is_identifier(name) {
      return Err(Error::InvalidSetting(name.to_owned()));
    }
    let sql = format!("PRAGMA {name}");

    let value = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0)).optional()?))
      .await?;
    Ok(value)
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Country dimension ─────────────────────────────────────────────────────

  async fn country_map(&self) -> Result<CountryMap> {
    let map = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare_cached("SELECT country_name, country_id FROM countries")?;
        let map = stmt
          .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<CountryMap>>()?;
        Ok(map)
      })
      .await?;
    Ok(map)
  }

  async fn list_countries(&self) -> Result<Vec<Country>> {
    let countries = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {COUNTRY_COLUMNS} FROM countries ORDER BY country_id"
        ))?;
        let rows = stmt
          .query_map([], decode_country)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(countries)
  }

  async fn insert_countries(&self, countries: Vec<NewCountry>) -> Result<CountryInsert> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = CountryInsert::default();
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO countries (country_name, country_code, continent, population)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for c in countries {
            // A failed statement is rolled back on its own; the transaction
            // stays open for the remaining rows.
            let result =
              stmt.execute(rusqlite::params![c.name, c.code, c.continent, c.population]);
            match result {
              Ok(_) => outcome.inserted += 1,
              Err(e) if is_unique_violation(&e) => outcome.already_present.push(c.name),
              Err(e) => return Err(e.into()),
            }
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;
    Ok(outcome)
  }

  // ── Fact writes ───────────────────────────────────────────────────────────

  async fn copy_in(&self, table: FactTable, data: String) -> Result<usize> {
    let copied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut copied = 0;
        {
          let mut stmt = tx.prepare_cached(&insert_sql(table, 1))?;
          for (i, line) in data.lines().enumerate() {
            let cells = match decode_line(line, i + 1, table.columns()) {
              Ok(cells) => cells,
              // Dropping `tx` uncommitted rolls back every line so far.
              Err(e) => return Ok(Err(e)),
            };
            stmt.execute(rusqlite::params_from_iter(cells.into_iter().map(to_sql)))?;
            copied += 1;
          }
        }
        tx.commit()?;
        Ok(Ok(copied))
      })
      .await??;
    Ok(copied)
  }

  async fn insert_batch(&self, table: FactTable, rows: Arc<Vec<Vec<Value>>>) -> Result<usize> {
    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        for group in rows.chunks(rows_per_statement(table)) {
          let mut stmt = tx.prepare_cached(&insert_sql(table, group.len()))?;
          let params = group.iter().flatten().cloned().map(to_sql);
          inserted += stmt.execute(rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;
    Ok(inserted)
  }

  async fn count_rows(&self, table: FactTable) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
      .await?;
    Ok(usize::try_from(count).unwrap_or_default())
  }

  // ── Session ───────────────────────────────────────────────────────────────

  async fn set_session_parameter(&self, name: String, value: String) -> Result<()> {
    if !is_identifier(&name) {
      return Err(Error::InvalidSetting(name));
    }
    if !is_setting_value(&value) {
      return Err(Error::InvalidSetting(value));
    }
    let sql = format!("PRAGMA {name} = {value}");

    self
      .conn
      .call(move |conn| {
        // Some pragmas echo the new value back as a row.
        conn.query_row(&sql, [], |_| Ok(())).or_else(|e| match e {
          rusqlite::Error::QueryReturnedNoRows => Ok(()),
          e => Err(e),
        })?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn refresh_statistics(&self, table: String) -> Result<()> {
    if !is_identifier(&table) {
      return Err(Error::InvalidSetting(table));
    }
    let sql = format!("ANALYZE {table}");

    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
