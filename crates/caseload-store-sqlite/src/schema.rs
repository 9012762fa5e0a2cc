//! SQL schema for the caseload SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

use std::time::Duration;

/// How long a writer waits on another handle's lock before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Dimension rows are inserted once and never updated.
-- AUTOINCREMENT keeps surrogate ids from ever being reused.
CREATE TABLE IF NOT EXISTS countries (
    country_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    country_name  TEXT NOT NULL UNIQUE,
    country_code  TEXT,
    continent     TEXT,
    population    INTEGER
);

-- Append-only: repeated loads of the same country/date add new snapshots,
-- so (country_id, date) is not unique.
CREATE TABLE IF NOT EXISTS covid_cases (
    case_id              INTEGER PRIMARY KEY,
    country_id           INTEGER NOT NULL REFERENCES countries(country_id),
    date                 TEXT NOT NULL,   -- YYYY-MM-DD
    total_cases          INTEGER,
    new_cases            INTEGER,
    total_deaths         INTEGER,
    new_deaths           INTEGER,
    total_recovered      INTEGER,
    new_recovered        INTEGER,
    active_cases         INTEGER,
    critical_cases       INTEGER,
    cases_per_million    REAL,
    deaths_per_million   REAL,
    case_fatality_rate   REAL,
    new_cases_7day_avg   REAL,
    new_deaths_7day_avg  REAL,
    data_hash            TEXT NOT NULL,
    created_at           TEXT NOT NULL,   -- load date
    source               TEXT
);

CREATE TABLE IF NOT EXISTS vaccinations (
    vaccination_id      INTEGER PRIMARY KEY,
    country_id          INTEGER NOT NULL REFERENCES countries(country_id),
    date                TEXT NOT NULL,
    total_vaccinations  INTEGER,
    daily_vaccinations  INTEGER,
    vaccination_rate    REAL,
    data_hash           TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    source              TEXT
);

CREATE INDEX IF NOT EXISTS covid_cases_country_date_idx  ON covid_cases(country_id, date);
CREATE INDEX IF NOT EXISTS covid_cases_hash_idx          ON covid_cases(data_hash);
CREATE INDEX IF NOT EXISTS vaccinations_country_date_idx ON vaccinations(country_id, date);

PRAGMA user_version = 1;
";
