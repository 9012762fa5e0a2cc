//! The record normalizer: raw extractor rows → loadable fact rows.
//!
//! Per row, in order:
//!   1. resolve the country name to its surrogate id, or skip the row
//!   2. coerce the known metric columns (integers for counts, floats for rates)
//!   3. compute the content hash over the table's fixed hash fields
//!   4. stamp the load date and source label
//!
//! The normalizer is pure and synchronous; it never touches a store. Country
//! resolution must therefore be complete before it runs.
//!
//! A row whose date or metrics cannot be coerced is dropped on its own and
//! recorded in [`Normalized::rejected`]; the rest of the batch is unaffected.
//!
//! # Fill policy
//!
//! Missing metrics are handled according to a [`FillPolicy`]. The sequential
//! load path preserves NULLs; the parallel path zero-fills. Which policy
//! produced a batch is recorded on [`Normalized::fill`]. The content hash is
//! unaffected by the policy: missing hash fields always hash as zero.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  country::{CountryId, CountryMap},
  fact::{CaseRecord, VaccinationRecord},
  hash::{case_hash, vaccination_hash},
  record::RawRecord,
  value::Value,
};

// ─── Policy & results ────────────────────────────────────────────────────────

/// What a missing metric becomes in a normalized row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
  /// Missing metrics stay NULL.
  #[default]
  PreserveNulls,
  /// Missing metrics become `0` / `0.0`.
  ZeroFill,
}

/// Rows excluded because their country had no surrogate id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipReport {
  pub rows:      usize,
  pub countries: BTreeSet<String>,
}

impl SkipReport {
  pub fn is_empty(&self) -> bool { self.rows == 0 }

  pub fn merge(&mut self, other: SkipReport) {
    self.rows += other.rows;
    self.countries.extend(other.countries);
  }

  /// The distinct skipped names, truncated to the first five.
  pub fn summary(&self) -> String { truncated(&self.countries) }
}

/// Rows dropped because a cell could not be coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectReport {
  pub rows:     usize,
  /// Distinct coercion failures (column and offending value).
  pub problems: BTreeSet<String>,
}

impl RejectReport {
  pub fn is_empty(&self) -> bool { self.rows == 0 }

  pub fn merge(&mut self, other: RejectReport) {
    self.rows += other.rows;
    self.problems.extend(other.problems);
  }

  pub fn summary(&self) -> String { truncated(&self.problems) }
}

/// The first five entries, then "and N more".
fn truncated(items: &BTreeSet<String>) -> String {
  let shown: Vec<&str> = items.iter().take(5).map(String::as_str).collect();
  let rest = items.len().saturating_sub(shown.len());
  if rest == 0 {
    shown.join(", ")
  } else {
    format!("{} and {rest} more", shown.join(", "))
  }
}

/// A normalized batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<R> {
  pub rows:     Vec<R>,
  pub skipped:  SkipReport,
  pub rejected: RejectReport,
  pub fill:     FillPolicy,
  /// Count values that exceeded the 64-bit range and were capped.
  pub capped:   usize,
}

impl<R> Normalized<R> {
  pub fn empty(fill: FillPolicy) -> Self {
    Self {
      rows: Vec::new(),
      skipped: SkipReport::default(),
      rejected: RejectReport::default(),
      fill,
      capped: 0,
    }
  }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Append `other` after the rows already present.
  pub fn append(&mut self, other: Normalized<R>) {
    self.rows.extend(other.rows);
    self.skipped.merge(other.skipped);
    self.rejected.merge(other.rejected);
    self.capped += other.capped;
  }
}

// ─── Coercion ────────────────────────────────────────────────────────────────

fn coerce_err(column: &str, value: &Value, target: &'static str) -> Error {
  Error::Coerce {
    column: column.to_owned(),
    value: value.to_string(),
    target,
  }
}

/// Convert a float to a count, truncating toward zero. Values outside the
/// 64-bit range saturate and are counted in `capped`.
fn float_to_count(f: f64, capped: &mut usize) -> Option<i64> {
  if f.is_nan() {
    return None;
  }
  if f >= i64::MAX as f64 || f < i64::MIN as f64 {
    *capped += 1;
  }
  Some(f.trunc() as i64)
}

/// Coerce a cell to an integer count. NULL, NaN and blank text are missing.
pub fn coerce_count(column: &str, value: &Value, capped: &mut usize) -> Result<Option<i64>> {
  match value {
    Value::Null => Ok(None),
    Value::Integer(i) => Ok(Some(*i)),
    Value::Real(f) => Ok(float_to_count(*f, capped)),
    Value::Text(s) => {
      let s = s.trim();
      if s.is_empty() {
        return Ok(None);
      }
      if let Ok(i) = s.parse::<i64>() {
        return Ok(Some(i));
      }
      s.parse::<f64>()
        .map(|f| float_to_count(f, capped))
        .map_err(|_| coerce_err(column, value, "an integer"))
    }
  }
}

/// Coerce a cell to a floating-point rate. NULL, NaN and blank text are
/// missing.
pub fn coerce_rate(column: &str, value: &Value) -> Result<Option<f64>> {
  match value {
    Value::Null => Ok(None),
    Value::Integer(i) => Ok(Some(*i as f64)),
    Value::Real(f) if f.is_nan() => Ok(None),
    Value::Real(f) => Ok(Some(*f)),
    Value::Text(s) => {
      let s = s.trim();
      if s.is_empty() {
        return Ok(None);
      }
      match s.parse::<f64>() {
        Ok(f) if f.is_nan() => Ok(None),
        Ok(f) => Ok(Some(f)),
        Err(_) => Err(coerce_err(column, value, "a number")),
      }
    }
  }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 3] =
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a date-like string, keeping only the calendar date.
///
/// Accepts `YYYY-MM-DD`, `M/D/YY` (disease.sh timelines), `M/D/YYYY`, and
/// timestamps with either a `T` or a space separator.
pub fn coerce_date(raw: &str) -> Result<NaiveDate> {
  let s = raw.trim();
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    .or_else(|| {
      DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
    })
    .ok_or_else(|| Error::InvalidDate(raw.to_owned()))
}

// ─── Normalizer ──────────────────────────────────────────────────────────────

/// Normalizes raw batches against a resolved [`CountryMap`].
///
/// Cheap to construct; workers build their own over a shared, immutable
/// mapping.
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
  countries: &'a CountryMap,
  source:    &'a str,
  fill:      FillPolicy,
  stamp:     NaiveDate,
}

/// Per-row coercion state handed to the table-specific builders.
struct RowCtx<'r> {
  country_id: CountryId,
  date:       NaiveDate,
  raw:        &'r RawRecord,
  fill:       FillPolicy,
  capped:     usize,
}

impl RowCtx<'_> {
  /// A count as it appears in the raw record, before filling.
  fn raw_count(&mut self, column: &str) -> Result<Option<i64>> {
    coerce_count(column, self.raw.field(column), &mut self.capped)
  }

  fn fill_count(&self, v: Option<i64>) -> Option<i64> {
    match self.fill {
      FillPolicy::PreserveNulls => v,
      FillPolicy::ZeroFill => Some(v.unwrap_or(0)),
    }
  }

  fn count(&mut self, column: &str) -> Result<Option<i64>> {
    let v = self.raw_count(column)?;
    Ok(self.fill_count(v))
  }

  fn rate(&self, column: &str) -> Result<Option<f64>> {
    let v = coerce_rate(column, self.raw.field(column))?;
    Ok(match self.fill {
      FillPolicy::PreserveNulls => v,
      FillPolicy::ZeroFill => Some(v.unwrap_or(0.0)),
    })
  }
}

impl<'a> Normalizer<'a> {
  /// A null-preserving normalizer stamping rows with today's local date.
  pub fn new(countries: &'a CountryMap, source: &'a str) -> Self {
    Self {
      countries,
      source,
      fill: FillPolicy::default(),
      stamp: Local::now().date_naive(),
    }
  }

  pub fn with_fill(mut self, fill: FillPolicy) -> Self {
    self.fill = fill;
    self
  }

  /// Override the `created_at` stamp.
  pub fn stamped(mut self, stamp: NaiveDate) -> Self {
    self.stamp = stamp;
    self
  }

  pub fn fill(&self) -> FillPolicy { self.fill }

  /// Shared driver: resolve ids, skip unresolved rows, build the rest.
  fn run<R>(
    &self,
    rows: &[RawRecord],
    mut build: impl FnMut(&mut RowCtx<'_>) -> Result<R>,
  ) -> Normalized<R> {
    let mut out = Normalized::empty(self.fill);
    out.rows.reserve(rows.len());

    for raw in rows {
      let Some(country_id) = self.countries.get(&raw.country) else {
        out.skipped.rows += 1;
        out.skipped.countries.insert(raw.country.clone());
        continue;
      };

      let built = coerce_date(&raw.date).and_then(|date| {
        let mut ctx = RowCtx {
          country_id,
          date,
          raw,
          fill: self.fill,
          capped: 0,
        };
        build(&mut ctx).map(|row| (row, ctx.capped))
      });

      match built {
        Ok((row, capped)) => {
          out.rows.push(row);
          out.capped += capped;
        }
        Err(e) => {
          out.rejected.rows += 1;
          out.rejected.problems.insert(e.to_string());
        }
      }
    }

    out
  }

  /// Normalize raw rows into `covid_cases` rows.
  pub fn cases(&self, rows: &[RawRecord]) -> Normalized<CaseRecord> {
    self.run(rows, |ctx| {
      let total_cases = ctx.raw_count("total_cases")?;
      let new_cases = ctx.raw_count("new_cases")?;
      let total_deaths = ctx.raw_count("total_deaths")?;
      let data_hash = case_hash(total_cases, new_cases, total_deaths);

      Ok(CaseRecord {
        country_id: ctx.country_id,
        date: ctx.date,
        total_cases: ctx.fill_count(total_cases),
        new_cases: ctx.fill_count(new_cases),
        total_deaths: ctx.fill_count(total_deaths),
        new_deaths: ctx.count("new_deaths")?,
        total_recovered: ctx.count("total_recovered")?,
        new_recovered: ctx.count("new_recovered")?,
        active_cases: ctx.count("active_cases")?,
        critical_cases: ctx.count("critical_cases")?,
        cases_per_million: ctx.rate("cases_per_million")?,
        deaths_per_million: ctx.rate("deaths_per_million")?,
        case_fatality_rate: ctx.rate("case_fatality_rate")?,
        new_cases_7day_avg: ctx.rate("new_cases_7day_avg")?,
        new_deaths_7day_avg: ctx.rate("new_deaths_7day_avg")?,
        data_hash,
        created_at: self.stamp,
        source: self.source.to_owned(),
      })
    })
  }

  /// Normalize raw rows into `vaccinations` rows.
  pub fn vaccinations(&self, rows: &[RawRecord]) -> Normalized<VaccinationRecord> {
    self.run(rows, |ctx| {
      let total = ctx.raw_count("total_vaccinations")?;
      let daily = ctx.raw_count("daily_vaccinations")?;

      Ok(VaccinationRecord {
        country_id: ctx.country_id,
        date: ctx.date,
        total_vaccinations: ctx.fill_count(total),
        daily_vaccinations: ctx.fill_count(daily),
        vaccination_rate: ctx.rate("vaccination_rate")?,
        data_hash: vaccination_hash(total, daily),
        created_at: self.stamp,
        source: self.source.to_owned(),
      })
    })
  }
}
