//! Fact rows (normalized, loadable observations) and the table layouts
//! they are written into.
//!
//! Column order is fixed per table. Every fact row encodes itself into exactly
//! that order; stores rely on it for both the bulk-copy and batched-insert
//! paths.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{country::CountryId, value::Value};

// ─── Table layouts ───────────────────────────────────────────────────────────

/// How a column's text form is interpreted by the bulk-copy decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
  Integer,
  Real,
  /// ISO-8601 `YYYY-MM-DD`, stored as text.
  Date,
  Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name: &'static str,
  pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
  Column { name, kind }
}

pub const CASE_COLUMNS: &[Column] = &[
  col("country_id", ColumnKind::Integer),
  col("date", ColumnKind::Date),
  col("total_cases", ColumnKind::Integer),
  col("new_cases", ColumnKind::Integer),
  col("total_deaths", ColumnKind::Integer),
  col("new_deaths", ColumnKind::Integer),
  col("total_recovered", ColumnKind::Integer),
  col("new_recovered", ColumnKind::Integer),
  col("active_cases", ColumnKind::Integer),
  col("critical_cases", ColumnKind::Integer),
  col("cases_per_million", ColumnKind::Real),
  col("deaths_per_million", ColumnKind::Real),
  col("case_fatality_rate", ColumnKind::Real),
  col("new_cases_7day_avg", ColumnKind::Real),
  col("new_deaths_7day_avg", ColumnKind::Real),
  col("data_hash", ColumnKind::Text),
  col("created_at", ColumnKind::Date),
  col("source", ColumnKind::Text),
];

pub const VACCINATION_COLUMNS: &[Column] = &[
  col("country_id", ColumnKind::Integer),
  col("date", ColumnKind::Date),
  col("total_vaccinations", ColumnKind::Integer),
  col("daily_vaccinations", ColumnKind::Integer),
  col("vaccination_rate", ColumnKind::Real),
  col("data_hash", ColumnKind::Text),
  col("created_at", ColumnKind::Date),
  col("source", ColumnKind::Text),
];

/// A fact table the pipeline can load into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactTable {
  Cases,
  Vaccinations,
}

impl FactTable {
  pub fn name(self) -> &'static str {
    match self {
      Self::Cases => "covid_cases",
      Self::Vaccinations => "vaccinations",
    }
  }

  pub fn columns(self) -> &'static [Column] {
    match self {
      Self::Cases => CASE_COLUMNS,
      Self::Vaccinations => VACCINATION_COLUMNS,
    }
  }
}

/// A normalized row that can be written into a [`FactTable`].
pub trait FactRow: Send + Sync + 'static {
  const TABLE: FactTable;

  fn country_id(&self) -> CountryId;

  /// Cells in [`FactTable::columns`] order.
  fn to_values(&self) -> Vec<Value>;
}

fn date_value(d: NaiveDate) -> Value { Value::Text(d.format("%Y-%m-%d").to_string()) }

// ─── Cases ───────────────────────────────────────────────────────────────────

/// One country/date observation of case counts, ready for `covid_cases`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
  pub country_id:          CountryId,
  pub date:                NaiveDate,
  pub total_cases:         Option<i64>,
  pub new_cases:           Option<i64>,
  pub total_deaths:        Option<i64>,
  pub new_deaths:          Option<i64>,
  pub total_recovered:     Option<i64>,
  pub new_recovered:       Option<i64>,
  pub active_cases:        Option<i64>,
  pub critical_cases:      Option<i64>,
  pub cases_per_million:   Option<f64>,
  pub deaths_per_million:  Option<f64>,
  pub case_fatality_rate:  Option<f64>,
  pub new_cases_7day_avg:  Option<f64>,
  pub new_deaths_7day_avg: Option<f64>,
  /// See [`crate::hash::case_hash`].
  pub data_hash:           String,
  pub created_at:          NaiveDate,
  pub source:              String,
}

impl FactRow for CaseRecord {
  const TABLE: FactTable = FactTable::Cases;

  fn country_id(&self) -> CountryId { self.country_id }

  fn to_values(&self) -> Vec<Value> {
    vec![
      Value::Integer(self.country_id),
      date_value(self.date),
      self.total_cases.into(),
      self.new_cases.into(),
      self.total_deaths.into(),
      self.new_deaths.into(),
      self.total_recovered.into(),
      self.new_recovered.into(),
      self.active_cases.into(),
      self.critical_cases.into(),
      self.cases_per_million.into(),
      self.deaths_per_million.into(),
      self.case_fatality_rate.into(),
      self.new_cases_7day_avg.into(),
      self.new_deaths_7day_avg.into(),
      Value::Text(self.data_hash.clone()),
      date_value(self.created_at),
      Value::Text(self.source.clone()),
    ]
  }
}

// ─── Vaccinations ────────────────────────────────────────────────────────────

/// One country/date observation of vaccination progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationRecord {
  pub country_id:         CountryId,
  pub date:               NaiveDate,
  pub total_vaccinations: Option<i64>,
  pub daily_vaccinations: Option<i64>,
  pub vaccination_rate:   Option<f64>,
  /// See [`crate::hash::vaccination_hash`].
  pub data_hash:          String,
  pub created_at:         NaiveDate,
  pub source:             String,
}

impl FactRow for VaccinationRecord {
  const TABLE: FactTable = FactTable::Vaccinations;

  fn country_id(&self) -> CountryId { self.country_id }

  fn to_values(&self) -> Vec<Value> {
    vec![
      Value::Integer(self.country_id),
      date_value(self.date),
      self.total_vaccinations.into(),
      self.daily_vaccinations.into(),
      self.vaccination_rate.into(),
      Value::Text(self.data_hash.clone()),
      date_value(self.created_at),
      Value::Text(self.source.clone()),
    ]
  }
}
