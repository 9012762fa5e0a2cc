//! The country dimension.
//!
//! A country row is created once, read many times, and never updated or
//! deleted within a run. Its surrogate id is assigned by the store on first
//! insert and is immutable afterwards.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Surrogate key of a country row.
pub type CountryId = i64;

/// Names that must exist in the dimension after every resolution pass, even
/// when absent from the incoming batch. These patch known upstream gaps where
/// vaccination feeds reference countries the case feeds omit.
pub const ALWAYS_PRESENT: [&str; 2] = ["Guernsey", "Turkmenistan"];

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A persisted country dimension row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  pub country_id: CountryId,
  pub name:       String,
  /// ISO 3166 alpha-3 code, when the source provided one.
  pub code:       Option<String>,
  pub continent:  Option<String>,
  pub population: Option<i64>,
}

/// Input to [`crate::store::CaseStore::insert_countries`]. The surrogate id is
/// always assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCountry {
  #[serde(rename = "country")]
  pub name:       String,
  #[serde(default, rename = "country_code")]
  pub code:       Option<String>,
  #[serde(default)]
  pub continent:  Option<String>,
  #[serde(default)]
  pub population: Option<i64>,
}

impl NewCountry {
  /// A country known only by name; every optional attribute is unknown.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name:       name.into(),
      code:       None,
      continent:  None,
      population: None,
    }
  }
}

/// Outcome of inserting a set of new countries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryInsert {
  pub inserted:        usize,
  /// Names that hit the uniqueness constraint because another writer created
  /// them first.
  pub already_present: Vec<String>,
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// Country name → surrogate id.
///
/// A short-lived snapshot of the dimension table, rebuilt from the store on
/// every resolution pass. It is never cached across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMap(BTreeMap<String, CountryId>);

impl CountryMap {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, name: &str) -> Option<CountryId> { self.0.get(name).copied() }

  pub fn contains(&self, name: &str) -> bool { self.0.contains_key(name) }

  pub fn insert(&mut self, name: impl Into<String>, id: CountryId) {
    self.0.insert(name.into(), id);
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, CountryId)> {
    self.0.iter().map(|(name, id)| (name.as_str(), *id))
  }

  /// All surrogate ids in the mapping.
  pub fn ids(&self) -> HashSet<CountryId> { self.0.values().copied().collect() }

  /// The names from `names` not present in this mapping, deduplicated and in
  /// first-seen order. Empty names are ignored.
  pub fn missing<'a, I>(&self, names: I) -> Vec<&'a str>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut seen = HashSet::new();
    names
      .into_iter()
      .filter(|name| !name.is_empty() && !self.contains(name))
      .filter(|name| seen.insert(*name))
      .collect()
  }
}

impl FromIterator<(String, CountryId)> for CountryMap {
  fn from_iter<T: IntoIterator<Item = (String, CountryId)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}
