//! The dimension resolver: makes sure every referenced country has a
//! surrogate id.
//!
//! The resolver is the only writer of country rows. It never trusts ids it
//! computed locally; after inserting, it always re-reads the dimension table
//! so that a row created concurrently by another writer wins.

use std::collections::HashSet;

use caseload_core::{
  country::{ALWAYS_PRESENT, CountryMap, NewCountry},
  store::CaseStore,
};
use tracing::{debug, info};

use crate::{Error, Result};

pub struct Resolver<'s, S> {
  store: &'s S,
}

impl<'s, S: CaseStore> Resolver<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  /// Extend `current` to cover every name in `names`, plus the always-present
  /// allow-list.
  ///
  /// Names missing from `current` are inserted with unknown attributes. The
  /// returned mapping is read back from the store.
  pub async fn resolve<'a, I>(&self, names: I, current: &CountryMap) -> Result<CountryMap>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let missing = current
      .missing(names.into_iter().chain(ALWAYS_PRESENT))
      .into_iter()
      .map(NewCountry::named)
      .collect();
    self.insert_and_reload(missing).await
  }

  /// Register countries with their attributes.
  ///
  /// Only names not already in the store are inserted; existing rows keep
  /// their attributes. When a name appears more than once, the first
  /// descriptor wins.
  pub async fn register(&self, countries: Vec<NewCountry>) -> Result<CountryMap> {
    let known = self.store.country_map().await.map_err(Error::store)?;
    let mut seen = HashSet::new();

    let mut new: Vec<NewCountry> = countries
      .into_iter()
      .filter(|c| !c.name.is_empty() && !known.contains(&c.name))
      .filter(|c| seen.insert(c.name.clone()))
      .collect();
    new.extend(
      ALWAYS_PRESENT
        .into_iter()
        .filter(|name| !known.contains(name) && !seen.contains(*name))
        .map(NewCountry::named),
    );

    self.insert_and_reload(new).await
  }

  async fn insert_and_reload(&self, new: Vec<NewCountry>) -> Result<CountryMap> {
    if !new.is_empty() {
      let requested = new.len();
      let outcome = self.store.insert_countries(new).await.map_err(Error::store)?;
      if !outcome.already_present.is_empty() {
        debug!(
          names = ?outcome.already_present,
          "countries created concurrently by another writer",
        );
      }
      info!(requested, inserted = outcome.inserted, "added missing countries");
    }

    self.store.country_map().await.map_err(Error::store)
  }
}
