//! Content hashes for change detection.
//!
//! A fact's hash covers a fixed subset of its numeric fields and nothing else,
//! so two observations with identical values in that subset hash identically
//! regardless of rates, audit stamps, or source. The digest is SHA-256 over
//! the `|`-joined decimal values; a missing value is rendered as `0`.

use sha2::{Digest, Sha256};

/// Hash an ordered tuple of optional counts.
pub fn content_hash(fields: &[Option<i64>]) -> String {
  let joined = fields
    .iter()
    .map(|v| v.unwrap_or(0).to_string())
    .collect::<Vec<_>>()
    .join("|");
  hex::encode(Sha256::digest(joined.as_bytes()))
}

/// The `covid_cases` hash: `(total_cases, new_cases, total_deaths)`.
pub fn case_hash(
  total_cases: Option<i64>,
  new_cases: Option<i64>,
  total_deaths: Option<i64>,
) -> String {
  content_hash(&[total_cases, new_cases, total_deaths])
}

/// The `vaccinations` hash: `(total_vaccinations, daily_vaccinations)`.
pub fn vaccination_hash(total: Option<i64>, daily: Option<i64>) -> String {
  content_hash(&[total, daily])
}
