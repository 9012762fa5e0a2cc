//! Pipeline tests against real SQLite stores, with [`support::FlakyStore`]
//! wrapping them where a test needs to force or observe a failure.

mod loader;
mod support;
mod tuning;
