//! Core types and trait definitions for the caseload pipeline.
//!
//! This crate has no database or async-runtime dependencies. It owns the
//! country dimension and fact row types, the content hash, the bulk-copy text
//! codec, the record normalizer, and the [`store::CaseStore`] abstraction
//! that storage backends implement.

// `CaseStore` implementors use native `async fn`; its futures are declared `Send`.
#![allow(async_fn_in_trait)]

pub mod copy;
pub mod country;
pub mod error;
pub mod fact;
pub mod hash;
pub mod normalize;
pub mod record;
pub mod store;
pub mod value;

pub use error::{Error, Result};
