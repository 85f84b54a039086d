//! Core types and trait definitions for the vocabulary registry's temporal
//! entity store.
//!
//! Every registry entity is stored as a series of rows, each valid over a
//! half-open `[start, end)` interval. Reserved sentinel timestamps encode the
//! "current" and "draft" states, so plain comparison predicates are enough to
//! answer current, as-of and draft queries.
//!
//! No database code lives here; storage backends implement the traits in
//! [`store`].

pub mod clock;
pub mod entity;
pub mod error;
pub mod interval;
pub mod lifecycle;
pub mod sentinel;
pub mod store;

pub use error::{Error, Result};
