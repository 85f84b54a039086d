//! SQLite backend for the vocabulary registry's temporal entity store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write runs inside one
//! `BEGIN IMMEDIATE` transaction, which serialises writers and makes the
//! precondition checks inside the transaction authoritative.

mod drafts;
mod encode;
mod ops;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreBuilder, StoreConfig};

#[cfg(test)]
mod tests;
