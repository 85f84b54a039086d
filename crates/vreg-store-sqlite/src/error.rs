//! Error type for `vreg-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A lifecycle rule rejected the operation, or an entity was absent.
  #[error(transparent)]
  Core(#[from] vreg_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  /// The database stayed locked by another writer past the busy timeout.
  /// The whole operation is safe to run again.
  #[error("storage timeout: {0}")]
  StorageTimeout(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The database was created with a different sentinel set; its rows cannot
  /// be classified with the one supplied.
  #[error("sentinel mismatch for {0}")]
  SentinelMismatch(String),
}

impl Error {
  /// Only transient infrastructure failures are worth retrying.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::StorageTimeout(_)) }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    let busy = matches!(
      &e,
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
        if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    if busy {
      Self::StorageTimeout(e.to_string())
    } else {
      Self::Database(e)
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { tokio_rusqlite::Error::Rusqlite(e).into() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
