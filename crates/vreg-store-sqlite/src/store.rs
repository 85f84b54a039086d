//! [`SqliteStore`]: the SQLite implementation of [`VersionedStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;
use vreg_core::{
  clock::{Clock, SystemClock},
  entity::{EntityKind, Versioned, VersionedRow},
  interval::{Predicate, TemporalAlgebra},
  sentinel::Sentinels,
  store::VersionedStore,
};

use crate::{
  Error, Result,
  encode::{NewRawRow, RawRow},
  ops::{Abort, OpResult, Target},
  query,
  schema::{META, sentinel_entries, versioned_tables},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for the connection and the transient-failure retry loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// How long SQLite waits on a locked database before giving up.
  pub busy_timeout_ms:  u64,
  /// How many times a write is re-run after a storage timeout.
  pub max_retries:      u32,
  /// Delay before the first retry; grows linearly with each attempt.
  pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self { busy_timeout_ms: 5_000, max_retries: 3, retry_backoff_ms: 50 }
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Opens a [`SqliteStore`] with non-default settings.
pub struct StoreBuilder {
  path:      Option<PathBuf>,
  config:    StoreConfig,
  sentinels: Sentinels,
  clock:     Arc<dyn Clock>,
}

impl Default for StoreBuilder {
  fn default() -> Self {
    Self {
      path:      None,
      config:    StoreConfig::default(),
      sentinels: Sentinels::standard(),
      clock:     Arc::new(SystemClock),
    }
  }
}

impl StoreBuilder {
  /// Database file; an in-memory database is used when unset.
  pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
    self.path = Some(path.into());
    self
  }

  pub fn config(mut self, config: StoreConfig) -> Self {
    self.config = config;
    self
  }

  pub fn sentinels(mut self, sentinels: Sentinels) -> Self {
    self.sentinels = sentinels;
    self
  }

  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub async fn open(self) -> Result<SqliteStore> {
    let conn = match &self.path {
      Some(path) => tokio_rusqlite::Connection::open(path).await?,
      None => tokio_rusqlite::Connection::open_in_memory().await?,
    };
    let mut store = SqliteStore {
      reader: conn.clone(),
      conn,
      algebra: TemporalAlgebra::new(self.sentinels),
      clock: self.clock,
      config: self.config,
    };
    store.init_schema().await?;

    // A file store reads through its own connection so queries see the last
    // committed state while a writer holds the lock. An in-memory database
    // exists only on the connection that created it.
    if let Some(path) = &self.path {
      store.reader = open_reader(path, store.config.busy_timeout_ms).await?;
    }
    Ok(store)
  }
}

async fn open_reader(
  path: &Path,
  busy_timeout_ms: u64,
) -> Result<tokio_rusqlite::Connection> {
  let reader = tokio_rusqlite::Connection::open(path).await?;
  reader
    .call(move |conn| {
      conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
      conn.pragma_update(None, "query_only", true)?;
      Ok(())
    })
    .await?;
  Ok(reader)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registry store backed by a single SQLite file.
///
/// Writes go through one connection and SQLite admits one writer per
/// database, so writes queue even when they touch different entities. Reads
/// use a second, query-only connection and never wait on a writer.
///
/// Cloning is cheap; the inner connections are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  reader:  tokio_rusqlite::Connection,
  algebra: TemporalAlgebra,
  clock:   Arc<dyn Clock>,
  config:  StoreConfig,
}

impl SqliteStore {
  pub fn builder() -> StoreBuilder { StoreBuilder::default() }

  /// Open (or create) a store at `path` with default settings.
  pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
    Self::builder().path(path).open().await
  }

  /// Open an in-memory store, used by the tests.
  pub async fn open_in_memory() -> Result<Self> { Self::builder().open().await }

  pub fn algebra(&self) -> &TemporalAlgebra { &self.algebra }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = Duration::from_millis(self.config.busy_timeout_ms);
    let entries = sentinel_entries(self.algebra.sentinels());
    let tables = versioned_tables(self.algebra.sentinels());

    let mismatched: Vec<&'static str> = self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(META)?;

        let mut mismatched = Vec::new();
        for (key, value) in &entries {
          conn.execute(
            "INSERT OR IGNORE INTO temporal_meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
          )?;
          let stored: String = conn.query_row(
            "SELECT value FROM temporal_meta WHERE key = ?1",
            rusqlite::params![key],
            |r| r.get(0),
          )?;
          if &stored != value {
            mismatched.push(*key);
          }
        }
        if mismatched.is_empty() {
          conn.execute_batch(&tables)?;
        }
        Ok(mismatched)
      })
      .await?;

    if !mismatched.is_empty() {
      return Err(Error::SentinelMismatch(mismatched.join(", ")));
    }
    tracing::debug!("schema initialised");
    Ok(())
  }

  /// "Now", truncated to the precision the store persists. A clock reading
  /// the store cannot represent is rejected.
  pub(crate) fn now(&self) -> Result<DateTime<Utc>> {
    Ok(self.algebra.require_real(self.clock.now().trunc_subsecs(6))?)
  }

  pub(crate) fn target(&self, kind: EntityKind, id: Uuid) -> Target {
    Target { kind, id, algebra: self.algebra }
  }

  /// Run `body` inside a `BEGIN IMMEDIATE` transaction, committing only if it
  /// succeeds. Storage timeouts re-run the whole transaction; rule
  /// violations are returned as they are.
  pub(crate) async fn transact<T, F>(&self, body: F) -> Result<T>
  where
    T: Send + 'static,
    F: Fn(&Transaction<'_>) -> OpResult<T> + Send + Sync + 'static,
  {
    let body = Arc::new(body);
    let mut attempt = 0;
    loop {
      let body = Arc::clone(&body);
      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          match body(&tx) {
            Ok(value) => {
              tx.commit()?;
              Ok(Ok(value))
            }
            // Dropping `tx` rolls back.
            Err(Abort::Rule(e)) => Ok(Err(e)),
            Err(Abort::Sql(e)) => Err(e.into()),
          }
        })
        .await;

      match outcome {
        Ok(result) => return Ok(result?),
        Err(e) => {
          let err = Error::from(e);
          if !err.is_retryable() || attempt >= self.config.max_retries {
            return Err(err);
          }
          attempt += 1;
          tracing::warn!(attempt, error = %err, "transient storage failure, retrying");
          let backoff = self.config.retry_backoff_ms * u64::from(attempt);
          tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
      }
    }
  }

  /// Run a read-only query on the reader connection.
  pub(crate) async fn read<T, F>(&self, body: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
  {
    Ok(self.reader.call(move |conn| Ok(body(conn)?)).await?)
  }

  async fn select_rows<P: Versioned>(&self, predicate: Predicate) -> Result<Vec<VersionedRow<P>>> {
    let spec = P::KIND.table();
    let raws = self
      .read(move |conn| query::select_rows(conn, &spec, &predicate))
      .await?;
    raws.into_iter().map(RawRow::into_row).collect()
  }

  async fn select_one<P: Versioned>(&self, predicate: Predicate) -> Result<Option<VersionedRow<P>>> {
    let spec = P::KIND.table();
    let raw = self
      .read(move |conn| query::select_one(conn, &spec, &predicate))
      .await?;
    raw.map(RawRow::into_row).transpose()
  }
}

// ─── VersionedStore impl ─────────────────────────────────────────────────────

impl VersionedStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_current<P: Versioned>(&self, id: Uuid) -> Result<Option<VersionedRow<P>>> {
    tracing::debug!(kind = %P::KIND, %id, "get current");
    self
      .select_one(Predicate::for_entity(id).and(self.algebra.current()))
      .await
  }

  async fn get_as_of<P: Versioned>(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<VersionedRow<P>>> {
    let at = self.algebra.require_real(at.trunc_subsecs(6))?;
    tracing::debug!(kind = %P::KIND, %id, %at, "get as of");
    self
      .select_one(Predicate::for_entity(id).and(self.algebra.as_of(at)))
      .await
  }

  async fn get_all_current<P: Versioned>(&self) -> Result<Vec<VersionedRow<P>>> {
    self.select_rows(self.algebra.current()).await
  }

  async fn get_current_children<P: Versioned>(
    &self,
    parent_id: Uuid,
  ) -> Result<Vec<VersionedRow<P>>> {
    if P::KIND.table().parent_column.is_none() {
      return Err(vreg_core::Error::NoParent(P::KIND).into());
    }
    self
      .select_rows(Predicate::for_parent(parent_id).and(self.algebra.current()))
      .await
  }

  async fn history<P: Versioned>(&self, id: Uuid) -> Result<Vec<VersionedRow<P>>> {
    self
      .select_rows(Predicate::for_entity(id).and(self.algebra.non_draft()))
      .await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create_current<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let row = NewRawRow::encode(id, &payload, modified_by)?;
    let target = self.target(P::KIND, id);
    let now = self.now()?;

    let raw = self
      .transact(move |tx| target.create(tx, row.clone(), now))
      .await?;

    tracing::info!(kind = %P::KIND, %id, start = %now, "created current row");
    raw.into_row()
  }

  async fn supersede<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    effective: DateTime<Utc>,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let row = NewRawRow::encode(id, &payload, modified_by)?;
    let target = self.target(P::KIND, id);
    let effective = effective.trunc_subsecs(6);

    let raw = self
      .transact(move |tx| target.supersede(tx, row.clone(), effective))
      .await?;

    tracing::info!(kind = %P::KIND, %id, at = %effective, "superseded current row");
    raw.into_row()
  }

  async fn retire<P: Versioned>(
    &self,
    id: Uuid,
    effective: DateTime<Utc>,
  ) -> Result<VersionedRow<P>> {
    let target = self.target(P::KIND, id);
    let effective = effective.trunc_subsecs(6);

    let raw = self.transact(move |tx| target.retire(tx, effective)).await?;

    tracing::info!(kind = %P::KIND, %id, at = %effective, "retired current row");
    raw.into_row()
  }
}
